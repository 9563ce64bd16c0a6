use std::collections::VecDeque;
use crate::telemetry::{Sample, TelemetryError};
/// Default number of samples a session view keeps in memory.
pub const DEFAULT_MAX_DATA_POINTS: usize = 10_000;
/// Bounded, insertion-ordered sample store with drop-from-front eviction.
#[derive(Debug)]
pub struct RingBuffer {
    samples: VecDeque<Sample>,
    capacity: usize,
    version: u64,
}
impl RingBuffer {
    pub fn with_capacity(capacity: usize) -> Result<Self, TelemetryError> {
        if capacity == 0 {
            return Err(TelemetryError::InvalidCapacity);
        }
        Ok(Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            version: 0,
        })
    }
    pub fn capacity(&self) -> usize {
        self.capacity
    }
    pub fn len(&self) -> usize {
        self.samples.len()
    }
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
    /// Bumped on every mutation; keys memoized recomputation.
    pub fn version(&self) -> u64 {
        self.version
    }
    /// Appends one sample, evicting the oldest when full. Returns how many were evicted.
    pub fn push(&mut self, sample: Sample) -> usize {
        let mut evicted = 0;
        while self.samples.len() >= self.capacity {
            self.samples.pop_front();
            evicted += 1;
        }
        self.samples.push_back(sample);
        self.version += 1;
        evicted
    }
    /// Replaces the whole content, keeping only the newest `capacity` samples.
    pub fn replace(&mut self, samples: Vec<Sample>) {
        let skip = samples.len().saturating_sub(self.capacity);
        self.samples.clear();
        self.samples.extend(samples.into_iter().skip(skip));
        self.version += 1;
    }
    pub fn clear(&mut self) {
        self.samples.clear();
        self.version += 1;
    }
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &Sample> + DoubleEndedIterator {
        self.samples.iter()
    }
}
