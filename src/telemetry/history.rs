use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use serde_json::Value;
use crate::telemetry::{Sample, TelemetryError};
pub type SessionId = u64;
/// Identifies one historical fetch; the generation is checked again when the fetch resolves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LoadTicket {
    pub session_id: SessionId,
    pub generation: u64,
}
/// A resolved historical fetch, successful or not.
#[derive(Debug)]
pub struct LoadResult {
    pub ticket: LoadTicket,
    pub outcome: Result<Vec<Sample>, TelemetryError>,
}
/// Request/response channel returning the raw record list of a session.
pub trait HistorySource {
    fn fetch(&self, session_id: SessionId) -> Result<Value, TelemetryError>;
}
impl<S: HistorySource + ?Sized> HistorySource for Box<S> {
    fn fetch(&self, session_id: SessionId) -> Result<Value, TelemetryError> {
        (**self).fetch(session_id)
    }
}
/// `GET {base_url}/get_session_data/{id}/` on the console backend.
#[derive(Clone, Debug)]
pub struct HttpHistory {
    base_url: String,
    auth_token: Option<String>,
    timeout: Duration,
}
impl HttpHistory {
    pub fn new(base_url: impl Into<String>, auth_token: Option<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            auth_token,
            timeout,
        }
    }
    pub fn session_url(&self, session_id: SessionId) -> String {
        format!(
            "{}/get_session_data/{session_id}/",
            self.base_url.trim_end_matches('/')
        )
    }
}
impl HistorySource for HttpHistory {
    fn fetch(&self, session_id: SessionId) -> Result<Value, TelemetryError> {
        let url = self.session_url(session_id);
        log::debug!("fetching history from {url}");
        let mut request = ureq::get(&url).timeout(self.timeout);
        if let Some(token) = &self.auth_token {
            request = request.set("Authorization", &format!("Bearer {token}"));
        }
        let body = request
            .call()?
            .into_string()
            .map_err(|e| TelemetryError::Transport(format!("failed to read response: {e}")))?;
        serde_json::from_str(&body).map_err(|e| TelemetryError::InvalidFormat(e.to_string()))
    }
}
/// Reads `{dir}/{session_id}.json`, the layout produced by exporting sessions to disk.
#[derive(Clone, Debug)]
pub struct FileHistory {
    dir: PathBuf,
}
impl FileHistory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}
impl HistorySource for FileHistory {
    fn fetch(&self, session_id: SessionId) -> Result<Value, TelemetryError> {
        let path = self.dir.join(format!("{session_id}.json"));
        let text = std::fs::read_to_string(&path)
            .map_err(|e| TelemetryError::Transport(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&text).map_err(|e| TelemetryError::InvalidFormat(e.to_string()))
    }
}
/// In-memory source useful for tests and deterministic playback.
#[derive(Clone, Debug, Default)]
pub struct StaticHistory {
    sessions: HashMap<SessionId, Value>,
}
impl StaticHistory {
    pub fn new(sessions: impl IntoIterator<Item = (SessionId, Value)>) -> Self {
        Self {
            sessions: sessions.into_iter().collect(),
        }
    }
}
impl HistorySource for StaticHistory {
    fn fetch(&self, session_id: SessionId) -> Result<Value, TelemetryError> {
        self.sessions
            .get(&session_id)
            .cloned()
            .ok_or_else(|| TelemetryError::Transport(format!("unknown session {session_id}")))
    }
}
/// One-shot fetch of a session's prior samples, trimmed to the buffer capacity.
pub struct HistoricalLoader<S: HistorySource> {
    source: S,
    max_data_points: usize,
}
impl<S: HistorySource> HistoricalLoader<S> {
    pub fn new(source: S, max_data_points: usize) -> Self {
        Self {
            source,
            max_data_points,
        }
    }
    pub fn load(&self, ticket: LoadTicket) -> LoadResult {
        let outcome = self
            .source
            .fetch(ticket.session_id)
            .and_then(|payload| parse_history(payload, self.max_data_points));
        if let Err(err) = &outcome {
            log::warn!("history for session {} failed: {err}", ticket.session_id);
        }
        LoadResult { ticket, outcome }
    }
}
impl<S: HistorySource + Send + Sync + 'static> HistoricalLoader<S> {
    /// Runs [`HistoricalLoader::load`] on a worker thread and posts the result back.
    pub fn spawn(self: &Arc<Self>, ticket: LoadTicket, tx: Sender<LoadResult>) {
        let loader = Arc::clone(self);
        thread::spawn(move || {
            tx.send(loader.load(ticket)).ok();
        });
    }
}
/// Validates the payload shape and normalizes the newest `max_data_points` records.
/// Any bad record rejects the whole payload.
pub fn parse_history(
    payload: Value,
    max_data_points: usize,
) -> Result<Vec<Sample>, TelemetryError> {
    let kind = kind_of(&payload);
    let Value::Array(records) = payload else {
        return Err(TelemetryError::InvalidFormat(format!(
            "expected a list of records, got {kind}"
        )));
    };
    let skip = records.len().saturating_sub(max_data_points);
    records
        .into_iter()
        .skip(skip)
        .enumerate()
        .map(|(i, record)| {
            Sample::from_record(record)
                .map_err(|e| TelemetryError::InvalidFormat(format!("record {}: {e}", skip + i)))
        })
        .collect()
}
fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::mpsc::channel;
    fn records(n: usize) -> Value {
        Value::Array(
            (0..n)
                .map(|i| json!({ "timestamp": i as f64, "actual_position": i }))
                .collect(),
        )
    }
    #[test]
    fn trims_to_newest_records() {
        let samples = parse_history(records(5), 3).unwrap();
        let positions: Vec<f64> = samples.iter().map(|s| s.actual_position).collect();
        assert_eq!(positions, vec![2.0, 3.0, 4.0]);
    }
    #[test]
    fn non_list_payload_is_a_format_error() {
        let err = parse_history(json!({ "error": "Invalid session" }), 10).unwrap_err();
        assert!(matches!(err, TelemetryError::InvalidFormat(_)));
    }
    #[test]
    fn one_bad_record_rejects_everything() {
        let payload = json!([
            { "timestamp": 1.0, "phase_current": 3 },
            { "timestamp": 2.0, "phase_current": "high" }
        ]);
        assert!(matches!(
            parse_history(payload, 10),
            Err(TelemetryError::InvalidFormat(_))
        ));
    }
    #[test]
    fn loader_reports_unknown_session_as_transport_failure() {
        let loader = HistoricalLoader::new(StaticHistory::new([(1, records(2))]), 10);
        let ticket = LoadTicket {
            session_id: 9,
            generation: 4,
        };
        let result = loader.load(ticket);
        assert_eq!(result.ticket, ticket);
        assert!(matches!(result.outcome, Err(TelemetryError::Transport(_))));
    }
    #[test]
    fn spawned_load_posts_result() {
        let loader = Arc::new(HistoricalLoader::new(StaticHistory::new([(7, records(4))]), 10));
        let (tx, rx) = channel();
        let ticket = LoadTicket {
            session_id: 7,
            generation: 1,
        };
        loader.spawn(ticket, tx);
        let result = rx.recv().unwrap();
        assert_eq!(result.ticket, ticket);
        assert_eq!(result.outcome.unwrap().len(), 4);
    }
    #[test]
    fn file_history_reads_session_file() {
        let dir =
            std::env::temp_dir().join(format!("rig-telemetry-history-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("3.json"), records(2).to_string()).unwrap();
        let source = FileHistory::new(&dir);
        assert_eq!(source.fetch(3).unwrap(), records(2));
        assert!(matches!(source.fetch(4), Err(TelemetryError::Transport(_))));
        std::fs::remove_dir_all(&dir).ok();
    }
    #[test]
    fn http_url_is_built_from_base() {
        let source = HttpHistory::new("http://rig:8000/", None, Duration::from_secs(1));
        assert_eq!(source.session_url(12), "http://rig:8000/get_session_data/12/");
    }
}
