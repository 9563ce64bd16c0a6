/// Default number of points handed to the chart renderer.
pub const DEFAULT_MAX_RENDER_POINTS: usize = 2_000;
/// Fixed-stride reduction: keeps every element whose index is divisible by
/// `floor(len / max_points)`.
///
/// Short inputs come back unchanged, and so does everything when `max_points` is zero. Because the
/// stride is floored the result can hold more than `max_points` elements; callers rely on that
/// exact point set, so it is not truncated.
pub fn downsample<T: Clone>(series: &[T], max_points: usize) -> Vec<T> {
    let stride = stride(series.len(), max_points);
    series.iter().step_by(stride).cloned().collect()
}
/// Stride used by [`downsample`]; `1` means the series is kept whole.
pub fn stride(len: usize, max_points: usize) -> usize {
    if max_points == 0 || len <= max_points {
        return 1;
    }
    (len / max_points).max(1)
}
