/// Folds `sample` into an average that already covers `previous_count` samples.
pub fn running_average(average: f64, previous_count: u64, sample: f64) -> f64 {
    let n = previous_count as f64;
    (average * n + sample) / (n + 1.0)
}

/// `part / total`, or `0.0` when nothing has been counted yet.
pub fn rate(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}
