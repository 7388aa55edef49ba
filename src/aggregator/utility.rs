/// Computes the arithmetic mean of a slice of values. Returns 0.0 for empty input.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Combines `(mean, count)` pairs into the count-weighted mean.
/// Returns 0.0 when the total count is zero.
pub fn weighted_mean(parts: &[(f64, u64)]) -> f64 {
    let total: u64 = parts.iter().map(|(_, count)| count).sum();
    if total == 0 {
        return 0.0;
    }
    parts
        .iter()
        .map(|(value, count)| value * *count as f64)
        .sum::<f64>()
        / total as f64
}
