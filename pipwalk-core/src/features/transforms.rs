//! Series transforms shared by feature definitions.

/// x[t] - x[t-lag]; NaN for the first `lag` values.
pub fn diff(values: &[f64], lag: usize) -> Vec<f64> {
    (0..values.len())
        .map(|i| {
            if i < lag {
                f64::NAN
            } else {
                values[i] - values[i - lag]
            }
        })
        .collect()
}

/// (x[t] - x[t-lag]) / x[t-lag]; a zero base yields a non-finite value.
pub fn pct_change(values: &[f64], lag: usize) -> Vec<f64> {
    (0..values.len())
        .map(|i| {
            if i < lag {
                f64::NAN
            } else {
                (values[i] - values[i - lag]) / values[i - lag]
            }
        })
        .collect()
}

/// (x - reference) / reference, elementwise.
pub fn relative_distance(values: &[f64], reference: &[f64]) -> Vec<f64> {
    values
        .iter()
        .zip(reference)
        .map(|(v, r)| (v - r) / r)
        .collect()
}

/// Non-finite values become `None`.
pub fn to_options(values: Vec<f64>) -> Vec<Option<f64>> {
    values
        .into_iter()
        .map(|v| if v.is_finite() { Some(v) } else { None })
        .collect()
}
