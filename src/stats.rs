//! Small order statistics shared by run selection and aggregation
//!
//! Values are `f64` audit measurements. Callers filter out non-finite values
//! before asking for a median; `total_cmp` keeps the sort a total order either
//! way.

/// Median of `values`; the mean of the two middle values for an even count
///
/// Returns `None` for an empty slice.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    }
}

/// Smallest value, `None` for an empty slice
pub fn min(values: &[f64]) -> Option<f64> {
    values.iter().copied().min_by(f64::total_cmp)
}

/// Largest value, `None` for an empty slice
pub fn max(values: &[f64]) -> Option<f64> {
    values.iter().copied().max_by(f64::total_cmp)
}
