//! Null-aware window functions over one ordered series.
//!
//! Inputs are `Option<f64>` slices already ordered by date. `None` is "unknown" and is never
//! counted as zero: windows count only present observations toward `min_periods`, and any
//! pairwise operation involving `None` yields `None`.

/// Round half to even at `decimals` places.
pub fn round_to(x: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (x * factor).round_ties_even() / factor
}

fn window_bounds(i: usize, window: usize) -> std::ops::Range<usize> {
    (i + 1).saturating_sub(window)..i + 1
}

/// Right-aligned rolling sum: `Some` once the window holds `min_periods` present values.
pub fn rolling_sum(values: &[Option<f64>], window: usize, min_periods: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            let present: Vec<f64> = values[window_bounds(i, window)].iter().flatten().copied().collect();
            (present.len() >= min_periods.max(1)).then(|| present.iter().sum::<f64>())
        })
        .collect()
}

/// Right-aligned rolling mean with the same `min_periods` rule as [`rolling_sum`].
pub fn rolling_mean(values: &[Option<f64>], window: usize, min_periods: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            let present: Vec<f64> = values[window_bounds(i, window)].iter().flatten().copied().collect();
            (present.len() >= min_periods.max(1)).then(|| present.iter().sum::<f64>() / present.len() as f64)
        })
        .collect()
}

/// `x[i] / x[i - periods] - 1`.
///
/// The raw quotient is returned, so a zero baseline yields an infinite (or NaN) value;
/// callers decide how to treat those.
pub fn pct_change(values: &[Option<f64>], periods: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            let prev = i.checked_sub(periods).and_then(|j| values[j])?;
            let cur = values[i]?;
            Some(cur / prev - 1.0)
        })
        .collect()
}

/// Running sum; null entries stay null and do not reset the sum.
pub fn cumsum(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut acc = 0.0;
    values
        .iter()
        .map(|v| {
            let x = (*v)?;
            acc += x;
            Some(acc)
        })
        .collect()
}

/// First difference; the first entry and any pair touching a null are null.
pub fn diff(values: &[Option<f64>]) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            let prev = i.checked_sub(1).and_then(|j| values[j])?;
            Some(values[i]? - prev)
        })
        .collect()
}
