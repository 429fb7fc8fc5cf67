//! Small descriptive-statistics helpers shared by the scorer and the price
//! utilities.

// ── Percentiles ───────────────────────────────────────────────────────────────

/// `p`-th percentile (0 to 100) of an ascending slice, interpolating linearly
/// between the two nearest ranks as NumPy and pandas do by default.
///
/// An empty slice yields `0.0`.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    let Some(&first) = sorted.first() else {
        return 0.0;
    };
    let position = (p / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let below = position.floor() as usize;
    let above = position.ceil() as usize;
    if below == above {
        return sorted.get(below).copied().unwrap_or(first);
    }
    let weight = position - below as f64;
    sorted[below] + weight * (sorted[above] - sorted[below])
}

/// Sort a copy of `values` ascending. NaNs sort last.
pub fn sorted(values: &[f64]) -> Vec<f64> {
    let mut v = values.to_vec();
    v.sort_by(|a, b| a.total_cmp(b));
    v
}

// ── IQR fence ─────────────────────────────────────────────────────────────────

/// Multiplier applied to the interquartile range when fencing outliers.
pub const IQR_FENCE_FACTOR: f64 = 1.5;

/// Tukey fence `[Q1 - 1.5·IQR, Q3 + 1.5·IQR]` for `values`.
///
/// Returns `None` for an empty slice.
pub fn iqr_fence(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let data = sorted(values);
    let q1 = percentile(&data, 25.0);
    let q3 = percentile(&data, 75.0);
    let iqr = q3 - q1;
    Some((q1 - IQR_FENCE_FACTOR * iqr, q3 + IQR_FENCE_FACTOR * iqr))
}

// ── Changes ───────────────────────────────────────────────────────────────────

/// Arithmetic mean, or `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Relative change from `previous` to `current`.
///
/// `None` when `previous` is zero, where the change is undefined.
pub fn pct_change(previous: f64, current: f64) -> Option<f64> {
    if previous == 0.0 {
        None
    } else {
        Some((current - previous) / previous)
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
