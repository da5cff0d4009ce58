use argminmax::ArgMinMax;
use statrs::statistics::Statistics;

pub fn get_max(vec: &[f64]) -> f64 {
    let max_index: usize = vec.argmax();
    vec[max_index]
}

pub fn get_min(vec: &[f64]) -> f64 {
    let min_index: usize = vec.argmin();
    vec[min_index]
}

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().mean())
}

/// Round half away from zero to `decimals` places (display-oriented values only).
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Percentage change from `from` to `to`. `None` when `from` is zero.
pub fn pct_change(from: f64, to: f64) -> Option<f64> {
    if from == 0.0 {
        return None;
    }
    Some((to - from) / from * 100.0)
}

// ============================================================================
// Trailing windows
// The first `window - 1` slots are undefined, exactly like a pandas rolling
// window with `min_periods == window`.
// ============================================================================

pub fn rolling_mean(values: &[f64], window: usize) -> Vec<Option<f64>> {
    rolling_apply(values, window, |w| w.iter().sum::<f64>() / w.len() as f64)
}

/// Sample standard deviation (n - 1 denominator).
pub fn rolling_std(values: &[f64], window: usize) -> Vec<Option<f64>> {
    if window < 2 {
        return vec![None; values.len()];
    }
    rolling_apply(values, window, |w| w.iter().std_dev())
}

pub fn rolling_max(values: &[f64], window: usize) -> Vec<Option<f64>> {
    rolling_apply(values, window, get_max)
}

pub fn rolling_min(values: &[f64], window: usize) -> Vec<Option<f64>> {
    rolling_apply(values, window, get_min)
}

fn rolling_apply<F>(values: &[f64], window: usize, f: F) -> Vec<Option<f64>>
where
    F: Fn(&[f64]) -> f64,
{
    let mut out = vec![None; values.len()];
    if window == 0 || values.len() < window {
        return out;
    }
    for end in window..=values.len() {
        out[end - 1] = Some(f(&values[end - window..end]));
    }
    out
}

/// Trailing mean over a partially defined series. A window containing any
/// undefined slot stays undefined.
pub fn rolling_mean_opt(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    rolling_apply_opt(values, window, |w| w.iter().sum::<f64>() / w.len() as f64)
}

pub fn rolling_max_opt(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    rolling_apply_opt(values, window, get_max)
}

pub fn rolling_min_opt(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    rolling_apply_opt(values, window, get_min)
}

fn rolling_apply_opt<F>(values: &[Option<f64>], window: usize, f: F) -> Vec<Option<f64>>
where
    F: Fn(&[f64]) -> f64,
{
    let mut out = vec![None; values.len()];
    if window == 0 || values.len() < window {
        return out;
    }
    let mut buffer = Vec::with_capacity(window);
    for end in window..=values.len() {
        buffer.clear();
        buffer.extend(values[end - window..end].iter().flatten());
        if buffer.len() == window {
            out[end - 1] = Some(f(&buffer));
        }
    }
    out
}

// ============================================================================
// Centered windows (swing points)
// ============================================================================

/// Centered rolling maximum. Slots closer than `window / 2` to either edge are
/// undefined.
pub fn centered_max(values: &[f64], window: usize) -> Vec<Option<f64>> {
    centered_apply(values, window, get_max)
}

/// Centered rolling minimum.
pub fn centered_min(values: &[f64], window: usize) -> Vec<Option<f64>> {
    centered_apply(values, window, get_min)
}

fn centered_apply<F>(values: &[f64], window: usize, f: F) -> Vec<Option<f64>>
where
    F: Fn(&[f64]) -> f64,
{
    let mut out = vec![None; values.len()];
    if window == 0 || values.len() < window {
        return out;
    }
    let half = window / 2;
    let right = window - half - 1;
    for center in half..values.len() - right {
        out[center] = Some(f(&values[center - half..=center + right]));
    }
    out
}

/// Indices whose value equals the centered rolling maximum (swing highs).
pub fn swing_high_indices(values: &[f64], window: usize) -> Vec<usize> {
    matching_indices(values, &centered_max(values, window))
}

/// Indices whose value equals the centered rolling minimum (swing lows).
pub fn swing_low_indices(values: &[f64], window: usize) -> Vec<usize> {
    matching_indices(values, &centered_min(values, window))
}

fn matching_indices(values: &[f64], extrema: &[Option<f64>]) -> Vec<usize> {
    values
        .iter()
        .zip(extrema)
        .enumerate()
        .filter(|(_, (v, e))| e.is_some_and(|e| **v == e))
        .map(|(i, _)| i)
        .collect()
}

/// Least-squares slope of `ys` against `0..n`. Needs at least two points.
pub fn linear_slope(ys: &[f64]) -> Option<f64> {
    let n = ys.len();
    if n < 2 {
        return None;
    }
    let x_mean = (n - 1) as f64 / 2.0;
    let y_mean = mean(ys)?;
    let (num, den) = ys
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(num, den), (i, &y)| {
            let dx = i as f64 - x_mean;
            (num + dx * (y - y_mean), den + dx * dx)
        });
    if den == 0.0 { None } else { Some(num / den) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rolling_mean_leaves_warmup_undefined() {
        let out = rolling_mean(&[1.0, 2.0, 3.0, 4.0], 3);
        assert_eq!(out, vec![None, None, Some(2.0), Some(3.0)]);
    }

    #[test]
    fn rolling_mean_opt_skips_windows_with_gaps() {
        let out = rolling_mean_opt(&[None, Some(2.0), Some(4.0), Some(6.0)], 2);
        assert_eq!(out, vec![None, None, Some(3.0), Some(5.0)]);
    }

    #[test]
    fn rolling_std_is_sample_deviation() {
        let out = rolling_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0], 8);
        let std = out[7].unwrap();
        assert!((std - 2.138).abs() < 0.001);
    }

    #[test]
    fn centered_window_marks_swing_points() {
        let highs = [1.0, 2.0, 5.0, 2.0, 1.0, 3.0, 8.0, 3.0, 1.0];
        assert_eq!(swing_high_indices(&highs, 3), vec![2, 6]);
        assert_eq!(swing_low_indices(&highs, 3), vec![4]);
        // Edges are never swing points.
        assert!(centered_max(&highs, 5)[1].is_none());
    }

    #[test]
    fn slope_of_a_line() {
        assert!((linear_slope(&[1.0, 3.0, 5.0, 7.0]).unwrap() - 2.0).abs() < 1e-12);
        assert!(linear_slope(&[4.0]).is_none());
    }

    #[test]
    fn pct_change_guards_zero_base() {
        assert_eq!(pct_change(0.0, 1.0), None);
        assert!((pct_change(100.0, 103.5).unwrap() - 3.5).abs() < 1e-9);
    }

    #[test]
    fn mean_of_empty_is_none() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[1.0, 2.0, 3.0, 4.0]), Some(2.5));
    }
}
