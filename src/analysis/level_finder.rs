use crate::config::LevelSettings;
use crate::models::{CandleSeries, Levels};
use crate::utils::maths_utils::{centered_max, centered_min};

/// Support and resistance from clustered local extrema.
///
/// 1. Keeps every low equal to its centered rolling minimum (and every high
///    equal to its centered rolling maximum).
/// 2. Merges values within `cluster_tolerance_pct` of each other into their mean.
/// 3. Sorts support ascending, resistance descending, keeps `max_levels` each.
pub fn find_levels(series: &CandleSeries, settings: &LevelSettings) -> Levels {
    if series.klines() < settings.extremum_window {
        return Levels::default();
    }

    let lows = local_extrema(&series.low_prices, &centered_min(&series.low_prices, settings.extremum_window));
    let highs = local_extrema(&series.high_prices, &centered_max(&series.high_prices, settings.extremum_window));

    let mut support = cluster_levels(&lows, settings.cluster_tolerance_pct);
    let mut resistance = cluster_levels(&highs, settings.cluster_tolerance_pct);
    resistance.reverse();

    support.truncate(settings.max_levels);
    resistance.truncate(settings.max_levels);
    Levels::new(support, resistance)
}

fn local_extrema(values: &[f64], window_extrema: &[Option<f64>]) -> Vec<f64> {
    values
        .iter()
        .zip(window_extrema)
        .filter(|(v, e)| e.is_some_and(|e| **v == e))
        .map(|(v, _)| *v)
        .filter(|v| v.is_finite() && *v > 0.0)
        .collect()
}

/// Merge values lying within `tolerance_pct` of a cluster's running mean,
/// repeating until a pass merges nothing. Output is sorted ascending, and
/// feeding it back in returns it unchanged.
pub fn cluster_levels(values: &[f64], tolerance_pct: f64) -> Vec<f64> {
    let mut current: Vec<f64> = values
        .iter()
        .copied()
        .filter(|v| v.is_finite() && *v > 0.0)
        .collect();
    current.sort_by(f64::total_cmp);

    loop {
        let merged = merge_pass(&current, tolerance_pct);
        if merged.len() == current.len() {
            return current;
        }
        current = merged;
    }
}

fn merge_pass(sorted: &[f64], tolerance_pct: f64) -> Vec<f64> {
    let mut out = Vec::with_capacity(sorted.len());
    let mut sum = 0.0;
    let mut count = 0usize;

    for &value in sorted {
        if count > 0 {
            let mean = sum / count as f64;
            if (value - mean).abs() / mean * 100.0 <= tolerance_pct {
                sum += value;
                count += 1;
                continue;
            }
            out.push(mean);
        }
        sum = value;
        count = 1;
    }
    if count > 0 {
        out.push(sum / count as f64);
    }
    out
}
