//! Return correlation of one instrument against a reference instrument over
//! their shared candles.

use anyhow::{Result, ensure};
use itertools::{EitherOrBoth, Itertools};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::models::CandleSeries;
use crate::utils::maths_utils::round_to;

#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationType {
    StrongPositive,
    ModeratePositive,
    Weak,
    ModerateNegative,
    StrongNegative,
    Unknown,
}

impl CorrelationType {
    pub fn from_coefficient(correlation: Option<f64>) -> Self {
        match correlation {
            None => CorrelationType::Unknown,
            Some(c) if c > 0.7 => CorrelationType::StrongPositive,
            Some(c) if c > 0.3 => CorrelationType::ModeratePositive,
            Some(c) if c > -0.3 => CorrelationType::Weak,
            Some(c) if c > -0.7 => CorrelationType::ModerateNegative,
            Some(_) => CorrelationType::StrongNegative,
        }
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct CorrelationReport {
    pub symbol: String,
    pub reference_symbol: String,
    pub timeframe: String,
    // None when either return series has zero variance
    pub correlation: Option<f64>,
    pub correlation_type: CorrelationType,
    pub symbol_volatility: f64,
    pub reference_volatility: f64,
    // Cumulative return of the symbol relative to the reference, percent.
    // Positive means the symbol outran the reference.
    pub divergence_score: f64,
    pub periods_analyzed: usize,
}

/// Closes of both series on the timestamps they share, oldest first.
pub fn aligned_closes(series: &CandleSeries, reference: &CandleSeries) -> Vec<(f64, f64)> {
    let left = series.timestamps_ms.iter().zip(&series.close_prices);
    let right = reference.timestamps_ms.iter().zip(&reference.close_prices);
    left.merge_join_by(right, |(a, _), (b, _)| a.cmp(b))
        .filter_map(|pair| match pair {
            EitherOrBoth::Both((_, &s), (_, &r)) => Some((s, r)),
            _ => None,
        })
        .collect()
}

fn returns(closes: &[f64]) -> Vec<f64> {
    closes
        .windows(2)
        .map(|w| if w[0] != 0.0 { w[1] / w[0] - 1.0 } else { 0.0 })
        .collect()
}

/// Needs `min_periods` shared timestamps.
pub fn analyze_correlation(
    series: &CandleSeries,
    reference: &CandleSeries,
    min_periods: usize,
) -> Result<CorrelationReport> {
    ensure!(
        series.pair_interval.interval_ms == reference.pair_interval.interval_ms,
        "{} and {} are on different intervals",
        series.pair_interval,
        reference.pair_interval
    );
    let aligned = aligned_closes(series, reference);
    ensure!(
        aligned.len() >= min_periods.max(2),
        "{} vs {}: only {} shared candles, need {}",
        series.pair_interval,
        reference.pair_interval,
        aligned.len(),
        min_periods
    );

    let (symbol_closes, reference_closes): (Vec<f64>, Vec<f64>) = aligned.iter().copied().unzip();
    let symbol_returns = returns(&symbol_closes);
    let reference_returns = returns(&reference_closes);

    let symbol_std = symbol_returns.iter().std_dev();
    let reference_std = reference_returns.iter().std_dev();
    let covariance = symbol_returns.iter().covariance(reference_returns.iter());
    let correlation = (symbol_std > 0.0 && reference_std > 0.0)
        .then(|| covariance / (symbol_std * reference_std))
        .filter(|c| c.is_finite())
        .map(|c| round_to(c.clamp(-1.0, 1.0), 3));

    let growth = |returns: &[f64]| returns.iter().fold(1.0, |acc, r| acc * (1.0 + r));
    let symbol_growth = growth(&symbol_returns);
    let reference_growth = growth(&reference_returns);
    let divergence_score = if reference_growth != 0.0 {
        (symbol_growth - reference_growth) / reference_growth * 100.0
    } else {
        0.0
    };

    Ok(CorrelationReport {
        symbol: series.symbol().to_string(),
        reference_symbol: reference.symbol().to_string(),
        timeframe: series.pair_interval.timeframe().to_string(),
        correlation,
        correlation_type: CorrelationType::from_coefficient(correlation),
        symbol_volatility: round_to(symbol_std * 100.0, 3),
        reference_volatility: round_to(reference_std * 100.0, 3),
        divergence_score: round_to(divergence_score, 3),
        periods_analyzed: aligned.len(),
    })
}

/// Reports whose absolute divergence reaches `min_divergence`, largest first.
/// Symbols that cannot be compared are logged and skipped.
pub fn find_divergent(
    candidates: &[CandleSeries],
    reference: &CandleSeries,
    min_periods: usize,
    min_divergence: f64,
) -> Vec<CorrelationReport> {
    let mut divergent: Vec<CorrelationReport> = candidates
        .iter()
        .filter(|s| s.symbol() != reference.symbol())
        .filter_map(|s| match analyze_correlation(s, reference, min_periods) {
            Ok(report) => Some(report),
            Err(e) => {
                log::warn!("Skipping correlation for {}: {:#}", s.pair_interval, e);
                None
            }
        })
        .filter(|r| r.divergence_score.abs() >= min_divergence)
        .collect();
    divergent.sort_by(|a, b| b.divergence_score.abs().total_cmp(&a.divergence_score.abs()));
    divergent
}
