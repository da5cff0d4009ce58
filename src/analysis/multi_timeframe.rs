//! Runs the single-timeframe pipeline per configured interval and scores how
//! well the timeframes agree.

use anyhow::Result;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::analysis::indicator_engine::compute_indicators;
use crate::analysis::level_finder::find_levels;
use crate::analysis::signal_aggregator::SignalAggregator;
use crate::analysis::technical::{PivotPoints, TechnicalCondition, pivot_points, technical_conditions};
use crate::config::ScannerConfig;
use crate::models::{CandleSeries, Indicator, IndicatorSet, SignalBatch, find_matching_series};
use crate::utils::maths_utils::{mean, pct_change, round_to};

const VOLUME_TREND_WINDOW: usize = 20;

#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeframeTrend {
    Uptrend,
    Downtrend,
    Sideways,
    Neutral,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RsiState {
    Oversold,
    Overbought,
    Weak,
    Strong,
    Neutral,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MacdState {
    Bullish,
    Bearish,
    Neutral,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaPosition {
    AboveAll,
    BelowAll,
    Mixed,
    Neutral,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Momentum {
    StrongBullish,
    Bullish,
    Neutral,
    Bearish,
    StrongBearish,
}

impl Momentum {
    fn is_bullish(self) -> bool {
        matches!(self, Momentum::StrongBullish | Momentum::Bullish)
    }

    fn is_bearish(self) -> bool {
        matches!(self, Momentum::StrongBearish | Momentum::Bearish)
    }

    fn is_strong(self) -> bool {
        matches!(self, Momentum::StrongBullish | Momentum::StrongBearish)
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeTrend {
    Increasing,
    Decreasing,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    StrongBuy,
    Buy,
    Neutral,
    Sell,
    StrongSell,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct TimeframeReport {
    pub interval_ms: i64,
    pub timeframe: String,
    pub trend: TimeframeTrend,
    pub rsi: Option<f64>,
    pub rsi_state: RsiState,
    pub macd_state: MacdState,
    pub ma_position: MaPosition,
    pub momentum: Momentum,
    pub price: f64,
    pub volume_trend: VolumeTrend,
    pub conditions: Vec<TechnicalCondition>,
    pub pivots: Option<PivotPoints>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signals: Option<SignalBatch>,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct MtfAnalysis {
    pub symbol: String,
    // Ordered as the configured intervals, skipped timeframes omitted
    pub timeframes: Vec<TimeframeReport>,
    pub alignment_score: f64,
    pub recommendation: Recommendation,
    pub confidence: f64,
}

pub struct MultiTimeframeCoordinator {
    aggregator: SignalAggregator,
}

impl MultiTimeframeCoordinator {
    pub fn new(config: ScannerConfig) -> Self {
        Self {
            aggregator: SignalAggregator::new(config),
        }
    }

    pub fn config(&self) -> &ScannerConfig {
        self.aggregator.config()
    }

    /// `series_data` may hold any symbols and intervals; only `symbol` at the
    /// configured intervals is used.
    pub fn analyze(&self, symbol: &str, series_data: &[CandleSeries], with_signals: bool) -> MtfAnalysis {
        let config = self.config();
        let timeframes: Vec<TimeframeReport> = config
            .mtf
            .intervals_ms
            .par_iter()
            .filter_map(|&interval_ms| {
                let series = match find_matching_series(series_data, symbol, interval_ms) {
                    Ok(series) => series,
                    Err(_e) => {
                        #[cfg(debug_assertions)]
                        if crate::config::debug::PRINT_SKIPPED_TIMEFRAMES {
                            log::info!(
                                "{}: skipping {}: {}",
                                symbol,
                                crate::utils::TimeUtils::interval_to_string(interval_ms),
                                _e
                            );
                        }
                        return None;
                    }
                };
                match self.analyze_timeframe(series, with_signals) {
                    Ok(report) => report,
                    Err(e) => {
                        log::warn!("{}: timeframe analysis failed: {:#}", series.pair_interval, e);
                        None
                    }
                }
            })
            .collect();

        let alignment_score = alignment_score(&timeframes);
        let recommendation = recommendation(&timeframes, alignment_score);
        let confidence = confidence(&timeframes, config.mtf.intervals_ms.len(), alignment_score);
        MtfAnalysis {
            symbol: symbol.to_string(),
            timeframes,
            alignment_score,
            recommendation,
            confidence,
        }
    }

    /// `Ok(None)` when the series is too short to judge.
    pub fn analyze_timeframe(&self, series: &CandleSeries, with_signals: bool) -> Result<Option<TimeframeReport>> {
        let config = self.config();
        series.validate()?;
        let len = series.klines();
        if len < config.min_candles.timeframe {
            #[cfg(debug_assertions)]
            if crate::config::debug::PRINT_SKIPPED_TIMEFRAMES {
                log::info!("{}: skipping, only {} candles", series.pair_interval, len);
            }
            return Ok(None);
        }
        let Some(price) = series.last_close() else {
            return Ok(None);
        };

        let ind = compute_indicators(series, config);
        let rsi = ind.last(Indicator::Rsi);
        let signals = if with_signals {
            let levels = find_levels(series, &config.levels);
            Some(self.aggregator.analyze(series, &ind, &levels, None)?)
        } else {
            None
        };

        let recent_volume = &series.volumes[series.tail_start(VOLUME_TREND_WINDOW)..];
        let volume_trend = match mean(recent_volume) {
            Some(avg) if series.volumes[len - 1] > avg => VolumeTrend::Increasing,
            _ => VolumeTrend::Decreasing,
        };

        Ok(Some(TimeframeReport {
            interval_ms: series.pair_interval.interval_ms,
            timeframe: series.pair_interval.timeframe().to_string(),
            trend: timeframe_trend(price, &ind),
            rsi,
            rsi_state: rsi_state(rsi),
            macd_state: macd_state(&ind),
            ma_position: ma_position(price, &ind),
            momentum: momentum(series, config.mtf.momentum_lookback),
            price,
            volume_trend,
            conditions: technical_conditions(&ind, config),
            pivots: pivot_points(series),
            signals,
        }))
    }
}

impl Default for MultiTimeframeCoordinator {
    fn default() -> Self {
        Self::new(ScannerConfig::default())
    }
}

fn timeframe_trend(price: f64, ind: &IndicatorSet) -> TimeframeTrend {
    match (ind.last(Indicator::Ema21), ind.last(Indicator::Ema55)) {
        (Some(e21), Some(e55)) if price > e21 && e21 > e55 => TimeframeTrend::Uptrend,
        (Some(e21), Some(e55)) if price < e21 && e21 < e55 => TimeframeTrend::Downtrend,
        (Some(_), Some(_)) => TimeframeTrend::Sideways,
        _ => TimeframeTrend::Neutral,
    }
}

fn rsi_state(rsi: Option<f64>) -> RsiState {
    match rsi {
        Some(r) if r < 30.0 => RsiState::Oversold,
        Some(r) if r > 70.0 => RsiState::Overbought,
        Some(r) if r < 40.0 => RsiState::Weak,
        Some(r) if r > 60.0 => RsiState::Strong,
        _ => RsiState::Neutral,
    }
}

fn macd_state(ind: &IndicatorSet) -> MacdState {
    match (ind.last(Indicator::Macd), ind.last(Indicator::MacdSignal)) {
        (Some(macd), Some(signal)) if macd > signal => MacdState::Bullish,
        (Some(_), Some(_)) => MacdState::Bearish,
        _ => MacdState::Neutral,
    }
}

fn ma_position(price: f64, ind: &IndicatorSet) -> MaPosition {
    match (ind.last(Indicator::Sma20), ind.last(Indicator::Sma50)) {
        (Some(s20), Some(s50)) if price > s20 && s20 > s50 => MaPosition::AboveAll,
        (Some(s20), Some(s50)) if price < s20 && s20 < s50 => MaPosition::BelowAll,
        (Some(_), Some(_)) => MaPosition::Mixed,
        _ => MaPosition::Neutral,
    }
}

/// Last close against the close `lookback` candles from the end.
fn momentum(series: &CandleSeries, lookback: usize) -> Momentum {
    let len = series.klines();
    if lookback == 0 || len < lookback {
        return Momentum::Neutral;
    }
    let closes = &series.close_prices;
    match pct_change(closes[len - lookback], closes[len - 1]) {
        Some(c) if c > 2.0 => Momentum::StrongBullish,
        Some(c) if c > 0.5 => Momentum::Bullish,
        Some(c) if c < -2.0 => Momentum::StrongBearish,
        Some(c) if c < -0.5 => Momentum::Bearish,
        _ => Momentum::Neutral,
    }
}

/// Share of evaluated timeframes on the dominant trend side, 0..100.
pub fn alignment_score(reports: &[TimeframeReport]) -> f64 {
    if reports.is_empty() {
        return 0.0;
    }
    let up = reports.iter().filter(|r| r.trend == TimeframeTrend::Uptrend).count();
    let down = reports.iter().filter(|r| r.trend == TimeframeTrend::Downtrend).count();
    round_to(up.max(down) as f64 / reports.len() as f64 * 100.0, 2)
}

pub fn recommendation(reports: &[TimeframeReport], alignment_score: f64) -> Recommendation {
    let mut bull = 0u32;
    let mut bear = 0u32;
    for r in reports {
        match r.trend {
            TimeframeTrend::Uptrend => bull += 2,
            TimeframeTrend::Downtrend => bear += 2,
            _ => {}
        }
        match r.macd_state {
            MacdState::Bullish => bull += 1,
            MacdState::Bearish => bear += 1,
            MacdState::Neutral => {}
        }
        if r.momentum.is_bullish() {
            bull += 1;
        } else if r.momentum.is_bearish() {
            bear += 1;
        }
    }

    let (bull, bear) = (bull as f64, bear as f64);
    if bull > bear * 1.5 && alignment_score > 60.0 {
        Recommendation::StrongBuy
    } else if bull > bear {
        Recommendation::Buy
    } else if bear > bull * 1.5 && alignment_score > 60.0 {
        Recommendation::StrongSell
    } else if bear > bull {
        Recommendation::Sell
    } else {
        Recommendation::Neutral
    }
}

pub fn confidence(reports: &[TimeframeReport], configured: usize, alignment_score: f64) -> f64 {
    if reports.is_empty() || configured == 0 {
        return 0.0;
    }
    let evaluated = reports.len() as f64;
    let strong = reports.iter().filter(|r| r.momentum.is_strong()).count() as f64;
    let score = alignment_score * 0.6 + evaluated / configured as f64 * 20.0 + strong / evaluated * 20.0;
    round_to(score, 2).min(100.0)
}
