//! Whole-series technical readings: trend votes, strength index, oscillator
//! conditions, pivot points and volume anomalies.

use serde::{Deserialize, Serialize};

use crate::config::ScannerConfig;
use crate::models::{CandleSeries, Indicator, IndicatorSet};
use crate::utils::maths_utils::{mean, round_to};

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendBias {
    Bullish,
    Bearish,
    Sideways,
    Unknown,
}

#[derive(Copy, Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct TrendReading {
    pub bias: TrendBias,
    // 0..100, share of the vote the winning side holds over the loser
    pub strength: f64,
}

impl TrendReading {
    fn flat(bias: TrendBias) -> Self {
        Self { bias, strength: 0.0 }
    }
}

/// Moving-average vote: price vs SMA20 and SMA50 (one vote each), EMA9 vs
/// EMA21 (two votes).
pub fn detect_trend(series: &CandleSeries, ind: &IndicatorSet, config: &ScannerConfig) -> TrendReading {
    if series.klines() < config.min_candles.trend {
        return TrendReading::flat(TrendBias::Unknown);
    }
    let Some(price) = series.last_close() else {
        return TrendReading::flat(TrendBias::Unknown);
    };

    let mut bullish = 0u32;
    let mut bearish = 0u32;
    for ma in [Indicator::Sma20, Indicator::Sma50] {
        match ind.last(ma) {
            Some(v) if price > v => bullish += 1,
            Some(v) if price < v => bearish += 1,
            _ => {}
        }
    }
    if let (Some(fast), Some(slow)) = (ind.last(Indicator::Ema9), ind.last(Indicator::Ema21)) {
        if fast > slow {
            bullish += 2;
        } else {
            bearish += 2;
        }
    }

    let total = bullish + bearish;
    if total == 0 || bullish == bearish {
        return TrendReading::flat(TrendBias::Sideways);
    }
    let strength = round_to(bullish.abs_diff(bearish) as f64 / total as f64 * 100.0, 2);
    let bias = if bullish > bearish {
        TrendBias::Bullish
    } else {
        TrendBias::Bearish
    };
    TrendReading { bias, strength }
}

/// 0..100 composite of MA position, RSI health, MACD, volume and volatility.
pub fn strength_index(series: &CandleSeries, ind: &IndicatorSet, config: &ScannerConfig) -> f64 {
    const MAX_SCORE: f64 = 10.0;
    if series.klines() < config.min_candles.trend {
        return 0.0;
    }
    let Some(price) = series.last_close() else {
        return 0.0;
    };

    let mut score = 0.0;
    for ma in [Indicator::Sma20, Indicator::Sma50, Indicator::Ema21] {
        if ind.last(ma).is_some_and(|v| price > v) {
            score += 1.0;
        }
    }
    if let Some(rsi) = ind.last(Indicator::Rsi) {
        if rsi > 40.0 && rsi < 70.0 {
            score += 2.0;
        } else if rsi > 30.0 && rsi < 80.0 {
            score += 1.0;
        }
    }
    if let (Some(macd), Some(signal)) = (ind.last(Indicator::Macd), ind.last(Indicator::MacdSignal)) {
        if macd > signal {
            score += 2.0;
        }
    }
    if ind.last(Indicator::VolumeRatio).is_some_and(|r| r > 1.0) {
        score += 2.0;
    }
    if let (Some(atr), Some(avg_atr)) = (ind.last(Indicator::Atr), ind.mean_defined(Indicator::Atr)) {
        if atr > avg_atr {
            score += 1.0;
        }
    }
    round_to(score / MAX_SCORE * 100.0, 2)
}

// ============================================================================
// ADX-qualified market trend
// ============================================================================

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketTrend {
    StrongUptrend,
    Uptrend,
    Sideways,
    Downtrend,
    StrongDowntrend,
    Unknown,
}

impl MarketTrend {
    pub fn is_up(self) -> bool {
        matches!(self, MarketTrend::StrongUptrend | MarketTrend::Uptrend)
    }

    pub fn is_down(self) -> bool {
        matches!(self, MarketTrend::StrongDowntrend | MarketTrend::Downtrend)
    }
}

#[derive(Copy, Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct MarketTrendReading {
    pub trend: MarketTrend,
    // 0 none, 1 weak, 2 strong, 3 very strong
    pub adx_strength: u8,
    pub adx: Option<f64>,
}

/// Close / EMA21 / EMA55 stacking, confirmed by the dominant DI line.
pub fn determine_market_trend(
    series: &CandleSeries,
    ind: &IndicatorSet,
    min_candles: usize,
) -> MarketTrendReading {
    let unknown = MarketTrendReading {
        trend: MarketTrend::Unknown,
        adx_strength: 0,
        adx: None,
    };
    if series.klines() < min_candles {
        return unknown;
    }
    let Some(price) = series.last_close() else {
        return unknown;
    };

    let ma_stack = match (ind.last(Indicator::Ema21), ind.last(Indicator::Ema55)) {
        (Some(e21), Some(e55)) if price > e21 && e21 > e55 => Some(true),
        (Some(e21), Some(e55)) if price < e21 && e21 < e55 => Some(false),
        _ => None,
    };

    let adx = ind.last(Indicator::Adx);
    let adx_strength = match adx {
        Some(a) if a > 50.0 => 3,
        Some(a) if a > 25.0 => 2,
        Some(a) if a > 15.0 => 1,
        _ => 0,
    };

    let di_bullish = match (ind.last(Indicator::PlusDi), ind.last(Indicator::MinusDi)) {
        (Some(plus), Some(minus)) => Some(plus > minus),
        _ => None,
    };

    let trend = match (ma_stack, di_bullish) {
        (Some(true), Some(true)) => MarketTrend::StrongUptrend,
        (Some(true), _) => MarketTrend::Uptrend,
        (Some(false), Some(false)) => MarketTrend::StrongDowntrend,
        (Some(false), _) => MarketTrend::Downtrend,
        (None, _) => MarketTrend::Sideways,
    };

    MarketTrendReading {
        trend,
        adx_strength,
        adx,
    }
}

// ============================================================================
// Conditions on the latest candle
// ============================================================================

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(tag = "condition", rename_all = "snake_case")]
pub enum TechnicalCondition {
    RsiOversold { rsi: f64 },
    RsiOverbought { rsi: f64 },
    MacdBullishCrossover { macd: f64, signal: f64 },
    MacdBearishCrossover { macd: f64, signal: f64 },
    BollingerSqueeze { width_pct: f64, avg_width_pct: f64 },
}

/// RSI crossing into oversold/overbought on the latest candle.
pub fn check_rsi_conditions(ind: &IndicatorSet, config: &ScannerConfig) -> Option<TechnicalCondition> {
    let len = ind.len();
    if len < 2 {
        return None;
    }
    let current = ind.at(Indicator::Rsi, len - 1)?;
    let previous = ind.at(Indicator::Rsi, len - 2)?;
    let osc = &config.oscillators;

    if current < osc.rsi_oversold && previous >= osc.rsi_oversold {
        Some(TechnicalCondition::RsiOversold {
            rsi: round_to(current, 2),
        })
    } else if current > osc.rsi_overbought && previous <= osc.rsi_overbought {
        Some(TechnicalCondition::RsiOverbought {
            rsi: round_to(current, 2),
        })
    } else {
        None
    }
}

pub fn check_macd_crossover(ind: &IndicatorSet) -> Option<TechnicalCondition> {
    let len = ind.len();
    if len < 2 {
        return None;
    }
    let macd = ind.at(Indicator::Macd, len - 1)?;
    let signal = ind.at(Indicator::MacdSignal, len - 1)?;
    let prev_macd = ind.at(Indicator::Macd, len - 2)?;
    let prev_signal = ind.at(Indicator::MacdSignal, len - 2)?;
    let (macd_r, signal_r) = (round_to(macd, 4), round_to(signal, 4));

    if prev_macd <= prev_signal && macd > signal {
        Some(TechnicalCondition::MacdBullishCrossover {
            macd: macd_r,
            signal: signal_r,
        })
    } else if prev_macd >= prev_signal && macd < signal {
        Some(TechnicalCondition::MacdBearishCrossover {
            macd: macd_r,
            signal: signal_r,
        })
    } else {
        None
    }
}

/// Latest band width under half the mean width of the last 20 candles.
pub fn check_bollinger_squeeze(ind: &IndicatorSet) -> Option<TechnicalCondition> {
    const SQUEEZE_CANDLES: usize = 20;
    let len = ind.len();
    if len < SQUEEZE_CANDLES {
        return None;
    }
    let width = |i: usize| -> Option<f64> {
        let middle = ind.at(Indicator::BbMiddle, i)?;
        if middle == 0.0 {
            return None;
        }
        Some((ind.at(Indicator::BbUpper, i)? - ind.at(Indicator::BbLower, i)?) / middle)
    };
    let current = width(len - 1)?;
    let recent: Vec<f64> = (len - SQUEEZE_CANDLES..len).filter_map(width).collect();
    let avg = mean(&recent)?;

    (current < avg * 0.5).then(|| TechnicalCondition::BollingerSqueeze {
        width_pct: round_to(current * 100.0, 2),
        avg_width_pct: round_to(avg * 100.0, 2),
    })
}

/// All latest-candle conditions, in a fixed order.
pub fn technical_conditions(ind: &IndicatorSet, config: &ScannerConfig) -> Vec<TechnicalCondition> {
    [
        check_rsi_conditions(ind, config),
        check_macd_crossover(ind),
        check_bollinger_squeeze(ind),
    ]
    .into_iter()
    .flatten()
    .collect()
}

// ============================================================================
// Pivot points and volume
// ============================================================================

/// Classic floor pivots from the latest candle.
#[derive(Copy, Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct PivotPoints {
    pub pivot: f64,
    pub r1: f64,
    pub r2: f64,
    pub r3: f64,
    pub s1: f64,
    pub s2: f64,
    pub s3: f64,
}

pub fn pivot_points(series: &CandleSeries) -> Option<PivotPoints> {
    let last = series.last_candle()?;
    let (high, low) = (last.high, last.low);
    let pivot = last.typical_price();
    Some(PivotPoints {
        pivot,
        r1: 2.0 * pivot - low,
        r2: pivot + (high - low),
        r3: high + 2.0 * (pivot - low),
        s1: 2.0 * pivot - high,
        s2: pivot - (high - low),
        s3: low - 2.0 * (high - pivot),
    })
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct VolumeAnomaly {
    pub current_volume: f64,
    pub average_volume: f64,
    pub ratio: f64,
    pub is_anomaly: bool,
}

/// Latest volume against the mean of the `window` volumes before it.
pub fn detect_volume_anomaly(series: &CandleSeries, window: usize, multiplier: f64) -> Option<VolumeAnomaly> {
    let len = series.klines();
    if window == 0 || len < window + 1 {
        return None;
    }
    let current_volume = series.volumes[len - 1];
    let average_volume = mean(&series.volumes[len - 1 - window..len - 1])?;
    if average_volume <= 0.0 {
        return None;
    }
    let ratio = current_volume / average_volume;
    Some(VolumeAnomaly {
        current_volume,
        average_volume,
        ratio: round_to(ratio, 2),
        is_anomaly: current_volume > multiplier * average_volume,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::indicator_engine::compute_indicators;
    use crate::utils::fixtures;

    fn config() -> ScannerConfig {
        ScannerConfig::default()
    }

    #[test]
    fn rising_series_trends_bullish() {
        let series = fixtures::series_from_closes(&fixtures::linear_closes(80, 100.0, 1.0));
        let ind = compute_indicators(&series, &config());
        let trend = detect_trend(&series, &ind, &config());
        assert_eq!(trend.bias, TrendBias::Bullish);
        assert_eq!(trend.strength, 100.0);

        let market = determine_market_trend(&series, &ind, 50);
        assert_eq!(market.trend, MarketTrend::StrongUptrend);
        assert_eq!(market.adx_strength, 3);
    }

    #[test]
    fn short_series_trend_is_unknown() {
        let series = fixtures::series_from_closes(&fixtures::linear_closes(30, 100.0, 1.0));
        let ind = compute_indicators(&series, &config());
        assert_eq!(detect_trend(&series, &ind, &config()).bias, TrendBias::Unknown);
        assert_eq!(strength_index(&series, &ind, &config()), 0.0);
    }

    #[test]
    fn strength_index_is_bounded() {
        let series = fixtures::series_from_closes(&fixtures::wave_closes(150, 100.0, 6.0, 31.0, 0.1));
        let ind = compute_indicators(&series, &config());
        let score = strength_index(&series, &ind, &config());
        assert!((0.0..=100.0).contains(&score));
    }

    #[test]
    fn rsi_condition_fires_on_entry_only() {
        let mut ind = IndicatorSet::undefined(3);
        ind.rsi = vec![Some(40.0), Some(31.0), Some(28.0)];
        assert_eq!(
            check_rsi_conditions(&ind, &config()),
            Some(TechnicalCondition::RsiOversold { rsi: 28.0 })
        );
        ind.rsi = vec![Some(40.0), Some(29.0), Some(28.0)];
        assert_eq!(check_rsi_conditions(&ind, &config()), None);
        ind.rsi = vec![Some(40.0), None, Some(28.0)];
        assert_eq!(check_rsi_conditions(&ind, &config()), None);
    }

    #[test]
    fn macd_crossover_direction() {
        let mut ind = IndicatorSet::undefined(2);
        ind.macd = vec![Some(-0.5), Some(0.2)];
        ind.macd_signal = vec![Some(0.0), Some(0.1)];
        assert!(matches!(
            check_macd_crossover(&ind),
            Some(TechnicalCondition::MacdBullishCrossover { .. })
        ));
        ind.macd = vec![Some(0.5), Some(0.0)];
        assert!(matches!(
            check_macd_crossover(&ind),
            Some(TechnicalCondition::MacdBearishCrossover { .. })
        ));
    }

    #[test]
    fn pivots_from_last_candle() {
        let series = fixtures::series_from_rows(&[(10.0, 12.0, 8.0, 10.0, 1.0)]);
        let p = pivot_points(&series).unwrap();
        assert_eq!(p.pivot, 10.0);
        assert_eq!((p.r1, p.s1), (12.0, 8.0));
        assert_eq!((p.r2, p.s2), (14.0, 6.0));
        assert_eq!((p.r3, p.s3), (16.0, 4.0));
        assert!(pivot_points(&fixtures::series_from_rows(&[])).is_none());
    }

    #[test]
    fn volume_anomaly_excludes_current_candle() {
        let mut rows = vec![(1.0, 1.0, 1.0, 1.0, 100.0); 21];
        rows[20].4 = 250.0;
        let series = fixtures::series_from_rows(&rows);
        let anomaly = detect_volume_anomaly(&series, 20, 2.0).unwrap();
        assert_eq!(anomaly.average_volume, 100.0);
        assert!(anomaly.is_anomaly);
        assert_eq!(anomaly.ratio, 2.5);

        let short = fixtures::series_from_rows(&rows[..20]);
        assert!(detect_volume_anomaly(&short, 20, 2.0).is_none());
    }
}
