use serde::{Deserialize, Serialize};

use crate::models::{CandleSeries, Direction, Indicator, IndicatorSet};
use crate::utils::maths_utils::{swing_high_indices, swing_low_indices};

pub const DIVERGENCE_LOOKBACK: usize = 50;
const SWING_WINDOW: usize = 5;

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Oscillator {
    Rsi,
    Macd,
}

impl Oscillator {
    pub fn indicator(self) -> Indicator {
        match self {
            Oscillator::Rsi => Indicator::Rsi,
            Oscillator::Macd => Indicator::Macd,
        }
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct DivergenceMatch {
    pub direction: Direction,
    pub oscillator: Oscillator,
    pub index1: usize,
    pub index2: usize,
    pub price_point1: f64,
    pub price_point2: f64,
    pub oscillator_point1: f64,
    pub oscillator_point2: f64,
}

/// Price/oscillator disagreement between the last two swing points of the
/// trailing window. Bullish is checked before bearish.
pub fn find_divergences(
    series: &CandleSeries,
    indicators: &IndicatorSet,
    oscillator: Oscillator,
) -> Vec<DivergenceMatch> {
    let len = series.klines();
    if len < DIVERGENCE_LOOKBACK || indicators.len() != len {
        return Vec::new();
    }
    let start = series.tail_start(DIVERGENCE_LOOKBACK);
    let ind = oscillator.indicator();
    let mut found = Vec::new();

    // Lower low in price, higher low in the oscillator
    let lows = &series.low_prices;
    let low_points: Vec<usize> = swing_low_indices(&lows[start..], SWING_WINDOW)
        .into_iter()
        .map(|i| i + start)
        .collect();
    if let [.., i1, i2] = low_points[..] {
        if let (Some(o1), Some(o2)) = (indicators.at(ind, i1), indicators.at(ind, i2)) {
            if lows[i2] < lows[i1] && o2 > o1 {
                found.push(DivergenceMatch {
                    direction: Direction::Bullish,
                    oscillator,
                    index1: i1,
                    index2: i2,
                    price_point1: lows[i1],
                    price_point2: lows[i2],
                    oscillator_point1: o1,
                    oscillator_point2: o2,
                });
            }
        }
    }

    // Higher high in price, lower high in the oscillator
    let highs = &series.high_prices;
    let high_points: Vec<usize> = swing_high_indices(&highs[start..], SWING_WINDOW)
        .into_iter()
        .map(|i| i + start)
        .collect();
    if let [.., i1, i2] = high_points[..] {
        if let (Some(o1), Some(o2)) = (indicators.at(ind, i1), indicators.at(ind, i2)) {
            if highs[i2] > highs[i1] && o2 < o1 {
                found.push(DivergenceMatch {
                    direction: Direction::Bearish,
                    oscillator,
                    index1: i1,
                    index2: i2,
                    price_point1: highs[i1],
                    price_point2: highs[i2],
                    oscillator_point1: o1,
                    oscillator_point2: o2,
                });
            }
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::fixtures;

    /// Two V-shaped dips: a low of 95 at candle 30 and a lower 93 at candle 45.
    fn double_dip() -> CandleSeries {
        let rows: Vec<_> = (0..60)
            .map(|i| {
                let x = i as f64;
                let low = (95.0 + 0.5 * (x - 30.0).abs()).min(93.0 + 0.5 * (x - 45.0).abs());
                (low + 1.0, low + 2.0, low, low + 1.0, 100.0)
            })
            .collect();
        fixtures::series_from_rows(&rows)
    }

    #[test]
    fn bullish_rsi_divergence_on_higher_oscillator_low() {
        let series = double_dip();
        let mut indicators = IndicatorSet::undefined(series.klines());
        indicators.rsi[30] = Some(25.0);
        indicators.rsi[45] = Some(35.0);

        let found = find_divergences(&series, &indicators, Oscillator::Rsi);
        assert_eq!(found.len(), 1);
        let d = &found[0];
        assert_eq!(d.direction, Direction::Bullish);
        assert_eq!((d.index1, d.index2), (30, 45));
        assert_eq!((d.price_point1, d.price_point2), (95.0, 93.0));
        assert_eq!(d.oscillator, Oscillator::Rsi);
    }

    #[test]
    fn undefined_oscillator_never_matches() {
        let series = double_dip();
        let mut indicators = IndicatorSet::undefined(series.klines());
        indicators.rsi[30] = Some(25.0);
        assert!(find_divergences(&series, &indicators, Oscillator::Rsi).is_empty());
        assert!(find_divergences(&series, &indicators, Oscillator::Macd).is_empty());
    }

    #[test]
    fn confirming_oscillator_is_not_divergence() {
        let series = double_dip();
        let mut indicators = IndicatorSet::undefined(series.klines());
        indicators.macd[30] = Some(-1.0);
        indicators.macd[45] = Some(-2.0);
        assert!(find_divergences(&series, &indicators, Oscillator::Macd).is_empty());
    }

    #[test]
    fn short_series_has_no_divergence() {
        let series = fixtures::series_from_closes(&fixtures::wave_closes(40, 100.0, 5.0, 10.0, 0.0));
        let indicators = IndicatorSet::undefined(series.klines());
        assert!(find_divergences(&series, &indicators, Oscillator::Rsi).is_empty());
    }
}
