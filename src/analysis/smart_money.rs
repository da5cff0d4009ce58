//! Smart-money structure: order blocks, fair value gaps, break of structure,
//! liquidity zones and liquidity sweeps.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::config::SmartMoneySettings;
use crate::models::{CandleSeries, Direction, LevelKind};
use crate::utils::maths_utils::{get_max, get_min, mean, swing_high_indices, swing_low_indices};

/// Below this many candles none of the structure detectors report anything.
pub const MIN_STRUCTURE_CANDLES: usize = 20;

/// Last candle before an impulse move.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct OrderBlock {
    pub direction: Direction,
    pub index: usize,
    pub timestamp_ms: i64,
    pub price_low: f64,
    pub price_high: f64,
    // Impulse candle range, percent
    pub strength: f64,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct FairValueGap {
    pub direction: Direction,
    // Third candle of the pattern
    pub index: usize,
    pub timestamp_ms: i64,
    pub gap_low: f64,
    pub gap_high: f64,
    pub size_pct: f64,
    pub filled: bool,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct StructureBreak {
    pub direction: Direction,
    // Swing candle that made the new extreme
    pub index: usize,
    pub timestamp_ms: i64,
    pub previous_extreme: f64,
    pub new_extreme: f64,
    pub strength: f64,
}

/// Equal highs (resting above) or equal lows (resting below).
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct LiquidityZone {
    pub side: LevelKind,
    pub index: usize,
    pub timestamp_ms: i64,
    pub price: f64,
    pub touches: u32,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct LiquiditySweep {
    pub direction: Direction,
    pub liquidity_level: f64,
    // Series max high (bearish sweep) or min low (bullish sweep)
    pub sweep_extreme: f64,
    pub current_price: f64,
    pub volume_confirmed: bool,
}

/// Scans `[lookback, len - 1)`; the candle after a block must move more
/// than `impulse_pct` of its own range.
pub fn find_order_blocks(series: &CandleSeries, lookback: usize, impulse_pct: f64) -> Vec<OrderBlock> {
    let len = series.klines();
    if len < MIN_STRUCTURE_CANDLES || len < lookback + 2 {
        return Vec::new();
    }

    let mut blocks = Vec::new();
    for i in lookback..len - 1 {
        let next = series.get_candle(i + 1);
        let (direction, move_size) = if next.is_bullish() && next.low > 0.0 {
            (Direction::Bullish, next.range() / next.low * 100.0)
        } else if next.is_bearish() && next.high > 0.0 {
            (Direction::Bearish, next.range() / next.high * 100.0)
        } else {
            continue;
        };

        if move_size > impulse_pct {
            blocks.push(OrderBlock {
                direction,
                index: i,
                timestamp_ms: series.timestamps_ms[i],
                price_low: series.low_prices[i],
                price_high: series.high_prices[i],
                strength: move_size,
            });
        }
    }
    blocks
}

/// Three-candle imbalances where candle 1 and candle 3 do not overlap.
pub fn find_fair_value_gaps(series: &CandleSeries, min_gap_pct: f64) -> Vec<FairValueGap> {
    let len = series.klines();
    if len < MIN_STRUCTURE_CANDLES {
        return Vec::new();
    }
    let highs = &series.high_prices;
    let lows = &series.low_prices;

    let mut gaps = Vec::new();
    for i in 2..len {
        let gap = if highs[i - 2] < lows[i] && highs[i - 2] > 0.0 {
            let size = (lows[i] - highs[i - 2]) / highs[i - 2] * 100.0;
            (Direction::Bullish, highs[i - 2], lows[i], size)
        } else if lows[i - 2] > highs[i] && highs[i] > 0.0 {
            let size = (lows[i - 2] - highs[i]) / highs[i] * 100.0;
            (Direction::Bearish, highs[i], lows[i - 2], size)
        } else {
            continue;
        };

        let (direction, gap_low, gap_high, size_pct) = gap;
        if size_pct >= min_gap_pct {
            gaps.push(FairValueGap {
                direction,
                index: i,
                timestamp_ms: series.timestamps_ms[i],
                gap_low,
                gap_high,
                size_pct,
                filled: false,
            });
        }
    }
    gaps
}

/// Rising consecutive swing highs (bullish) followed by falling consecutive
/// swing lows (bearish). Each group is chronological; the groups are not merged.
pub fn detect_break_of_structure(series: &CandleSeries, swing_period: usize) -> Vec<StructureBreak> {
    if series.klines() < MIN_STRUCTURE_CANDLES {
        return Vec::new();
    }
    let window = swing_period * 2 + 1;
    let highs = &series.high_prices;
    let lows = &series.low_prices;

    let mut breaks = Vec::new();
    let swing_highs = swing_high_indices(highs, window);
    for pair in swing_highs.windows(2) {
        let (prev, new) = (highs[pair[0]], highs[pair[1]]);
        if new > prev && prev > 0.0 {
            breaks.push(StructureBreak {
                direction: Direction::Bullish,
                index: pair[1],
                timestamp_ms: series.timestamps_ms[pair[1]],
                previous_extreme: prev,
                new_extreme: new,
                strength: (new - prev) / prev * 100.0,
            });
        }
    }

    let swing_lows = swing_low_indices(lows, window);
    for pair in swing_lows.windows(2) {
        let (prev, new) = (lows[pair[0]], lows[pair[1]]);
        if new < prev && prev > 0.0 {
            breaks.push(StructureBreak {
                direction: Direction::Bearish,
                index: pair[1],
                timestamp_ms: series.timestamps_ms[pair[1]],
                previous_extreme: prev,
                new_extreme: new,
                strength: (prev - new) / prev * 100.0,
            });
        }
    }

    breaks
}

/// Highs (lows) within `tolerance_pct` of a neighbouring candle's high (low).
pub fn find_liquidity_zones(series: &CandleSeries, tolerance_pct: f64) -> Vec<LiquidityZone> {
    if series.klines() < MIN_STRUCTURE_CANDLES {
        return Vec::new();
    }
    let mut zones = equal_extremes(series, &series.high_prices, LevelKind::Resistance, tolerance_pct);
    zones.extend(equal_extremes(series, &series.low_prices, LevelKind::Support, tolerance_pct));
    zones
}

fn equal_extremes(
    series: &CandleSeries,
    values: &[f64],
    side: LevelKind,
    tolerance_pct: f64,
) -> Vec<LiquidityZone> {
    let close_to = |a: f64, b: f64| a > 0.0 && (a - b).abs() / a * 100.0 < tolerance_pct;
    (0..values.len())
        .filter(|&i| {
            let v = values[i];
            let prev = i > 0 && close_to(v, values[i - 1]);
            let next = i + 1 < values.len() && close_to(v, values[i + 1]);
            prev || next
        })
        .map(|i| LiquidityZone {
            side,
            index: i,
            timestamp_ms: series.timestamps_ms[i],
            price: values[i],
            touches: 2,
        })
        .collect()
}

/// Zones that price traded through at some point but closed back inside.
/// One sweep per level price.
pub fn detect_liquidity_sweeps(
    series: &CandleSeries,
    zones: &[LiquidityZone],
    settings: &SmartMoneySettings,
    volume_window: usize,
) -> Vec<LiquiditySweep> {
    let Some(current_price) = series.last_close() else {
        return Vec::new();
    };
    if series.klines() < MIN_STRUCTURE_CANDLES || zones.is_empty() {
        return Vec::new();
    }

    let max_high = get_max(&series.high_prices);
    let min_low = get_min(&series.low_prices);
    let recent_volumes = &series.volumes[series.tail_start(volume_window)..];
    let volume_confirmed = match (mean(recent_volumes), series.volumes.last()) {
        (Some(avg), Some(&last)) => last > settings.liquidity_sweep_multiplier * avg,
        _ => false,
    };

    let mut seen = HashSet::new();
    let mut sweeps = Vec::new();
    for zone in zones {
        let sweep = match zone.side {
            LevelKind::Resistance if max_high > zone.price && current_price < zone.price => {
                (Direction::Bearish, max_high)
            }
            LevelKind::Support if min_low < zone.price && current_price > zone.price => {
                (Direction::Bullish, min_low)
            }
            _ => continue,
        };
        if !seen.insert(zone.price.to_bits()) {
            continue;
        }
        sweeps.push(LiquiditySweep {
            direction: sweep.0,
            liquidity_level: zone.price,
            sweep_extreme: sweep.1,
            current_price,
            volume_confirmed,
        });
    }
    sweeps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScannerConfig;
    use crate::utils::fixtures;

    fn settings() -> SmartMoneySettings {
        ScannerConfig::default().smart_money
    }

    #[test]
    fn short_series_finds_nothing() {
        let series = fixtures::series_from_closes(&fixtures::wave_closes(15, 100.0, 10.0, 4.0, 0.0));
        let s = settings();
        assert!(find_order_blocks(&series, s.order_block_lookback, s.order_block_impulse_pct).is_empty());
        assert!(find_fair_value_gaps(&series, s.fvg_min_size_pct).is_empty());
        assert!(detect_break_of_structure(&series, s.swing_period).is_empty());
        assert!(find_liquidity_zones(&series, s.liquidity_tolerance_pct).is_empty());
    }

    #[test]
    fn gap_up_yields_one_bullish_gap() {
        let mut rows = vec![(100.0, 100.0, 99.0, 99.5, 100.0); 25];
        rows[22] = (99.5, 100.0, 99.0, 99.8, 100.0);
        rows[23] = (100.0, 104.0, 100.0, 103.8, 100.0);
        rows[24] = (103.8, 105.0, 103.5, 104.5, 100.0);
        let series = fixtures::series_from_rows(&rows);

        let gaps = find_fair_value_gaps(&series, 0.5);
        assert_eq!(gaps.len(), 1);
        let gap = &gaps[0];
        assert_eq!(gap.direction, Direction::Bullish);
        assert_eq!(gap.index, 24);
        assert!((gap.size_pct - 3.5).abs() < 0.01);
        assert_eq!((gap.gap_low, gap.gap_high), (100.0, 103.5));
        assert!(!gap.filled);
    }

    #[test]
    fn small_gap_is_ignored() {
        let mut rows = vec![(100.0, 100.0, 99.0, 99.5, 100.0); 25];
        rows[24] = (100.2, 100.5, 100.2, 100.4, 100.0);
        let series = fixtures::series_from_rows(&rows);
        assert!(find_fair_value_gaps(&series, 0.5).is_empty());
    }

    #[test]
    fn order_block_precedes_impulse() {
        let mut rows = vec![(100.0, 100.2, 99.8, 100.0, 100.0); 30];
        rows[26] = (100.0, 105.0, 100.0, 104.5, 100.0);
        let series = fixtures::series_from_rows(&rows);
        let blocks = find_order_blocks(&series, 20, 2.0);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].index, 25);
        assert_eq!(blocks[0].direction, Direction::Bullish);
        assert!((blocks[0].strength - 5.0).abs() < 1e-9);
        assert_eq!(blocks[0].price_high, 100.2);
    }

    #[test]
    fn flat_series_has_no_structure() {
        let series = fixtures::flat_series(200, 50.0);
        let s = settings();
        assert!(find_order_blocks(&series, s.order_block_lookback, s.order_block_impulse_pct).is_empty());
        assert!(find_fair_value_gaps(&series, s.fvg_min_size_pct).is_empty());
        assert!(detect_break_of_structure(&series, s.swing_period).is_empty());
    }

    #[test]
    fn rising_swings_break_structure_in_order() {
        let closes = fixtures::wave_closes(120, 100.0, 5.0, 20.0, 0.5);
        let series = fixtures::series_from_closes(&closes);
        let breaks = detect_break_of_structure(&series, 5);
        assert!(breaks.iter().any(|b| b.direction == Direction::Bullish));
        assert!(breaks.iter().all(|b| b.direction == Direction::Bullish));
        assert!(breaks.windows(2).all(|w| w[0].index <= w[1].index));
    }

    #[test]
    fn bullish_breaks_are_listed_before_bearish() {
        let series = fixtures::falling_then_rising_series();
        let found: Vec<(Direction, usize)> = detect_break_of_structure(&series, 5)
            .iter()
            .map(|b| (b.direction, b.index))
            .collect();
        assert_eq!(
            found,
            vec![
                (Direction::Bullish, 75),
                (Direction::Bullish, 87),
                (Direction::Bullish, 99),
                (Direction::Bullish, 111),
                (Direction::Bearish, 21),
                (Direction::Bearish, 33),
                (Direction::Bearish, 45),
                (Direction::Bearish, 57),
            ]
        );
    }

    #[test]
    fn sweep_of_equal_highs_is_bearish_and_deduplicated() {
        let mut rows = vec![(100.0, 101.0, 99.0, 100.0, 100.0); 25];
        // Equal highs at 105, run above them, close back below.
        rows[10] = (100.0, 105.0, 99.5, 100.0, 100.0);
        rows[11] = (100.0, 105.05, 99.5, 100.0, 100.0);
        rows[20] = (100.0, 106.0, 99.5, 104.0, 100.0);
        rows[24] = (104.0, 104.5, 102.0, 103.0, 400.0);
        let series = fixtures::series_from_rows(&rows);
        let s = settings();

        let mut zones = find_liquidity_zones(&series, s.liquidity_tolerance_pct);
        let resistance: Vec<f64> = zones
            .iter()
            .filter(|z| z.side == LevelKind::Resistance)
            .map(|z| z.price)
            .collect();
        assert!(resistance.contains(&105.0) && resistance.contains(&105.05));

        // Same level twice only sweeps once.
        zones.push(zones[0].clone());
        let sweeps = detect_liquidity_sweeps(&series, &zones, &s, 20);
        let bearish: Vec<_> = sweeps
            .iter()
            .filter(|s| s.direction == Direction::Bearish)
            .collect();
        let unique_levels: HashSet<u64> = sweeps.iter().map(|s| s.liquidity_level.to_bits()).collect();
        assert_eq!(unique_levels.len(), sweeps.len());
        assert!(bearish.iter().any(|s| s.liquidity_level == 105.0));
        assert!(bearish.iter().all(|s| s.sweep_extreme == 106.0));
        assert!(sweeps.iter().all(|s| s.volume_confirmed));
    }
}
