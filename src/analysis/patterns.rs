//! Chart and candlestick pattern recognition.

use serde::{Deserialize, Serialize};

use crate::models::{CandleSeries, Direction};
use crate::utils::maths_utils::{
    get_max, get_min, linear_slope, mean, round_to, swing_high_indices, swing_low_indices,
};

const TRIANGLE_LOOKBACK: usize = 50;
const TRIANGLE_WINDOW: usize = 5;
// Slope below this counts as a flat boundary
const FLAT_SLOPE: f64 = 0.001;

const HEAD_SHOULDERS_LOOKBACK: usize = 100;
const HEAD_SHOULDERS_WINDOW: usize = 7;
const SHOULDER_TOLERANCE: f64 = 0.05;
const NECKLINE_CANDLES: usize = 50;

const FLAG_MIN_CANDLES: usize = 30;
const FLAGPOLE_MIN_MOVE: f64 = 0.05;
const FLAG_CONSOLIDATION_CANDLES: usize = 10;
const FLAG_RANGE_RATIO: f64 = 0.7;

const DOUBLE_LOOKBACK: usize = 50;
const DOUBLE_WINDOW: usize = 5;
const DOUBLE_TOLERANCE: f64 = 0.02;

const CANDLESTICK_MIN_CANDLES: usize = 3;

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reliability {
    High,
    Medium,
    Low,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(tag = "pattern", rename_all = "snake_case")]
pub enum ChartPattern {
    AscendingTriangle {
        resistance: f64,
        support_slope: f64,
    },
    DescendingTriangle {
        support: f64,
        resistance_slope: f64,
    },
    SymmetricalTriangle {
        resistance_slope: f64,
        support_slope: f64,
    },
    HeadAndShoulders {
        left_shoulder: f64,
        head: f64,
        right_shoulder: f64,
        neckline: f64,
    },
    InverseHeadAndShoulders {
        left_shoulder: f64,
        head: f64,
        right_shoulder: f64,
        neckline: f64,
    },
    BullFlag {
        flagpole_move_pct: f64,
        consolidation_range: f64,
    },
    BearFlag {
        flagpole_move_pct: f64,
        consolidation_range: f64,
    },
    DoubleTop {
        level: f64,
    },
    DoubleBottom {
        level: f64,
    },
    Hammer,
    ShootingStar,
    Doji,
    BullishEngulfing,
    BearishEngulfing,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct PatternMatch {
    pub direction: Direction,
    pub reliability: Reliability,
    #[serde(flatten)]
    pub pattern: ChartPattern,
}

impl PatternMatch {
    fn new(pattern: ChartPattern, direction: Direction, reliability: Reliability) -> Self {
        Self {
            direction,
            reliability,
            pattern,
        }
    }
}

/// Every detector in a fixed order: triangles, head and shoulders, flags,
/// double tops/bottoms, candlesticks.
pub fn find_all_patterns(series: &CandleSeries) -> Vec<PatternMatch> {
    let mut patterns = find_triangles(series);
    patterns.extend(find_head_and_shoulders(series));
    patterns.extend(find_flags(series));
    patterns.extend(find_double_top_bottom(series));
    patterns.extend(detect_candlestick_patterns(series));
    patterns
}

/// Swing values of `values` inside the trailing `lookback` window.
fn tail_swings(values: &[f64], lookback: usize, window: usize, highs: bool) -> Vec<f64> {
    let recent = &values[values.len().saturating_sub(lookback)..];
    let indices = if highs {
        swing_high_indices(recent, window)
    } else {
        swing_low_indices(recent, window)
    };
    indices.into_iter().map(|i| recent[i]).collect()
}

pub fn find_triangles(series: &CandleSeries) -> Vec<PatternMatch> {
    if series.klines() < TRIANGLE_LOOKBACK {
        return Vec::new();
    }
    let high_points = tail_swings(&series.high_prices, TRIANGLE_LOOKBACK, TRIANGLE_WINDOW, true);
    let low_points = tail_swings(&series.low_prices, TRIANGLE_LOOKBACK, TRIANGLE_WINDOW, false);
    if high_points.len() < 2 || low_points.len() < 2 {
        return Vec::new();
    }
    let (Some(high_slope), Some(low_slope)) = (linear_slope(&high_points), linear_slope(&low_points))
    else {
        return Vec::new();
    };

    let found = if high_slope.abs() < FLAT_SLOPE && low_slope > 0.0 {
        let Some(resistance) = mean(&high_points) else {
            return Vec::new();
        };
        PatternMatch::new(
            ChartPattern::AscendingTriangle {
                resistance,
                support_slope: low_slope,
            },
            Direction::Bullish,
            Reliability::High,
        )
    } else if low_slope.abs() < FLAT_SLOPE && high_slope < 0.0 {
        let Some(support) = mean(&low_points) else {
            return Vec::new();
        };
        PatternMatch::new(
            ChartPattern::DescendingTriangle {
                support,
                resistance_slope: high_slope,
            },
            Direction::Bearish,
            Reliability::High,
        )
    } else if high_slope < 0.0 && low_slope > 0.0 {
        PatternMatch::new(
            ChartPattern::SymmetricalTriangle {
                resistance_slope: high_slope,
                support_slope: low_slope,
            },
            Direction::Neutral,
            Reliability::Medium,
        )
    } else {
        return Vec::new();
    };
    vec![found]
}

/// Last three swing points form (shoulder, head, shoulder).
fn three_point_shape(points: &[f64], head_is_highest: bool) -> Option<(f64, f64, f64)> {
    if points.len() < 3 {
        return None;
    }
    let [left, head, right] = [
        points[points.len() - 3],
        points[points.len() - 2],
        points[points.len() - 1],
    ];
    let head_stands_out = if head_is_highest {
        head > left && head > right
    } else {
        head < left && head < right
    };
    let shoulders_match = left > 0.0 && (left - right).abs() / left < SHOULDER_TOLERANCE;
    (head_stands_out && shoulders_match).then_some((left, head, right))
}

pub fn find_head_and_shoulders(series: &CandleSeries) -> Vec<PatternMatch> {
    if series.klines() < HEAD_SHOULDERS_LOOKBACK {
        return Vec::new();
    }
    let mut patterns = Vec::new();
    let neckline_start = series.tail_start(NECKLINE_CANDLES);

    let peaks = tail_swings(
        &series.high_prices,
        HEAD_SHOULDERS_LOOKBACK,
        HEAD_SHOULDERS_WINDOW,
        true,
    );
    if let Some((left_shoulder, head, right_shoulder)) = three_point_shape(&peaks, true) {
        if let Some(neckline) = mean(&series.low_prices[neckline_start..]) {
            patterns.push(PatternMatch::new(
                ChartPattern::HeadAndShoulders {
                    left_shoulder,
                    head,
                    right_shoulder,
                    neckline,
                },
                Direction::Bearish,
                Reliability::High,
            ));
        }
    }

    let valleys = tail_swings(
        &series.low_prices,
        HEAD_SHOULDERS_LOOKBACK,
        HEAD_SHOULDERS_WINDOW,
        false,
    );
    if let Some((left_shoulder, head, right_shoulder)) = three_point_shape(&valleys, false) {
        if let Some(neckline) = mean(&series.high_prices[neckline_start..]) {
            patterns.push(PatternMatch::new(
                ChartPattern::InverseHeadAndShoulders {
                    left_shoulder,
                    head,
                    right_shoulder,
                    neckline,
                },
                Direction::Bullish,
                Reliability::High,
            ));
        }
    }
    patterns
}

/// Flagpole between close[-30] and close[-20], then a tight last 10 candles.
pub fn find_flags(series: &CandleSeries) -> Vec<PatternMatch> {
    let len = series.klines();
    if len < FLAG_MIN_CANDLES {
        return Vec::new();
    }
    let pole_start = series.close_prices[len - 30];
    let pole_end = series.close_prices[len - 20];
    if pole_start <= 0.0 {
        return Vec::new();
    }
    let pole_move = (pole_end - pole_start) / pole_start;
    if pole_move.abs() <= FLAGPOLE_MIN_MOVE {
        return Vec::new();
    }

    let flag_start = series.tail_start(FLAG_CONSOLIDATION_CANDLES);
    let consolidation_range =
        get_max(&series.high_prices[flag_start..]) - get_min(&series.low_prices[flag_start..]);
    let ranges: Vec<f64> = (series.tail_start(FLAG_MIN_CANDLES)..len)
        .map(|i| series.high_prices[i] - series.low_prices[i])
        .collect();
    let Some(avg_range) = mean(&ranges) else {
        return Vec::new();
    };
    if consolidation_range >= avg_range * FLAG_RANGE_RATIO {
        return Vec::new();
    }

    let flagpole_move_pct = round_to(pole_move * 100.0, 2);
    let consolidation_range = round_to(consolidation_range, 2);
    let found = if pole_move > 0.0 {
        PatternMatch::new(
            ChartPattern::BullFlag {
                flagpole_move_pct,
                consolidation_range,
            },
            Direction::Bullish,
            Reliability::Medium,
        )
    } else {
        PatternMatch::new(
            ChartPattern::BearFlag {
                flagpole_move_pct,
                consolidation_range,
            },
            Direction::Bearish,
            Reliability::Medium,
        )
    };
    vec![found]
}

pub fn find_double_top_bottom(series: &CandleSeries) -> Vec<PatternMatch> {
    if series.klines() < DOUBLE_LOOKBACK {
        return Vec::new();
    }
    let last_two_match = |points: &[f64]| -> Option<f64> {
        let [a, b] = points.get(points.len().checked_sub(2)?..)? else {
            return None;
        };
        (*a > 0.0 && (a - b).abs() / a < DOUBLE_TOLERANCE).then_some((a + b) / 2.0)
    };

    let mut patterns = Vec::new();
    let peaks = tail_swings(&series.high_prices, DOUBLE_LOOKBACK, DOUBLE_WINDOW, true);
    if let Some(level) = last_two_match(&peaks) {
        patterns.push(PatternMatch::new(
            ChartPattern::DoubleTop { level },
            Direction::Bearish,
            Reliability::High,
        ));
    }
    let valleys = tail_swings(&series.low_prices, DOUBLE_LOOKBACK, DOUBLE_WINDOW, false);
    if let Some(level) = last_two_match(&valleys) {
        patterns.push(PatternMatch::new(
            ChartPattern::DoubleBottom { level },
            Direction::Bullish,
            Reliability::High,
        ));
    }
    patterns
}

/// Single- and two-candle patterns on the latest candle.
pub fn detect_candlestick_patterns(series: &CandleSeries) -> Vec<PatternMatch> {
    let len = series.klines();
    if len < CANDLESTICK_MIN_CANDLES {
        return Vec::new();
    }
    let last = series.get_candle(len - 1);
    let prev = series.get_candle(len - 2);
    let body = last.body();
    let upper = last.upper_wick();
    let lower = last.lower_wick();

    let mut patterns = Vec::new();
    if lower > body * 2.0 && upper < body * 0.3 && last.is_bullish() {
        patterns.push(PatternMatch::new(
            ChartPattern::Hammer,
            Direction::Bullish,
            Reliability::Medium,
        ));
    }
    if upper > body * 2.0 && lower < body * 0.3 && last.is_bearish() {
        patterns.push(PatternMatch::new(
            ChartPattern::ShootingStar,
            Direction::Bearish,
            Reliability::Medium,
        ));
    }
    if body < last.range() * 0.1 {
        patterns.push(PatternMatch::new(
            ChartPattern::Doji,
            Direction::Neutral,
            Reliability::Low,
        ));
    }

    let prev_body = prev.body();
    if prev.is_bearish()
        && last.is_bullish()
        && last.close > prev.open
        && last.open < prev.close
        && body > prev_body
    {
        patterns.push(PatternMatch::new(
            ChartPattern::BullishEngulfing,
            Direction::Bullish,
            Reliability::High,
        ));
    }
    if prev.is_bullish()
        && last.is_bearish()
        && last.close < prev.open
        && last.open > prev.close
        && body > prev_body
    {
        patterns.push(PatternMatch::new(
            ChartPattern::BearishEngulfing,
            Direction::Bearish,
            Reliability::High,
        ));
    }
    patterns
}
