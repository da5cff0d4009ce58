//! Literal candle fixtures shared by unit tests.

use crate::domain::{Candle, PairInterval};
use crate::models::CandleSeries;
use crate::utils::TimeUtils;

pub const START_MS: i64 = 1_700_000_000_000;
pub const SYMBOL: &str = "TESTUSDT";

pub fn pair() -> PairInterval {
    PairInterval::new(SYMBOL, TimeUtils::MS_IN_H)
}

/// (open, high, low, close, volume) rows, hourly from `START_MS`.
pub fn series_from_rows(rows: &[(f64, f64, f64, f64, f64)]) -> CandleSeries {
    series_from_rows_at(pair(), rows)
}

pub fn series_from_rows_at(pair: PairInterval, rows: &[(f64, f64, f64, f64, f64)]) -> CandleSeries {
    let step = pair.interval_ms;
    let candles: Vec<Candle> = rows
        .iter()
        .enumerate()
        .map(|(i, &(o, h, l, c, v))| Candle::new(START_MS + i as i64 * step, o, h, l, c, v))
        .collect();
    CandleSeries::from_candles(pair, &candles)
}

/// Each candle opens at the previous close; wicks hug the body; volume 100.
pub fn series_from_closes(closes: &[f64]) -> CandleSeries {
    series_from_closes_at(pair(), closes)
}

pub fn series_from_closes_at(pair: PairInterval, closes: &[f64]) -> CandleSeries {
    let rows: Vec<_> = closes
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            let o = if i == 0 { c } else { closes[i - 1] };
            (o, o.max(c), o.min(c), c, 100.0)
        })
        .collect();
    series_from_rows_at(pair, &rows)
}

pub fn flat_series(len: usize, price: f64) -> CandleSeries {
    series_from_rows(&vec![(price, price, price, price, 100.0); len])
}

/// Straight line of closes from `start`, moving `step` per candle.
pub fn linear_closes(len: usize, start: f64, step: f64) -> Vec<f64> {
    (0..len).map(|i| start + step * i as f64).collect()
}

/// Smooth oscillation so swing detectors have something to find.
pub fn wave_closes(len: usize, base: f64, amplitude: f64, period: f64, drift: f64) -> Vec<f64> {
    (0..len)
        .map(|i| {
            let x = i as f64;
            base + drift * x + amplitude * (2.0 * std::f64::consts::PI * x / period).sin()
        })
        .collect()
}

/// 120 candles on a 12-candle wave that slides down 0.5 per candle until
/// candle 60 and climbs back after. Swing lows fall at 21, 33, 45, 57;
/// swing highs rise at 75, 87, 99, 111.
pub fn falling_then_rising_series() -> CandleSeries {
    let rows: Vec<_> = (0..120)
        .map(|i| {
            let x = i as f64;
            let drift = if i <= 60 { -0.5 * x } else { -30.0 + 0.5 * (x - 60.0) };
            let mid = 200.0 + drift + 5.0 * (2.0 * std::f64::consts::PI * x / 12.0).sin();
            (mid, mid + 1.0, mid - 1.0, mid, 100.0)
        })
        .collect();
    series_from_rows(&rows)
}
