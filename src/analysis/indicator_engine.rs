//! Per-candle technical indicators.
//!
//! Every field is computed on its own; a field whose calculation fails is
//! logged and left undefined while the rest of the set is still filled in.

use anyhow::{Result, ensure};

use crate::config::ScannerConfig;
use crate::domain::PairInterval;
use crate::models::{CandleSeries, Indicator, IndicatorSet};
use crate::utils::maths_utils::{
    rolling_max, rolling_max_opt, rolling_mean, rolling_mean_opt, rolling_min, rolling_min_opt,
    rolling_std,
};

pub type Column = Vec<Option<f64>>;

pub const RSI_PERIOD: usize = 14;
pub const ATR_PERIOD: usize = 14;
pub const ADX_PERIOD: usize = 14;
pub const BB_PERIOD: usize = 20;
pub const BB_STD_DEVS: f64 = 2.0;

/// Compute the full `IndicatorSet` for `series`. Below the configured minimum
/// length every field stays undefined.
pub fn compute_indicators(series: &CandleSeries, config: &ScannerConfig) -> IndicatorSet {
    let len = series.klines();
    let mut set = IndicatorSet::undefined(len);
    if len < config.min_candles.indicators {
        return set;
    }

    let closes = &series.close_prices;
    let highs = &series.high_prices;
    let lows = &series.low_prices;
    let volumes = &series.volumes;
    let pair = &series.pair_interval;

    // Moving averages
    store(&mut set, pair, &[Indicator::Sma20], sma(closes, 20).map(|c| vec![c]));
    store(&mut set, pair, &[Indicator::Sma50], sma(closes, 50).map(|c| vec![c]));
    store(&mut set, pair, &[Indicator::Sma200], sma(closes, 200).map(|c| vec![c]));
    store(&mut set, pair, &[Indicator::Ema9], ema(closes, 9).map(|c| vec![c]));
    store(&mut set, pair, &[Indicator::Ema21], ema(closes, 21).map(|c| vec![c]));
    store(&mut set, pair, &[Indicator::Ema55], ema(closes, 55).map(|c| vec![c]));

    // Oscillators
    store(&mut set, pair, &[Indicator::Rsi], rsi(closes, RSI_PERIOD).map(|c| vec![c]));
    let stoch_rsi_result = stoch_rsi(&set.rsi, 14, 3, 3).map(|(k, d)| vec![k, d]);
    store(
        &mut set,
        pair,
        &[Indicator::StochRsiK, Indicator::StochRsiD],
        stoch_rsi_result,
    );
    store(
        &mut set,
        pair,
        &[Indicator::Macd, Indicator::MacdSignal, Indicator::MacdHistogram],
        macd(closes, 12, 26, 9).map(|(m, s, h)| vec![m, s, h]),
    );
    store(
        &mut set,
        pair,
        &[Indicator::StochK, Indicator::StochD],
        stochastic(highs, lows, closes, 14, 3).map(|(k, d)| vec![k, d]),
    );

    // Volatility
    store(
        &mut set,
        pair,
        &[Indicator::BbUpper, Indicator::BbMiddle, Indicator::BbLower],
        bollinger(closes, BB_PERIOD, BB_STD_DEVS).map(|(u, m, l)| vec![u, m, l]),
    );
    store(
        &mut set,
        pair,
        &[Indicator::Atr],
        atr(highs, lows, closes, ATR_PERIOD).map(|c| vec![c]),
    );

    // Volume
    store(
        &mut set,
        pair,
        &[Indicator::VolumeSma, Indicator::VolumeRatio],
        volume_ratio(volumes, config.signals.volume_window).map(|(s, r)| vec![s, r]),
    );
    store(&mut set, pair, &[Indicator::Obv], obv(closes, volumes).map(|c| vec![c]));
    store(
        &mut set,
        pair,
        &[Indicator::Vwap],
        vwap(highs, lows, closes, volumes).map(|c| vec![c]),
    );

    // Trend strength
    store(
        &mut set,
        pair,
        &[Indicator::Adx, Indicator::PlusDi, Indicator::MinusDi],
        adx(highs, lows, closes, ADX_PERIOD).map(|(a, p, m)| vec![a, p, m]),
    );

    #[cfg(debug_assertions)]
    if crate::config::debug::PRINT_UNDEFINED_INDICATORS {
        use strum::IntoEnumIterator;
        for ind in Indicator::iter() {
            if set.get_values_ref(ind).iter().all(Option::is_none) {
                log::info!("{}: {} is undefined for all {} candles", pair, ind, len);
            }
        }
    }

    set
}

fn store(
    set: &mut IndicatorSet,
    pair: &PairInterval,
    fields: &[Indicator],
    result: Result<Vec<Column>>,
) {
    let len = set.len();
    let checked = result.and_then(|columns| {
        ensure!(
            columns.len() == fields.len(),
            "expected {} columns, got {}",
            fields.len(),
            columns.len()
        );
        ensure!(
            columns.iter().all(|c| c.len() == len),
            "output not aligned to {} candles",
            len
        );
        Ok(columns)
    });

    match checked {
        Ok(columns) => {
            for (ind, column) in fields.iter().zip(columns) {
                *set.get_values_mut_ref(*ind) = column;
            }
        }
        Err(e) => {
            let names: Vec<String> = fields.iter().map(|f| f.to_string()).collect();
            log::warn!("{}: failed to compute {}: {:#}", pair, names.join("/"), e);
        }
    }
}

fn ensure_same_len(columns: &[&[f64]]) -> Result<()> {
    let len = columns.first().map_or(0, |c| c.len());
    ensure!(
        columns.iter().all(|c| c.len() == len),
        "input columns differ in length"
    );
    Ok(())
}

// ============================================================================
// Calculations
// ============================================================================

pub fn sma(values: &[f64], period: usize) -> Result<Column> {
    ensure!(period > 0, "SMA period must be positive");
    Ok(rolling_mean(values, period))
}

fn ema_values(values: &[f64], span: usize) -> Vec<f64> {
    let alpha = 2.0 / (span as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut prev: Option<f64> = None;
    for &v in values {
        let next = match prev {
            None => v,
            Some(p) => alpha * v + (1.0 - alpha) * p,
        };
        out.push(next);
        prev = Some(next);
    }
    out
}

/// Recursive EMA seeded with the first value, defined from index 0.
pub fn ema(values: &[f64], span: usize) -> Result<Column> {
    ensure!(span > 0, "EMA span must be positive");
    Ok(ema_values(values, span).into_iter().map(Some).collect())
}

/// Simple-average RSI. Flat windows (no gains, no losses) are undefined.
pub fn rsi(closes: &[f64], period: usize) -> Result<Column> {
    ensure!(period > 0, "RSI period must be positive");
    let mut out = vec![None; closes.len()];
    if closes.len() < 2 {
        return Ok(out);
    }
    let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    let gains: Vec<f64> = deltas.iter().map(|d| d.max(0.0)).collect();
    let losses: Vec<f64> = deltas.iter().map(|d| (-d).max(0.0)).collect();
    let avg_gain = rolling_mean(&gains, period);
    let avg_loss = rolling_mean(&losses, period);

    for (j, (gain, loss)) in avg_gain.iter().zip(&avg_loss).enumerate() {
        let (Some(gain), Some(loss)) = (gain, loss) else {
            continue;
        };
        out[j + 1] = if *loss == 0.0 {
            if *gain > 0.0 { Some(100.0) } else { None }
        } else {
            Some(100.0 - 100.0 / (1.0 + gain / loss))
        };
    }
    Ok(out)
}

/// Stochastic of RSI: (K, D), both scaled to 0..100.
pub fn stoch_rsi(
    rsi: &[Option<f64>],
    period: usize,
    k_smooth: usize,
    d_smooth: usize,
) -> Result<(Column, Column)> {
    ensure!(
        period > 0 && k_smooth > 0 && d_smooth > 0,
        "stochastic RSI periods must be positive"
    );
    let lowest = rolling_min_opt(rsi, period);
    let highest = rolling_max_opt(rsi, period);
    let raw: Column = rsi
        .iter()
        .zip(lowest.iter().zip(&highest))
        .map(|(r, (lo, hi))| match (r, lo, hi) {
            (Some(r), Some(lo), Some(hi)) if hi > lo => Some((r - lo) / (hi - lo) * 100.0),
            _ => None,
        })
        .collect();
    let k = rolling_mean_opt(&raw, k_smooth);
    let d = rolling_mean_opt(&k, d_smooth);
    Ok((k, d))
}

/// (MACD line, signal line, histogram)
pub fn macd(
    closes: &[f64],
    fast: usize,
    slow: usize,
    signal: usize,
) -> Result<(Column, Column, Column)> {
    ensure!(
        fast > 0 && slow > 0 && signal > 0,
        "MACD periods must be positive"
    );
    ensure!(fast < slow, "MACD fast span {} must be below slow span {}", fast, slow);
    let fast_ema = ema_values(closes, fast);
    let slow_ema = ema_values(closes, slow);
    let line: Vec<f64> = fast_ema.iter().zip(&slow_ema).map(|(f, s)| f - s).collect();
    let signal_line = ema_values(&line, signal);
    let histogram: Column = line
        .iter()
        .zip(&signal_line)
        .map(|(m, s)| Some(m - s))
        .collect();
    Ok((
        line.into_iter().map(Some).collect(),
        signal_line.into_iter().map(Some).collect(),
        histogram,
    ))
}

/// (upper, middle, lower) using the sample standard deviation.
pub fn bollinger(closes: &[f64], period: usize, std_devs: f64) -> Result<(Column, Column, Column)> {
    ensure!(period > 1, "Bollinger period must be at least 2");
    let middle = rolling_mean(closes, period);
    let std = rolling_std(closes, period);
    let band = |sign: f64| -> Column {
        middle
            .iter()
            .zip(&std)
            .map(|(m, s)| Some(m.as_ref()? + sign * std_devs * s.as_ref()?))
            .collect()
    };
    let upper = band(1.0);
    let lower = band(-1.0);
    Ok((upper, middle, lower))
}

/// True range; the first candle has no previous close and uses high - low.
pub fn true_range(highs: &[f64], lows: &[f64], closes: &[f64]) -> Vec<f64> {
    (0..closes.len())
        .map(|i| {
            let hl = highs[i] - lows[i];
            if i == 0 {
                hl
            } else {
                let prev = closes[i - 1];
                hl.max((highs[i] - prev).abs()).max((lows[i] - prev).abs())
            }
        })
        .collect()
}

pub fn atr(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Result<Column> {
    ensure!(period > 0, "ATR period must be positive");
    ensure_same_len(&[highs, lows, closes])?;
    Ok(rolling_mean(&true_range(highs, lows, closes), period))
}

/// (volume SMA, volume / volume SMA)
pub fn volume_ratio(volumes: &[f64], period: usize) -> Result<(Column, Column)> {
    ensure!(period > 0, "volume period must be positive");
    let avg = rolling_mean(volumes, period);
    let ratio = volumes
        .iter()
        .zip(&avg)
        .map(|(v, a)| a.filter(|a| *a > 0.0).map(|a| v / a))
        .collect();
    Ok((avg, ratio))
}

/// On-balance volume seeded with the first candle's volume.
pub fn obv(closes: &[f64], volumes: &[f64]) -> Result<Column> {
    ensure_same_len(&[closes, volumes])?;
    let mut out = Vec::with_capacity(closes.len());
    let mut running = 0.0;
    for i in 0..closes.len() {
        running = if i == 0 {
            volumes[0]
        } else if closes[i] > closes[i - 1] {
            running + volumes[i]
        } else if closes[i] < closes[i - 1] {
            running - volumes[i]
        } else {
            running
        };
        out.push(Some(running));
    }
    Ok(out)
}

/// Cumulative VWAP over the whole series.
pub fn vwap(highs: &[f64], lows: &[f64], closes: &[f64], volumes: &[f64]) -> Result<Column> {
    ensure_same_len(&[highs, lows, closes, volumes])?;
    let mut cum_pv = 0.0;
    let mut cum_v = 0.0;
    Ok((0..closes.len())
        .map(|i| {
            let typical = (highs[i] + lows[i] + closes[i]) / 3.0;
            cum_pv += typical * volumes[i];
            cum_v += volumes[i];
            if cum_v > 0.0 { Some(cum_pv / cum_v) } else { None }
        })
        .collect())
}

/// Stochastic oscillator (%K, %D).
pub fn stochastic(
    highs: &[f64],
    lows: &[f64],
    closes: &[f64],
    k_period: usize,
    d_period: usize,
) -> Result<(Column, Column)> {
    ensure!(k_period > 0 && d_period > 0, "stochastic periods must be positive");
    ensure_same_len(&[highs, lows, closes])?;
    let lowest = rolling_min(lows, k_period);
    let highest = rolling_max(highs, k_period);
    let k: Column = closes
        .iter()
        .zip(lowest.iter().zip(&highest))
        .map(|(c, (lo, hi))| match (lo, hi) {
            (Some(lo), Some(hi)) if hi > lo => Some(100.0 * (c - lo) / (hi - lo)),
            _ => None,
        })
        .collect();
    let d = rolling_mean_opt(&k, d_period);
    Ok((k, d))
}

/// (ADX, +DI, -DI) from simple rolling means.
pub fn adx(
    highs: &[f64],
    lows: &[f64],
    closes: &[f64],
    period: usize,
) -> Result<(Column, Column, Column)> {
    ensure!(period > 0, "ADX period must be positive");
    ensure_same_len(&[highs, lows, closes])?;
    let n = closes.len();
    let mut plus_dm = vec![0.0; n];
    let mut minus_dm = vec![0.0; n];
    for i in 1..n {
        let up = highs[i] - highs[i - 1];
        let down = lows[i - 1] - lows[i];
        if up > down && up > 0.0 {
            plus_dm[i] = up;
        }
        if down > up && down > 0.0 {
            minus_dm[i] = down;
        }
    }

    let atr = rolling_mean(&true_range(highs, lows, closes), period);
    let directional = |dm: &[f64]| -> Column {
        rolling_mean(dm, period)
            .iter()
            .zip(&atr)
            .map(|(m, a)| match (m, a) {
                (Some(m), Some(a)) if *a > 0.0 => Some(100.0 * m / a),
                _ => None,
            })
            .collect()
    };
    let plus_di = directional(&plus_dm);
    let minus_di = directional(&minus_dm);

    let dx: Column = plus_di
        .iter()
        .zip(&minus_di)
        .map(|(p, m)| match (p, m) {
            (Some(p), Some(m)) if p + m > 0.0 => Some(100.0 * (p - m).abs() / (p + m)),
            _ => None,
        })
        .collect();
    let adx = rolling_mean_opt(&dx, period);
    Ok((adx, plus_di, minus_di))
}
