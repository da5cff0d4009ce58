use anyhow::{Result, anyhow, bail, ensure};
use serde::{Deserialize, Serialize};

use crate::domain::candle::Candle;
use crate::domain::pair_interval::PairInterval;

// ============================================================================
// CandleSeries: Raw OHLCV data for one pair at one interval, column-wise
// ============================================================================

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CandleSeries {
    pub pair_interval: PairInterval,

    // Candle open times, strictly increasing
    pub timestamps_ms: Vec<i64>,

    // Prices
    pub open_prices: Vec<f64>,
    pub high_prices: Vec<f64>,
    pub low_prices: Vec<f64>,
    pub close_prices: Vec<f64>,

    pub volumes: Vec<f64>,
}

pub fn find_matching_series<'a>(
    series_data: &'a [CandleSeries],
    pair_name: &str,
    interval_ms: i64,
) -> Result<&'a CandleSeries> {
    series_data
        .iter()
        .find(|s| s.pair_interval.name == pair_name && s.pair_interval.interval_ms == interval_ms)
        .ok_or_else(|| {
            anyhow!(
                "No candle series found for pair {} with interval {} ms",
                pair_name,
                interval_ms
            )
        })
}

impl CandleSeries {
    pub fn new(pair_interval: PairInterval) -> Self {
        Self {
            pair_interval,
            timestamps_ms: Vec::new(),
            open_prices: Vec::new(),
            high_prices: Vec::new(),
            low_prices: Vec::new(),
            close_prices: Vec::new(),
            volumes: Vec::new(),
        }
    }

    pub fn from_candles(pair_interval: PairInterval, candles: &[Candle]) -> Self {
        let mut series = Self::new(pair_interval);
        for candle in candles {
            series.push(candle);
        }
        series
    }

    pub fn push(&mut self, candle: &Candle) {
        self.timestamps_ms.push(candle.timestamp_ms);
        self.open_prices.push(candle.open);
        self.high_prices.push(candle.high);
        self.low_prices.push(candle.low);
        self.close_prices.push(candle.close);
        self.volumes.push(candle.volume);
    }

    pub fn get_candle(&self, idx: usize) -> Candle {
        Candle::new(
            self.timestamps_ms[idx],
            self.open_prices[idx],
            self.high_prices[idx],
            self.low_prices[idx],
            self.close_prices[idx],
            self.volumes[idx],
        )
    }

    pub fn klines(&self) -> usize {
        self.close_prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.close_prices.is_empty()
    }

    pub fn symbol(&self) -> &str {
        self.pair_interval.name()
    }

    pub fn last_candle(&self) -> Option<Candle> {
        self.klines().checked_sub(1).map(|idx| self.get_candle(idx))
    }

    pub fn last_close(&self) -> Option<f64> {
        self.close_prices.last().copied()
    }

    /// Start index of the trailing window holding at most `count` candles.
    pub fn tail_start(&self, count: usize) -> usize {
        self.klines().saturating_sub(count)
    }

    /// Columns of equal length, strictly increasing timestamps, finite non-negative values.
    pub fn validate(&self) -> Result<()> {
        let len = self.klines();
        let columns = [
            ("open", self.open_prices.len()),
            ("high", self.high_prices.len()),
            ("low", self.low_prices.len()),
            ("volume", self.volumes.len()),
            ("timestamp", self.timestamps_ms.len()),
        ];
        for (name, column_len) in columns {
            ensure!(
                column_len == len,
                "{}: {} column has {} values but close has {}",
                self.pair_interval,
                name,
                column_len,
                len
            );
        }

        if let Some(pos) = self.timestamps_ms.windows(2).position(|w| w[1] <= w[0]) {
            bail!(
                "{}: timestamps not strictly increasing at index {} ({} -> {})",
                self.pair_interval,
                pos + 1,
                self.timestamps_ms[pos],
                self.timestamps_ms[pos + 1]
            );
        }

        let prices = [
            &self.open_prices,
            &self.high_prices,
            &self.low_prices,
            &self.close_prices,
            &self.volumes,
        ];
        for column in prices {
            if let Some(idx) = column.iter().position(|v| !v.is_finite() || *v < 0.0) {
                bail!(
                    "{}: invalid value {} at index {}",
                    self.pair_interval,
                    column[idx],
                    idx
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::fixtures;

    #[test]
    fn get_candle_reads_columns() {
        let series = fixtures::series_from_closes(&[1.0, 2.0, 3.0]);
        let c = series.get_candle(1);
        assert_eq!(c.close, 2.0);
        assert_eq!(c.timestamp_ms, series.timestamps_ms[1]);
        assert_eq!(series.last_close(), Some(3.0));
        assert_eq!(series.tail_start(10), 0);
        assert_eq!(series.tail_start(2), 1);
    }

    #[test]
    fn validate_rejects_malformed_series() {
        let good = fixtures::series_from_closes(&[1.0, 2.0, 3.0]);
        assert!(good.validate().is_ok());

        let mut ragged = good.clone();
        ragged.volumes.pop();
        assert!(ragged.validate().is_err());

        let mut unordered = good.clone();
        unordered.timestamps_ms[2] = unordered.timestamps_ms[1];
        assert!(unordered.validate().is_err());

        let mut nan = good.clone();
        nan.high_prices[0] = f64::NAN;
        assert!(nan.validate().is_err());
    }

    #[test]
    fn find_matching_series_by_pair_and_interval() {
        let a = fixtures::series_from_closes(&[1.0]);
        let found = find_matching_series(std::slice::from_ref(&a), a.symbol(), a.pair_interval.interval_ms);
        assert!(found.is_ok());
        assert!(find_matching_series(&[a], "NOPE", 1).is_err());
    }
}
