use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandleType {
    Bullish,
    Bearish,
    // open == close
    Flat,
}

/// One OHLCV bar. `timestamp_ms` is the open time in ms since epoch.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Candle {
    pub timestamp_ms: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn new(timestamp_ms: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Candle {
            timestamp_ms,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    pub fn get_type(&self) -> CandleType {
        if self.close > self.open {
            CandleType::Bullish
        } else if self.close < self.open {
            CandleType::Bearish
        } else {
            CandleType::Flat
        }
    }

    pub fn is_bullish(&self) -> bool {
        self.get_type() == CandleType::Bullish
    }

    pub fn is_bearish(&self) -> bool {
        self.get_type() == CandleType::Bearish
    }

    // Low and high of the candle body
    pub fn body_range(&self) -> (f64, f64) {
        (self.open.min(self.close), self.open.max(self.close))
    }

    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    pub fn upper_wick(&self) -> f64 {
        self.high - self.body_range().1
    }

    pub fn lower_wick(&self) -> f64 {
        self.body_range().0 - self.low
    }

    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wick_geometry() {
        let c = Candle::new(0, 10.0, 12.0, 7.0, 11.0, 1.0);
        assert_eq!(c.get_type(), CandleType::Bullish);
        assert_eq!(c.body(), 1.0);
        assert_eq!(c.upper_wick(), 1.0);
        assert_eq!(c.lower_wick(), 3.0);
        assert_eq!(c.range(), 5.0);

        let flat = Candle::new(0, 10.0, 10.0, 10.0, 10.0, 1.0);
        assert!(!flat.is_bullish() && !flat.is_bearish());
    }
}
