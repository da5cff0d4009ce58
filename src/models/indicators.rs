use serde::{Deserialize, Serialize};

/// Every per-candle field the indicator engine produces.
#[derive(
    Copy,
    Clone,
    PartialEq,
    Eq,
    Hash,
    Debug,
    Serialize,
    Deserialize,
    strum_macros::EnumIter,
    strum_macros::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Indicator {
    #[strum(serialize = "sma_20")]
    Sma20,
    #[strum(serialize = "sma_50")]
    Sma50,
    #[strum(serialize = "sma_200")]
    Sma200,
    #[strum(serialize = "ema_9")]
    Ema9,
    #[strum(serialize = "ema_21")]
    Ema21,
    #[strum(serialize = "ema_55")]
    Ema55,
    Rsi,
    StochRsiK,
    StochRsiD,
    Macd,
    MacdSignal,
    MacdHistogram,
    BbUpper,
    BbMiddle,
    BbLower,
    Atr,
    VolumeSma,
    VolumeRatio,
    Obv,
    Vwap,
    StochK,
    StochD,
    Adx,
    PlusDi,
    MinusDi,
}

/// Indicator columns aligned index-for-index with the source `CandleSeries`.
/// `None` marks an undefined value (warm-up, zero denominator, failed field).
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct IndicatorSet {
    len: usize,
    pub sma_20: Vec<Option<f64>>,
    pub sma_50: Vec<Option<f64>>,
    pub sma_200: Vec<Option<f64>>,
    pub ema_9: Vec<Option<f64>>,
    pub ema_21: Vec<Option<f64>>,
    pub ema_55: Vec<Option<f64>>,
    pub rsi: Vec<Option<f64>>,
    pub stoch_rsi_k: Vec<Option<f64>>,
    pub stoch_rsi_d: Vec<Option<f64>>,
    pub macd: Vec<Option<f64>>,
    pub macd_signal: Vec<Option<f64>>,
    pub macd_histogram: Vec<Option<f64>>,
    pub bb_upper: Vec<Option<f64>>,
    pub bb_middle: Vec<Option<f64>>,
    pub bb_lower: Vec<Option<f64>>,
    pub atr: Vec<Option<f64>>,
    pub volume_sma: Vec<Option<f64>>,
    pub volume_ratio: Vec<Option<f64>>,
    pub obv: Vec<Option<f64>>,
    pub vwap: Vec<Option<f64>>,
    pub stoch_k: Vec<Option<f64>>,
    pub stoch_d: Vec<Option<f64>>,
    pub adx: Vec<Option<f64>>,
    pub plus_di: Vec<Option<f64>>,
    pub minus_di: Vec<Option<f64>>,
}

impl IndicatorSet {
    /// All fields undefined, `len` slots each.
    pub fn undefined(len: usize) -> Self {
        let empty = vec![None; len];
        Self {
            len,
            sma_20: empty.clone(),
            sma_50: empty.clone(),
            sma_200: empty.clone(),
            ema_9: empty.clone(),
            ema_21: empty.clone(),
            ema_55: empty.clone(),
            rsi: empty.clone(),
            stoch_rsi_k: empty.clone(),
            stoch_rsi_d: empty.clone(),
            macd: empty.clone(),
            macd_signal: empty.clone(),
            macd_histogram: empty.clone(),
            bb_upper: empty.clone(),
            bb_middle: empty.clone(),
            bb_lower: empty.clone(),
            atr: empty.clone(),
            volume_sma: empty.clone(),
            volume_ratio: empty.clone(),
            obv: empty.clone(),
            vwap: empty.clone(),
            stoch_k: empty.clone(),
            stoch_d: empty.clone(),
            adx: empty.clone(),
            plus_di: empty.clone(),
            minus_di: empty,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get_values_ref(&self, ind: Indicator) -> &Vec<Option<f64>> {
        match ind {
            Indicator::Sma20 => &self.sma_20,
            Indicator::Sma50 => &self.sma_50,
            Indicator::Sma200 => &self.sma_200,
            Indicator::Ema9 => &self.ema_9,
            Indicator::Ema21 => &self.ema_21,
            Indicator::Ema55 => &self.ema_55,
            Indicator::Rsi => &self.rsi,
            Indicator::StochRsiK => &self.stoch_rsi_k,
            Indicator::StochRsiD => &self.stoch_rsi_d,
            Indicator::Macd => &self.macd,
            Indicator::MacdSignal => &self.macd_signal,
            Indicator::MacdHistogram => &self.macd_histogram,
            Indicator::BbUpper => &self.bb_upper,
            Indicator::BbMiddle => &self.bb_middle,
            Indicator::BbLower => &self.bb_lower,
            Indicator::Atr => &self.atr,
            Indicator::VolumeSma => &self.volume_sma,
            Indicator::VolumeRatio => &self.volume_ratio,
            Indicator::Obv => &self.obv,
            Indicator::Vwap => &self.vwap,
            Indicator::StochK => &self.stoch_k,
            Indicator::StochD => &self.stoch_d,
            Indicator::Adx => &self.adx,
            Indicator::PlusDi => &self.plus_di,
            Indicator::MinusDi => &self.minus_di,
        }
    }

    pub(crate) fn get_values_mut_ref(&mut self, ind: Indicator) -> &mut Vec<Option<f64>> {
        match ind {
            Indicator::Sma20 => &mut self.sma_20,
            Indicator::Sma50 => &mut self.sma_50,
            Indicator::Sma200 => &mut self.sma_200,
            Indicator::Ema9 => &mut self.ema_9,
            Indicator::Ema21 => &mut self.ema_21,
            Indicator::Ema55 => &mut self.ema_55,
            Indicator::Rsi => &mut self.rsi,
            Indicator::StochRsiK => &mut self.stoch_rsi_k,
            Indicator::StochRsiD => &mut self.stoch_rsi_d,
            Indicator::Macd => &mut self.macd,
            Indicator::MacdSignal => &mut self.macd_signal,
            Indicator::MacdHistogram => &mut self.macd_histogram,
            Indicator::BbUpper => &mut self.bb_upper,
            Indicator::BbMiddle => &mut self.bb_middle,
            Indicator::BbLower => &mut self.bb_lower,
            Indicator::Atr => &mut self.atr,
            Indicator::VolumeSma => &mut self.volume_sma,
            Indicator::VolumeRatio => &mut self.volume_ratio,
            Indicator::Obv => &mut self.obv,
            Indicator::Vwap => &mut self.vwap,
            Indicator::StochK => &mut self.stoch_k,
            Indicator::StochD => &mut self.stoch_d,
            Indicator::Adx => &mut self.adx,
            Indicator::PlusDi => &mut self.plus_di,
            Indicator::MinusDi => &mut self.minus_di,
        }
    }

    /// Value at `idx`; out of range reads as undefined.
    pub fn at(&self, ind: Indicator, idx: usize) -> Option<f64> {
        self.get_values_ref(ind).get(idx).copied().flatten()
    }

    pub fn last(&self, ind: Indicator) -> Option<f64> {
        self.get_values_ref(ind).last().copied().flatten()
    }

    /// Mean over the defined values of a column (undefined slots skipped).
    pub fn mean_defined(&self, ind: Indicator) -> Option<f64> {
        let defined: Vec<f64> = self.get_values_ref(ind).iter().flatten().copied().collect();
        crate::utils::maths_utils::mean(&defined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn undefined_set_has_aligned_empty_columns() {
        let set = IndicatorSet::undefined(7);
        for ind in Indicator::iter() {
            assert_eq!(set.get_values_ref(ind).len(), 7, "{}", ind);
            assert_eq!(set.last(ind), None);
        }
        assert_eq!(set.at(Indicator::Rsi, 100), None);
    }

    #[test]
    fn mean_defined_skips_gaps() {
        let mut set = IndicatorSet::undefined(3);
        set.atr = vec![None, Some(2.0), Some(4.0)];
        assert_eq!(set.mean_defined(Indicator::Atr), Some(3.0));
        assert_eq!(set.mean_defined(Indicator::Adx), None);
    }

    #[test]
    fn display_names_match_column_names() {
        assert_eq!(Indicator::Sma200.to_string(), "sma_200");
        assert_eq!(Indicator::Ema9.to_string(), "ema_9");
        assert_eq!(Indicator::StochRsiK.to_string(), "stoch_rsi_k");
        assert_eq!(Indicator::MacdHistogram.to_string(), "macd_histogram");
        assert_eq!(Indicator::PlusDi.to_string(), "plus_di");
    }
}
