use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::divergence::DivergenceMatch;
use crate::analysis::patterns::PatternMatch;
use crate::analysis::smart_money::{FairValueGap, LiquiditySweep, OrderBlock, StructureBreak};
use crate::analysis::technical::{TrendReading, VolumeAnomaly};
use crate::models::level::LevelKind;

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Bullish,
    Bearish,
    Neutral,
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

/// Signal kinds, listed in the order the aggregator evaluates them.
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
    strum_macros::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SignalCategory {
    StructureBreak,
    LevelApproach,
    Breakout,
    FalseBreakout,
    Imbalance,
    OrderBlock,
    LiquiditySweep,
    Divergence,
    Pattern,
    VolumeSpike,
    Confluence,
}

// ----------------------------------------------------------------------------
// Level-driven payloads (no standalone detector record behind them)
// ----------------------------------------------------------------------------

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct LevelApproach {
    pub level_kind: LevelKind,
    pub level_price: f64,
    pub distance_percent: f64,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Breakout {
    pub level_kind: LevelKind,
    pub broken_level: f64,
    pub previous_close: f64,
    pub volume_confirmed: bool,
    pub volume_ratio: Option<f64>,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct FalseBreakout {
    pub level_kind: LevelKind,
    pub failed_level: f64,
    // Deepest excursion through the level inside the lookback
    pub fake_extreme: f64,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Confluence {
    pub factors_count: usize,
    pub unique_types: usize,
    pub signal_types: Vec<SignalCategory>,
    pub description: String,
}

/// Typed payload, one variant per signal kind.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SignalDetails {
    StructureBreak(StructureBreak),
    LevelApproach(LevelApproach),
    Breakout(Breakout),
    FalseBreakout(FalseBreakout),
    Imbalance(FairValueGap),
    OrderBlock(OrderBlock),
    LiquiditySweep(LiquiditySweep),
    Divergence(DivergenceMatch),
    Pattern(PatternMatch),
    VolumeSpike(VolumeAnomaly),
    Confluence(Confluence),
}

impl SignalDetails {
    pub fn category(&self) -> SignalCategory {
        match self {
            SignalDetails::StructureBreak(_) => SignalCategory::StructureBreak,
            SignalDetails::LevelApproach(_) => SignalCategory::LevelApproach,
            SignalDetails::Breakout(_) => SignalCategory::Breakout,
            SignalDetails::FalseBreakout(_) => SignalCategory::FalseBreakout,
            SignalDetails::Imbalance(_) => SignalCategory::Imbalance,
            SignalDetails::OrderBlock(_) => SignalCategory::OrderBlock,
            SignalDetails::LiquiditySweep(_) => SignalCategory::LiquiditySweep,
            SignalDetails::Divergence(_) => SignalCategory::Divergence,
            SignalDetails::Pattern(_) => SignalCategory::Pattern,
            SignalDetails::VolumeSpike(_) => SignalCategory::VolumeSpike,
            SignalDetails::Confluence(_) => SignalCategory::Confluence,
        }
    }
}

/// Market context stamped onto every non-confluence signal.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct SignalAnnotations {
    pub trend: TrendReading,
    pub strength_index: f64,
    pub rsi: Option<f64>,
    pub macd: Option<f64>,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: String,
    pub timeframe: String,
    pub direction: Direction,
    pub price: f64,
    pub priority: Priority,
    pub details: SignalDetails,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<SignalAnnotations>,
}

impl Signal {
    pub fn category(&self) -> SignalCategory {
        self.details.category()
    }
}

/// Capped, ordered output of one aggregation run for one (symbol, timeframe).
#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct SignalBatch {
    pub symbol: String,
    pub timeframe: String,
    pub signals: Vec<Signal>,
}

impl SignalBatch {
    pub fn new(symbol: impl Into<String>, timeframe: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe: timeframe.into(),
            signals: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Signal> {
        self.signals.iter()
    }

    pub fn of_category(&self, category: SignalCategory) -> impl Iterator<Item = &Signal> {
        self.signals.iter().filter(move |s| s.category() == category)
    }

    pub fn count_of(&self, category: SignalCategory) -> usize {
        self.of_category(category).count()
    }
}
