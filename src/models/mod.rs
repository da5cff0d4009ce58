// Domain models for signal detection
// Plain data: candle columns, indicator columns, levels and emitted signals

pub mod indicators;
pub mod level;
pub mod signal;
pub mod timeseries;

// Re-export key types for convenience
pub use indicators::{Indicator, IndicatorSet};
pub use level::{Level, LevelKind, Levels};
pub use signal::{
    Breakout, Confluence, Direction, FalseBreakout, LevelApproach, Priority, Signal,
    SignalAnnotations, SignalBatch, SignalCategory, SignalDetails,
};
pub use timeseries::{CandleSeries, find_matching_series};
