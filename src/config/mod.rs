//! Configuration module for the structure scanner.

pub mod analysis;
pub mod debug;

// Re-export commonly used items
pub use analysis::{
    DEFAULT_MTF_INTERVALS, LevelSettings, MinCandles, MultiTimeframeSettings, OscillatorSettings,
    SCANNER, ScanSettings, ScannerConfig, SignalSettings, SmartMoneySettings,
};
