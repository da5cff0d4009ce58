//! Signal detection configuration

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::utils::TimeUtils;

/// Support/resistance extraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelSettings {
    // Levels kept per side
    pub max_levels: usize,
    // Centered window used to pick local extrema (odd)
    pub extremum_window: usize,
    // Relative distance (percentage) under which two levels merge
    pub cluster_tolerance_pct: f64,
}

/// Smart-money structure detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmartMoneySettings {
    // Minimum fair value gap size, percent of price
    pub fvg_min_size_pct: f64,
    pub order_block_lookback: usize,
    // Impulse candle range (percent) required after an order block
    pub order_block_impulse_pct: f64,
    // Swing half-width for break of structure (window = 2 * n + 1)
    pub swing_period: usize,
    // Adjacent highs/lows closer than this (percent) form liquidity
    pub liquidity_tolerance_pct: f64,
    // Volume multiple confirming a liquidity sweep
    pub liquidity_sweep_multiplier: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OscillatorSettings {
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
}

/// Aggregation policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalSettings {
    pub max_signals_per_symbol: usize,
    pub show_confluence: bool,
    // Distinct signal kinds one direction needs before confluence fires
    pub confluence_min_kinds: usize,
    // Price within this percent of a level counts as approaching it
    pub level_approach_pct: f64,
    pub breakout_volume_multiplier: f64,
    pub volume_spike_multiplier: f64,
    // Trailing candles used for volume averages
    pub volume_window: usize,
    // Candles inspected for a failed break
    pub false_breakout_lookback: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiTimeframeSettings {
    // Evaluated in this order, shortest first
    pub intervals_ms: Vec<i64>,
    pub momentum_lookback: usize,
}

/// Minimum candles required before each stage produces anything
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinCandles {
    pub indicators: usize,
    pub aggregation: usize,
    pub trend: usize,
    pub timeframe: usize,
    pub correlation: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    // Symbols included in a market overview
    pub overview_max_symbols: usize,
    pub high_volume_ratio: f64,
}

/// The master scanner configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub levels: LevelSettings,
    pub smart_money: SmartMoneySettings,
    pub oscillators: OscillatorSettings,
    pub signals: SignalSettings,
    pub mtf: MultiTimeframeSettings,
    pub min_candles: MinCandles,
    pub scan: ScanSettings,
}

pub const SCANNER: ScannerConfig = ScannerConfig {
    levels: LevelSettings {
        max_levels: 5,
        extremum_window: 21,
        cluster_tolerance_pct: 1.0,
    },

    smart_money: SmartMoneySettings {
        fvg_min_size_pct: 0.5,
        order_block_lookback: 20,
        order_block_impulse_pct: 2.0,
        swing_period: 5,
        liquidity_tolerance_pct: 0.2,
        liquidity_sweep_multiplier: 1.5,
    },

    oscillators: OscillatorSettings {
        rsi_oversold: 30.0,
        rsi_overbought: 70.0,
    },

    signals: SignalSettings {
        max_signals_per_symbol: 10,
        show_confluence: true,
        confluence_min_kinds: 3,
        level_approach_pct: 1.5,
        breakout_volume_multiplier: 1.5,
        volume_spike_multiplier: 2.0,
        volume_window: 20,
        false_breakout_lookback: 5,
    },

    // Vec::new() is const but vec![] is not, so the default list lives in
    // `DEFAULT_MTF_INTERVALS` and is filled in by `Default`.
    mtf: MultiTimeframeSettings {
        intervals_ms: Vec::new(),
        momentum_lookback: 10,
    },

    min_candles: MinCandles {
        indicators: 20,
        aggregation: 20,
        trend: 50,
        timeframe: 50,
        correlation: 20,
    },

    scan: ScanSettings {
        overview_max_symbols: 20,
        high_volume_ratio: 2.0,
    },
};

pub const DEFAULT_MTF_INTERVALS: [i64; 4] = [
    TimeUtils::MS_IN_15_MIN,
    TimeUtils::MS_IN_H,
    TimeUtils::MS_IN_4_H,
    TimeUtils::MS_IN_D,
];

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            mtf: MultiTimeframeSettings::default(),
            ..SCANNER
        }
    }
}

impl Default for LevelSettings {
    fn default() -> Self {
        SCANNER.levels
    }
}

impl Default for SmartMoneySettings {
    fn default() -> Self {
        SCANNER.smart_money
    }
}

impl Default for OscillatorSettings {
    fn default() -> Self {
        SCANNER.oscillators
    }
}

impl Default for SignalSettings {
    fn default() -> Self {
        SCANNER.signals
    }
}

impl Default for MultiTimeframeSettings {
    fn default() -> Self {
        Self {
            intervals_ms: DEFAULT_MTF_INTERVALS.to_vec(),
            ..SCANNER.mtf
        }
    }
}

impl Default for MinCandles {
    fn default() -> Self {
        SCANNER.min_candles
    }
}

impl Default for ScanSettings {
    fn default() -> Self {
        SCANNER.scan
    }
}

impl ScannerConfig {
    /// Load overrides from a JSON file. Missing keys keep their defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;
        let config: ScannerConfig = serde_json::from_str(&text)
            .context(format!("Failed to parse config file: {}", path.display()))?;

        #[cfg(debug_assertions)]
        if crate::config::debug::PRINT_CONFIG_SERDE {
            log::info!("Loaded scanner config from {}: {:?}", path.display(), config);
        }

        Ok(config)
    }
}
