#![allow(clippy::const_is_empty)]
#![allow(clippy::collapsible_if)]
#![allow(clippy::collapsible_else_if)]

// Core modules
pub mod analysis;
pub mod config;
pub mod data;
pub mod domain;
pub mod models;
pub mod utils;

// Re-export commonly used types
pub use analysis::{MultiPairScanner, MultiTimeframeCoordinator, SignalAggregator};
pub use config::ScannerConfig;
pub use data::{SeriesCollection, SeriesFile};
pub use domain::{Candle, PairInterval};
pub use models::{CandleSeries, IndicatorSet, Levels, Signal, SignalBatch, SignalCategory};

// CLI argument parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// JSON file overriding the default scanner configuration
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Single-timeframe signal scan over every symbol in a series file
    Scan {
        /// Series file (.json or bincode)
        input: PathBuf,

        /// Only scan series at this interval, e.g. "1h"
        #[arg(long)]
        interval: Option<String>,

        /// Worker threads, 0 lets rayon decide
        #[arg(long, default_value_t = 0)]
        workers: usize,

        /// Comma-separated signal categories to run, e.g. "breakout,order_block"
        #[arg(long, value_delimiter = ',')]
        categories: Option<Vec<String>>,

        /// Also print a market overview
        #[arg(long, default_value_t = false)]
        overview: bool,
    },

    /// Multi-timeframe analysis of one symbol
    Mtf {
        input: PathBuf,
        symbol: String,

        /// Include each timeframe's signal batch
        #[arg(long, default_value_t = false)]
        with_signals: bool,
    },

    /// Return correlation of one symbol against a reference symbol
    Correlate {
        input: PathBuf,
        symbol: String,

        #[arg(long, default_value = "BTCUSDT")]
        reference: String,

        #[arg(long, default_value = "1h")]
        interval: String,
    },
}

impl Cli {
    pub fn load_config(&self) -> anyhow::Result<ScannerConfig> {
        match &self.config {
            Some(path) => ScannerConfig::load_from_path(path),
            None => Ok(ScannerConfig::default()),
        }
    }
}
