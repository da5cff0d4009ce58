use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::analysis::indicator_engine::compute_indicators;
use crate::analysis::signal_aggregator::SignalAggregator;
use crate::analysis::technical::determine_market_trend;
use crate::config::ScannerConfig;
use crate::models::{CandleSeries, Indicator, SignalBatch, SignalCategory};
use crate::utils::maths_utils::{mean, round_to};

/// Result for one series of a scan. Exactly one of `signals` / `error` is set.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct ScanOutcome {
    pub symbol: String,
    pub timeframe: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signals: Option<SignalBatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScanOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketSentiment {
    Bullish,
    Bearish,
    Mixed,
    Neutral,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct MarketOverview {
    pub total_symbols: usize,
    pub analyzed_symbols: usize,
    pub bullish_count: usize,
    pub bearish_count: usize,
    pub neutral_count: usize,
    pub avg_rsi: Option<f64>,
    pub high_volume_count: usize,
    pub market_sentiment: MarketSentiment,
    pub generated_at: DateTime<Utc>,
}

/// Per-symbol reading feeding the overview.
struct SymbolPulse {
    up: bool,
    down: bool,
    rsi: Option<f64>,
    high_volume: bool,
}

/// Runs the single-timeframe pipeline for many symbols on a bounded pool.
pub struct MultiPairScanner {
    aggregator: SignalAggregator,
    pool: rayon::ThreadPool,
}

impl MultiPairScanner {
    /// `workers == 0` lets rayon pick the thread count.
    pub fn new(config: ScannerConfig, workers: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("scan-worker-{}", i))
            .build()
            .context(format!("Failed to build scan pool with {} workers", workers))?;
        Ok(Self {
            aggregator: SignalAggregator::new(config),
            pool,
        })
    }

    pub fn config(&self) -> &ScannerConfig {
        self.aggregator.config()
    }

    /// One outcome per input series, in input order. A failing series never
    /// aborts the others.
    pub fn scan(&self, series_data: &[CandleSeries], enabled: Option<&[SignalCategory]>) -> Vec<ScanOutcome> {
        log::info!(
            "Scanning {} series on {} workers",
            series_data.len(),
            self.pool.current_num_threads()
        );
        let outcomes: Vec<ScanOutcome> = self.pool.install(|| {
            series_data
                .par_iter()
                .map(|series| self.scan_one(series, enabled))
                .collect()
        });

        let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
        if failed > 0 {
            log::warn!("{} of {} series failed to scan", failed, outcomes.len());
        }
        outcomes
    }

    fn scan_one(&self, series: &CandleSeries, enabled: Option<&[SignalCategory]>) -> ScanOutcome {
        #[cfg(debug_assertions)]
        let start = std::time::Instant::now();

        let result = self.aggregator.analyze_series(series, enabled);

        #[cfg(debug_assertions)]
        if crate::config::debug::PRINT_SCAN_TIMINGS {
            log::info!("{} scanned in {:?}", series.pair_interval, start.elapsed());
        }

        let (signals, error) = match result {
            Ok(batch) => (Some(batch), None),
            Err(e) => {
                log::error!("{}: scan failed: {:#}", series.pair_interval, e);
                (None, Some(format!("{:#}", e)))
            }
        };
        ScanOutcome {
            symbol: series.symbol().to_string(),
            timeframe: series.pair_interval.timeframe().to_string(),
            signals,
            error,
        }
    }

    /// Trend/RSI/volume headcount over the first symbols of `series_data`.
    pub fn market_overview(&self, series_data: &[CandleSeries]) -> MarketOverview {
        let config = self.config();
        let pulses: Vec<SymbolPulse> = self.pool.install(|| {
            series_data
                .par_iter()
                .take(config.scan.overview_max_symbols)
                .filter_map(|series| self.pulse(series))
                .collect()
        });

        let bullish_count = pulses.iter().filter(|p| p.up).count();
        let bearish_count = pulses.iter().filter(|p| p.down).count();
        let rsi_values: Vec<f64> = pulses.iter().filter_map(|p| p.rsi).collect();
        let directional = bullish_count + bearish_count;
        let market_sentiment = if directional == 0 {
            MarketSentiment::Neutral
        } else {
            let bullish_pct = bullish_count as f64 / directional as f64 * 100.0;
            if bullish_pct > 70.0 {
                MarketSentiment::Bullish
            } else if bullish_pct < 30.0 {
                MarketSentiment::Bearish
            } else {
                MarketSentiment::Mixed
            }
        };

        MarketOverview {
            total_symbols: series_data.len(),
            analyzed_symbols: pulses.len(),
            bullish_count,
            bearish_count,
            neutral_count: pulses.len() - directional,
            avg_rsi: mean(&rsi_values).map(|v| round_to(v, 2)),
            high_volume_count: pulses.iter().filter(|p| p.high_volume).count(),
            market_sentiment,
            generated_at: Utc::now(),
        }
    }

    fn pulse(&self, series: &CandleSeries) -> Option<SymbolPulse> {
        let config = self.config();
        if let Err(e) = series.validate() {
            log::warn!("Skipping {} in overview: {:#}", series.pair_interval, e);
            return None;
        }
        if series.klines() < config.min_candles.indicators {
            return None;
        }
        let ind = compute_indicators(series, config);
        let trend = determine_market_trend(series, &ind, config.min_candles.trend).trend;
        Some(SymbolPulse {
            up: trend.is_up(),
            down: trend.is_down(),
            rsi: ind.last(Indicator::Rsi),
            high_volume: ind
                .last(Indicator::VolumeRatio)
                .is_some_and(|r| r > config.scan.high_volume_ratio),
        })
    }
}
