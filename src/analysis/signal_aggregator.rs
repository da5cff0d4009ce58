//! Turns one (symbol, timeframe) series into a capped, ordered `SignalBatch`.

use anyhow::{Result, ensure};
use itertools::Itertools;

use crate::analysis::categories::{AnalysisContext, Candidate, Detector, default_detectors};
use crate::analysis::indicator_engine::compute_indicators;
use crate::analysis::level_finder::find_levels;
use crate::analysis::technical::{detect_trend, strength_index};
use crate::config::ScannerConfig;
use crate::models::{
    CandleSeries, Confluence, Direction, Indicator, IndicatorSet, Levels, Priority, Signal,
    SignalAnnotations, SignalBatch, SignalCategory, SignalDetails,
};
use crate::utils::epoch_ms_to_utc;
use crate::utils::maths_utils::round_to;

pub struct SignalAggregator {
    config: ScannerConfig,
    detectors: Vec<Box<dyn Detector>>,
}

impl SignalAggregator {
    pub fn new(config: ScannerConfig) -> Self {
        Self::with_detectors(config, default_detectors())
    }

    /// Custom registry. Detectors run in the order given.
    pub fn with_detectors(config: ScannerConfig, detectors: Vec<Box<dyn Detector>>) -> Self {
        Self { config, detectors }
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    /// Computes indicators and levels from the series itself, then aggregates.
    pub fn analyze_series(
        &self,
        series: &CandleSeries,
        enabled: Option<&[SignalCategory]>,
    ) -> Result<SignalBatch> {
        series.validate()?;
        let indicators = compute_indicators(series, &self.config);
        let levels = find_levels(series, &self.config.levels);
        self.analyze(series, &indicators, &levels, enabled)
    }

    /// `enabled = None` runs every category.
    pub fn analyze(
        &self,
        series: &CandleSeries,
        indicators: &IndicatorSet,
        levels: &Levels,
        enabled: Option<&[SignalCategory]>,
    ) -> Result<SignalBatch> {
        series.validate()?;
        ensure!(
            indicators.len() == series.klines(),
            "{}: indicator set has {} rows but series has {} candles",
            series.pair_interval,
            indicators.len(),
            series.klines()
        );

        let mut batch = SignalBatch::new(series.symbol(), series.pair_interval.timeframe());
        if series.klines() < self.config.min_candles.aggregation {
            return Ok(batch);
        }
        let is_enabled = |category: SignalCategory| enabled.is_none_or(|set| set.contains(&category));

        let ctx = AnalysisContext {
            series,
            indicators,
            levels,
            config: &self.config,
        };
        let price = ctx.current_price()?;
        let timestamp = epoch_ms_to_utc(series.timestamps_ms[series.klines() - 1]);
        let annotations = self.annotations(series, indicators);

        let stamp = |direction: Direction, priority: Priority, details: SignalDetails| Signal {
            symbol: batch.symbol.clone(),
            timeframe: batch.timeframe.clone(),
            direction,
            price,
            priority,
            details,
            timestamp,
            annotations: None,
        };

        let mut signals = Vec::new();
        for detector in self.detectors.iter().filter(|d| is_enabled(d.category())) {
            let candidates = match detector.detect(&ctx) {
                Ok(candidates) => candidates,
                Err(e) => {
                    log::error!(
                        "{}: {} detector failed, skipping: {:#}",
                        series.pair_interval,
                        detector.category(),
                        e
                    );
                    continue;
                }
            };

            #[cfg(debug_assertions)]
            if crate::config::debug::PRINT_CANDIDATES_FOR_PAIR == series.symbol() {
                log::info!(
                    "{} {}: {} candidates {:?}",
                    series.pair_interval,
                    detector.category(),
                    candidates.len(),
                    candidates
                );
            }

            signals.extend(candidates.into_iter().map(|Candidate { direction, priority, details }| {
                Signal {
                    annotations: Some(annotations.clone()),
                    ..stamp(direction, priority, details)
                }
            }));
        }

        let s = &self.config.signals;
        if s.show_confluence && is_enabled(SignalCategory::Confluence) && signals.len() >= 3 {
            let found = find_confluence(&signals, s.confluence_min_kinds);
            signals.extend(
                found
                    .into_iter()
                    .map(|(direction, c)| stamp(direction, Priority::Critical, SignalDetails::Confluence(c))),
            );
        }

        signals.truncate(s.max_signals_per_symbol);
        batch.signals = signals;

        #[cfg(debug_assertions)]
        if crate::config::debug::PRINT_BATCH_SUMMARY {
            use strum::IntoEnumIterator;
            let counts = SignalCategory::iter()
                .map(|c| (c, batch.count_of(c)))
                .filter(|(_, n)| *n > 0)
                .map(|(c, n)| format!("{}={}", c, n))
                .join(", ");
            log::info!("{}: {} signals [{}]", series.pair_interval, batch.len(), counts);
        }

        Ok(batch)
    }

    fn annotations(&self, series: &CandleSeries, indicators: &IndicatorSet) -> SignalAnnotations {
        SignalAnnotations {
            trend: detect_trend(series, indicators, &self.config),
            strength_index: strength_index(series, indicators, &self.config),
            rsi: indicators.last(Indicator::Rsi).map(|v| round_to(v, 2)),
            macd: indicators.last(Indicator::Macd).map(|v| round_to(v, 4)),
        }
    }
}

impl Default for SignalAggregator {
    fn default() -> Self {
        Self::new(ScannerConfig::default())
    }
}

/// One confluence per direction whose signals span at least `min_kinds`
/// distinct categories. Bullish before bearish.
pub fn find_confluence(signals: &[Signal], min_kinds: usize) -> Vec<(Direction, Confluence)> {
    [Direction::Bullish, Direction::Bearish]
        .into_iter()
        .filter_map(|direction| {
            let same_side: Vec<&Signal> = signals
                .iter()
                .filter(|s| s.direction == direction && s.category() != SignalCategory::Confluence)
                .collect();
            let kinds: Vec<SignalCategory> = same_side.iter().map(|s| s.category()).unique().collect();
            if kinds.len() < min_kinds {
                return None;
            }
            let side = match direction {
                Direction::Bullish => "bullish",
                _ => "bearish",
            };
            Some((
                direction,
                Confluence {
                    factors_count: same_side.len(),
                    unique_types: kinds.len(),
                    description: format!("{} {} signal types align", kinds.len(), side),
                    signal_types: kinds,
                },
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::categories::{Breakouts, LevelApproaches};
    use crate::analysis::technical::VolumeAnomaly;
    use crate::models::{Breakout, FalseBreakout, LevelApproach, LevelKind};
    use crate::utils::fixtures;
    use anyhow::bail;
    use std::collections::HashSet;

    struct Fixed(SignalCategory, Vec<Candidate>);

    impl Detector for Fixed {
        fn category(&self) -> SignalCategory {
            self.0
        }

        fn detect(&self, _ctx: &AnalysisContext<'_>) -> Result<Vec<Candidate>> {
            Ok(self.1.clone())
        }
    }

    struct Failing;

    impl Detector for Failing {
        fn category(&self) -> SignalCategory {
            SignalCategory::Divergence
        }

        fn detect(&self, _ctx: &AnalysisContext<'_>) -> Result<Vec<Candidate>> {
            bail!("oscillator exploded")
        }
    }

    fn approach(direction: Direction) -> Candidate {
        Candidate {
            direction,
            priority: Priority::High,
            details: SignalDetails::LevelApproach(LevelApproach {
                level_kind: LevelKind::Support,
                level_price: 100.0,
                distance_percent: 0.5,
            }),
        }
    }

    fn breakout(direction: Direction) -> Candidate {
        Candidate {
            direction,
            priority: Priority::Medium,
            details: SignalDetails::Breakout(Breakout {
                level_kind: LevelKind::Resistance,
                broken_level: 110.0,
                previous_close: 109.0,
                volume_confirmed: false,
                volume_ratio: Some(1.0),
            }),
        }
    }

    fn false_breakout(direction: Direction) -> Candidate {
        Candidate {
            direction,
            priority: Priority::High,
            details: SignalDetails::FalseBreakout(FalseBreakout {
                level_kind: LevelKind::Support,
                failed_level: 100.0,
                fake_extreme: 98.0,
            }),
        }
    }

    fn spike() -> Candidate {
        Candidate {
            direction: Direction::Neutral,
            priority: Priority::Medium,
            details: SignalDetails::VolumeSpike(VolumeAnomaly {
                current_volume: 500.0,
                average_volume: 100.0,
                ratio: 5.0,
                is_anomaly: true,
            }),
        }
    }

    fn three_bullish_kinds() -> Vec<Box<dyn Detector>> {
        vec![
            Box::new(Fixed(
                SignalCategory::LevelApproach,
                vec![approach(Direction::Bullish), approach(Direction::Bullish)],
            )),
            Box::new(Fixed(SignalCategory::Breakout, vec![breakout(Direction::Bullish)])),
            Box::new(Fixed(
                SignalCategory::FalseBreakout,
                vec![false_breakout(Direction::Bullish), false_breakout(Direction::Bearish)],
            )),
            Box::new(Fixed(SignalCategory::VolumeSpike, vec![spike()])),
        ]
    }

    fn rising_series() -> CandleSeries {
        fixtures::series_from_closes(&fixtures::linear_closes(60, 100.0, 0.5))
    }

    fn run(aggregator: &SignalAggregator, series: &CandleSeries, enabled: Option<&[SignalCategory]>) -> SignalBatch {
        let indicators = compute_indicators(series, aggregator.config());
        aggregator
            .analyze(series, &indicators, &Levels::default(), enabled)
            .unwrap()
    }

    #[test]
    fn confluence_needs_three_distinct_kinds() {
        let aggregator = SignalAggregator::with_detectors(ScannerConfig::default(), three_bullish_kinds());
        let batch = run(&aggregator, &rising_series(), None);

        let confluences: Vec<&Signal> = batch.of_category(SignalCategory::Confluence).collect();
        assert_eq!(confluences.len(), 1);
        let c = confluences[0];
        assert_eq!(c.direction, Direction::Bullish);
        assert_eq!(c.priority, Priority::Critical);
        assert!(c.annotations.is_none());
        match &c.details {
            SignalDetails::Confluence(details) => {
                assert_eq!(details.factors_count, 4);
                assert_eq!(details.unique_types, 3);
                assert_eq!(
                    details.signal_types,
                    vec![
                        SignalCategory::LevelApproach,
                        SignalCategory::Breakout,
                        SignalCategory::FalseBreakout
                    ]
                );
            }
            other => panic!("unexpected details {:?}", other),
        }
        // Confluence comes last and everything else is annotated.
        assert_eq!(batch.signals.last().map(|s| s.category()), Some(SignalCategory::Confluence));
        assert!(batch.iter().filter(|s| s.category() != SignalCategory::Confluence).all(|s| s.annotations.is_some()));
    }

    #[test]
    fn confluence_respects_flags() {
        let mut config = ScannerConfig::default();
        config.signals.show_confluence = false;
        let aggregator = SignalAggregator::with_detectors(config, three_bullish_kinds());
        assert_eq!(run(&aggregator, &rising_series(), None).count_of(SignalCategory::Confluence), 0);

        let aggregator = SignalAggregator::with_detectors(ScannerConfig::default(), three_bullish_kinds());
        let without = [
            SignalCategory::LevelApproach,
            SignalCategory::Breakout,
            SignalCategory::FalseBreakout,
        ];
        let batch = run(&aggregator, &rising_series(), Some(&without[..]));
        assert_eq!(batch.count_of(SignalCategory::Confluence), 0);
        assert_eq!(batch.count_of(SignalCategory::VolumeSpike), 0);
        assert_eq!(batch.len(), 5);
    }

    #[test]
    fn two_kinds_are_not_confluence() {
        let detectors: Vec<Box<dyn Detector>> = vec![
            Box::new(Fixed(
                SignalCategory::LevelApproach,
                vec![approach(Direction::Bearish), approach(Direction::Bearish)],
            )),
            Box::new(Fixed(SignalCategory::Breakout, vec![breakout(Direction::Bearish)])),
            Box::new(Fixed(SignalCategory::VolumeSpike, vec![spike()])),
        ];
        let aggregator = SignalAggregator::with_detectors(ScannerConfig::default(), detectors);
        assert_eq!(run(&aggregator, &rising_series(), None).count_of(SignalCategory::Confluence), 0);
    }

    #[test]
    fn batch_never_exceeds_cap() {
        let mut config = ScannerConfig::default();
        config.signals.max_signals_per_symbol = 3;
        let aggregator = SignalAggregator::with_detectors(config, three_bullish_kinds());
        let batch = run(&aggregator, &rising_series(), None);
        assert_eq!(batch.len(), 3);
        // Prefix of the evaluation order.
        assert_eq!(batch.signals[2].category(), SignalCategory::Breakout);

        let aggregator = SignalAggregator::default();
        for closes in [
            fixtures::wave_closes(300, 100.0, 8.0, 17.0, 0.05),
            fixtures::wave_closes(250, 50.0, 4.0, 9.0, -0.02),
            fixtures::linear_closes(220, 10.0, 0.3),
        ] {
            let batch = aggregator
                .analyze_series(&fixtures::series_from_closes(&closes), None)
                .unwrap();
            assert!(batch.len() <= aggregator.config().signals.max_signals_per_symbol);
            for c in batch.of_category(SignalCategory::Confluence) {
                let kinds: HashSet<SignalCategory> = batch
                    .iter()
                    .filter(|s| s.direction == c.direction && s.category() != SignalCategory::Confluence)
                    .map(|s| s.category())
                    .collect();
                assert!(kinds.len() >= 3);
            }
        }
    }

    #[test]
    fn failing_detector_is_isolated() {
        let detectors: Vec<Box<dyn Detector>> = vec![
            Box::new(Failing),
            Box::new(Fixed(SignalCategory::VolumeSpike, vec![spike()])),
        ];
        let aggregator = SignalAggregator::with_detectors(ScannerConfig::default(), detectors);
        let batch = run(&aggregator, &rising_series(), None);
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.signals[0].category(), SignalCategory::VolumeSpike);
    }

    #[test]
    fn short_series_yields_empty_batch() {
        let series = fixtures::series_from_closes(&fixtures::linear_closes(19, 100.0, 1.0));
        let aggregator = SignalAggregator::with_detectors(ScannerConfig::default(), three_bullish_kinds());
        let batch = run(&aggregator, &series, None);
        assert!(batch.is_empty());
        assert_eq!(batch.symbol, fixtures::SYMBOL);
        assert_eq!(batch.timeframe, "1h");
    }

    #[test]
    fn malformed_input_is_an_error() {
        let aggregator = SignalAggregator::default();
        let mut series = rising_series();
        let indicators = compute_indicators(&series, aggregator.config());

        let short = IndicatorSet::undefined(series.klines() - 1);
        assert!(aggregator.analyze(&series, &short, &Levels::default(), None).is_err());

        series.close_prices[10] = f64::NAN;
        assert!(aggregator.analyze(&series, &indicators, &Levels::default(), None).is_err());

        let mut series = rising_series();
        series.timestamps_ms[5] = series.timestamps_ms[4];
        assert!(aggregator.analyze_series(&series, None).is_err());
    }

    #[test]
    fn breakout_scenario_end_to_end() {
        let mut rows = vec![(107.5, 108.5, 107.0, 108.0, 100.0); 19];
        rows.push((108.0, 111.5, 107.8, 111.0, 300.0));
        let series = fixtures::series_from_rows(&rows);
        let aggregator = SignalAggregator::with_detectors(
            ScannerConfig::default(),
            vec![Box::new(LevelApproaches), Box::new(Breakouts)],
        );
        let indicators = compute_indicators(&series, aggregator.config());
        let levels = Levels::new(vec![100.0], vec![110.0]);
        let batch = aggregator
            .analyze(&series, &indicators, &levels, Some(&[SignalCategory::Breakout][..]))
            .unwrap();

        assert_eq!(batch.len(), 1);
        let s = &batch.signals[0];
        assert_eq!(s.category(), SignalCategory::Breakout);
        assert_eq!(s.direction, Direction::Bullish);
        assert_eq!(s.priority, Priority::High);
        assert_eq!(s.price, 111.0);
        assert_eq!(s.timestamp, epoch_ms_to_utc(series.timestamps_ms[19]));
        assert!(matches!(&s.details, SignalDetails::Breakout(b) if b.volume_confirmed));
    }

    #[test]
    fn flat_series_has_no_structure_signals() {
        let aggregator = SignalAggregator::default();
        let batch = aggregator
            .analyze_series(&fixtures::flat_series(200, 100.0), None)
            .unwrap();
        assert_eq!(batch.count_of(SignalCategory::Breakout), 0);
        assert_eq!(batch.count_of(SignalCategory::OrderBlock), 0);
        assert_eq!(batch.count_of(SignalCategory::Imbalance), 0);
    }
}
