//! One `Detector` per signal category. Each turns raw detections into capped,
//! prioritised candidates; the aggregator stamps them into `Signal`s.

use anyhow::{Context, Result, bail, ensure};

use crate::analysis::divergence::{Oscillator, find_divergences};
use crate::analysis::patterns::{Reliability, find_all_patterns};
use crate::analysis::smart_money::{
    detect_break_of_structure, detect_liquidity_sweeps, find_fair_value_gaps,
    find_liquidity_zones, find_order_blocks,
};
use crate::analysis::technical::detect_volume_anomaly;
use crate::config::ScannerConfig;
use crate::models::{
    Breakout, CandleSeries, Direction, FalseBreakout, IndicatorSet, LevelApproach, LevelKind,
    Levels, Priority, SignalCategory, SignalDetails,
};
use crate::utils::maths_utils::{get_max, get_min, mean, round_to};

const MAX_STRUCTURE_BREAKS: usize = 2;
const MAX_LEVEL_APPROACHES: usize = 3;
const MAX_BREAKOUTS: usize = 2;
const MAX_FALSE_BREAKOUTS: usize = 2;
const MAX_IMBALANCES: usize = 3;
const MAX_ORDER_BLOCKS: usize = 2;
const MAX_SWEEPS: usize = 2;
const MAX_DIVERGENCES: usize = 2;
const MAX_PATTERNS: usize = 3;

/// Read-only inputs shared by every detector for one (symbol, timeframe).
pub struct AnalysisContext<'a> {
    pub series: &'a CandleSeries,
    pub indicators: &'a IndicatorSet,
    pub levels: &'a Levels,
    pub config: &'a ScannerConfig,
}

impl AnalysisContext<'_> {
    pub fn current_price(&self) -> Result<f64> {
        self.series
            .last_close()
            .context("series has no candles")
    }

    fn previous_close(&self) -> Result<f64> {
        let len = self.series.klines();
        ensure!(len >= 2, "need two candles, have {}", len);
        Ok(self.series.close_prices[len - 2])
    }

    fn checked_levels(&self) -> Result<&Levels> {
        if let Some(bad) = self.levels.first_invalid() {
            bail!("level price {} is not a positive finite number", bad);
        }
        Ok(self.levels)
    }
}

/// Raw detector output before symbol/price/timestamp are attached.
#[derive(Clone, PartialEq, Debug)]
pub struct Candidate {
    pub direction: Direction,
    pub priority: Priority,
    pub details: SignalDetails,
}

impl Candidate {
    fn new(direction: Direction, priority: Priority, details: SignalDetails) -> Self {
        Self {
            direction,
            priority,
            details,
        }
    }
}

pub trait Detector: Send + Sync {
    fn category(&self) -> SignalCategory;

    /// Candidates already capped for this category, in emission order.
    fn detect(&self, ctx: &AnalysisContext<'_>) -> Result<Vec<Candidate>>;
}

/// The fixed evaluation order. Confluence is derived by the aggregator.
pub fn default_detectors() -> Vec<Box<dyn Detector>> {
    vec![
        Box::new(StructureBreaks),
        Box::new(LevelApproaches),
        Box::new(Breakouts),
        Box::new(FalseBreakouts),
        Box::new(Imbalances),
        Box::new(OrderBlocks),
        Box::new(LiquiditySweeps),
        Box::new(Divergences),
        Box::new(Patterns),
        Box::new(VolumeSpikes),
    ]
}

pub struct StructureBreaks;

impl Detector for StructureBreaks {
    fn category(&self) -> SignalCategory {
        SignalCategory::StructureBreak
    }

    fn detect(&self, ctx: &AnalysisContext<'_>) -> Result<Vec<Candidate>> {
        let breaks = detect_break_of_structure(ctx.series, ctx.config.smart_money.swing_period);
        let skip = breaks.len().saturating_sub(MAX_STRUCTURE_BREAKS);
        Ok(breaks
            .into_iter()
            .skip(skip)
            .map(|b| Candidate::new(b.direction, Priority::High, SignalDetails::StructureBreak(b)))
            .collect())
    }
}

pub struct LevelApproaches;

impl Detector for LevelApproaches {
    fn category(&self) -> SignalCategory {
        SignalCategory::LevelApproach
    }

    fn detect(&self, ctx: &AnalysisContext<'_>) -> Result<Vec<Candidate>> {
        let levels = ctx.checked_levels()?;
        let price = ctx.current_price()?;
        ensure!(price > 0.0, "current price {} is not positive", price);
        let threshold = ctx.config.signals.level_approach_pct;

        Ok(levels
            .leading(MAX_LEVEL_APPROACHES)
            .filter_map(|level| {
                let distance = (price - level.price).abs() / price * 100.0;
                (distance < threshold).then(|| {
                    let direction = match level.kind {
                        LevelKind::Support => Direction::Bullish,
                        LevelKind::Resistance => Direction::Bearish,
                    };
                    Candidate::new(
                        direction,
                        Priority::High,
                        SignalDetails::LevelApproach(LevelApproach {
                            level_kind: level.kind,
                            level_price: level.price,
                            distance_percent: round_to(distance, 2),
                        }),
                    )
                })
            })
            .take(MAX_LEVEL_APPROACHES)
            .collect())
    }
}

pub struct Breakouts;

impl Detector for Breakouts {
    fn category(&self) -> SignalCategory {
        SignalCategory::Breakout
    }

    fn detect(&self, ctx: &AnalysisContext<'_>) -> Result<Vec<Candidate>> {
        let levels = ctx.checked_levels()?;
        let price = ctx.current_price()?;
        let previous_close = ctx.previous_close()?;
        let signals = &ctx.config.signals;

        let series = ctx.series;
        let current_volume = series.volumes[series.klines() - 1];
        let avg_volume = mean(&series.volumes[series.tail_start(signals.volume_window)..])
            .context("no volume history")?;
        let volume_confirmed = current_volume > avg_volume * signals.breakout_volume_multiplier;
        let volume_ratio = (avg_volume > 0.0).then(|| round_to(current_volume / avg_volume, 2));
        let priority = if volume_confirmed {
            Priority::High
        } else {
            Priority::Medium
        };

        let broken_resistance = levels
            .resistance
            .iter()
            .take(MAX_BREAKOUTS)
            .filter(|&&r| previous_close < r && price > r)
            .map(|&r| (LevelKind::Resistance, Direction::Bullish, r));
        let broken_support = levels
            .support
            .iter()
            .take(MAX_BREAKOUTS)
            .filter(|&&s| previous_close > s && price < s)
            .map(|&s| (LevelKind::Support, Direction::Bearish, s));

        Ok(broken_resistance
            .chain(broken_support)
            .take(MAX_BREAKOUTS)
            .map(|(level_kind, direction, broken_level)| {
                Candidate::new(
                    direction,
                    priority,
                    SignalDetails::Breakout(Breakout {
                        level_kind,
                        broken_level,
                        previous_close,
                        volume_confirmed,
                        volume_ratio,
                    }),
                )
            })
            .collect())
    }
}

pub struct FalseBreakouts;

impl Detector for FalseBreakouts {
    fn category(&self) -> SignalCategory {
        SignalCategory::FalseBreakout
    }

    fn detect(&self, ctx: &AnalysisContext<'_>) -> Result<Vec<Candidate>> {
        let levels = ctx.checked_levels()?;
        let lookback = ctx.config.signals.false_breakout_lookback;
        let series = ctx.series;
        if lookback < 2 || series.klines() < lookback {
            return Ok(Vec::new());
        }
        let price = ctx.current_price()?;
        let previous_close = ctx.previous_close()?;
        let start = series.tail_start(lookback);
        let recent_high = get_max(&series.high_prices[start..]);
        let recent_low = get_min(&series.low_prices[start..]);

        let failed_resistance = levels
            .resistance
            .iter()
            .take(MAX_FALSE_BREAKOUTS)
            .filter(|&&r| recent_high > r && price < r && previous_close > r)
            .map(|&r| (LevelKind::Resistance, Direction::Bearish, r, recent_high));
        let failed_support = levels
            .support
            .iter()
            .take(MAX_FALSE_BREAKOUTS)
            .filter(|&&s| recent_low < s && price > s && previous_close < s)
            .map(|&s| (LevelKind::Support, Direction::Bullish, s, recent_low));

        Ok(failed_resistance
            .chain(failed_support)
            .take(MAX_FALSE_BREAKOUTS)
            .map(|(level_kind, direction, failed_level, fake_extreme)| {
                Candidate::new(
                    direction,
                    Priority::High,
                    SignalDetails::FalseBreakout(FalseBreakout {
                        level_kind,
                        failed_level,
                        fake_extreme,
                    }),
                )
            })
            .collect())
    }
}

pub struct Imbalances;

impl Detector for Imbalances {
    fn category(&self) -> SignalCategory {
        SignalCategory::Imbalance
    }

    fn detect(&self, ctx: &AnalysisContext<'_>) -> Result<Vec<Candidate>> {
        let unfilled: Vec<_> = find_fair_value_gaps(ctx.series, ctx.config.smart_money.fvg_min_size_pct)
            .into_iter()
            .filter(|gap| !gap.filled)
            .collect();
        let skip = unfilled.len().saturating_sub(MAX_IMBALANCES);
        Ok(unfilled
            .into_iter()
            .skip(skip)
            .map(|gap| Candidate::new(gap.direction, Priority::Medium, SignalDetails::Imbalance(gap)))
            .collect())
    }
}

pub struct OrderBlocks;

impl Detector for OrderBlocks {
    fn category(&self) -> SignalCategory {
        SignalCategory::OrderBlock
    }

    fn detect(&self, ctx: &AnalysisContext<'_>) -> Result<Vec<Candidate>> {
        let sm = &ctx.config.smart_money;
        let mut blocks = find_order_blocks(ctx.series, sm.order_block_lookback, sm.order_block_impulse_pct);
        // Stable sort keeps earlier blocks first on equal strength.
        blocks.sort_by(|a, b| b.strength.total_cmp(&a.strength));
        Ok(blocks
            .into_iter()
            .take(MAX_ORDER_BLOCKS)
            .map(|ob| Candidate::new(ob.direction, Priority::High, SignalDetails::OrderBlock(ob)))
            .collect())
    }
}

pub struct LiquiditySweeps;

impl Detector for LiquiditySweeps {
    fn category(&self) -> SignalCategory {
        SignalCategory::LiquiditySweep
    }

    fn detect(&self, ctx: &AnalysisContext<'_>) -> Result<Vec<Candidate>> {
        let sm = &ctx.config.smart_money;
        let zones = find_liquidity_zones(ctx.series, sm.liquidity_tolerance_pct);
        let sweeps = detect_liquidity_sweeps(ctx.series, &zones, sm, ctx.config.signals.volume_window);
        Ok(sweeps
            .into_iter()
            .take(MAX_SWEEPS)
            .map(|s| Candidate::new(s.direction, Priority::High, SignalDetails::LiquiditySweep(s)))
            .collect())
    }
}

pub struct Divergences;

impl Detector for Divergences {
    fn category(&self) -> SignalCategory {
        SignalCategory::Divergence
    }

    fn detect(&self, ctx: &AnalysisContext<'_>) -> Result<Vec<Candidate>> {
        ensure!(
            ctx.indicators.len() == ctx.series.klines(),
            "indicator set has {} rows for {} candles",
            ctx.indicators.len(),
            ctx.series.klines()
        );
        let mut found = find_divergences(ctx.series, ctx.indicators, Oscillator::Rsi);
        found.extend(find_divergences(ctx.series, ctx.indicators, Oscillator::Macd));
        Ok(found
            .into_iter()
            .take(MAX_DIVERGENCES)
            .map(|d| Candidate::new(d.direction, Priority::High, SignalDetails::Divergence(d)))
            .collect())
    }
}

pub struct Patterns;

impl Detector for Patterns {
    fn category(&self) -> SignalCategory {
        SignalCategory::Pattern
    }

    fn detect(&self, ctx: &AnalysisContext<'_>) -> Result<Vec<Candidate>> {
        Ok(find_all_patterns(ctx.series)
            .into_iter()
            .filter_map(|p| {
                let priority = match p.reliability {
                    Reliability::High => Priority::Medium,
                    Reliability::Medium => Priority::Low,
                    Reliability::Low => return None,
                };
                Some(Candidate::new(p.direction, priority, SignalDetails::Pattern(p)))
            })
            .take(MAX_PATTERNS)
            .collect())
    }
}

pub struct VolumeSpikes;

impl Detector for VolumeSpikes {
    fn category(&self) -> SignalCategory {
        SignalCategory::VolumeSpike
    }

    fn detect(&self, ctx: &AnalysisContext<'_>) -> Result<Vec<Candidate>> {
        let signals = &ctx.config.signals;
        Ok(
            detect_volume_anomaly(ctx.series, signals.volume_window, signals.volume_spike_multiplier)
                .filter(|a| a.is_anomaly)
                .map(|a| Candidate::new(Direction::Neutral, Priority::Medium, SignalDetails::VolumeSpike(a)))
                .into_iter()
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::indicator_engine::compute_indicators;
    use crate::utils::fixtures;

    fn run(detector: &dyn Detector, series: &CandleSeries, levels: &Levels) -> Result<Vec<Candidate>> {
        let config = ScannerConfig::default();
        let indicators = compute_indicators(series, &config);
        let ctx = AnalysisContext {
            series,
            indicators: &indicators,
            levels,
            config: &config,
        };
        detector.detect(&ctx)
    }

    /// 19 quiet candles at volume 100, then 108 -> 111 on volume 300.
    fn breakout_series() -> CandleSeries {
        let mut rows = vec![(107.5, 108.5, 107.0, 108.0, 100.0); 19];
        rows.push((108.0, 111.5, 107.8, 111.0, 300.0));
        fixtures::series_from_rows(&rows)
    }

    #[test]
    fn detectors_report_their_category() {
        let categories: Vec<_> = default_detectors().iter().map(|d| d.category()).collect();
        assert_eq!(categories.len(), 10);
        assert_eq!(categories[0], SignalCategory::StructureBreak);
        assert_eq!(categories[9], SignalCategory::VolumeSpike);
        assert!(!categories.contains(&SignalCategory::Confluence));
    }

    #[test]
    fn volume_confirmed_breakout_is_high_priority() {
        let series = breakout_series();
        let levels = Levels::new(vec![100.0], vec![110.0]);
        let found = run(&Breakouts, &series, &levels).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].direction, Direction::Bullish);
        assert_eq!(found[0].priority, Priority::High);
        match &found[0].details {
            SignalDetails::Breakout(b) => {
                assert!(b.volume_confirmed);
                assert_eq!(b.broken_level, 110.0);
                assert_eq!(b.level_kind, LevelKind::Resistance);
                assert_eq!(b.volume_ratio, Some(2.73));
            }
            other => panic!("unexpected details {:?}", other),
        }
    }

    #[test]
    fn breakout_without_volume_is_medium() {
        let mut rows = vec![(107.5, 108.5, 107.0, 108.0, 100.0); 19];
        rows.push((108.0, 111.5, 107.8, 111.0, 100.0));
        let series = fixtures::series_from_rows(&rows);
        let found = run(&Breakouts, &series, &Levels::new(vec![100.0], vec![110.0])).unwrap();
        assert_eq!(found[0].priority, Priority::Medium);
    }

    #[test]
    fn level_approach_within_threshold() {
        let series = breakout_series();
        // 111 is 0.9% above 110; 100 is far away.
        let levels = Levels::new(vec![100.0], vec![112.0, 110.0]);
        let found = run(&LevelApproaches, &series, &levels).unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|c| c.direction == Direction::Bearish));
    }

    #[test]
    fn invalid_levels_fail_the_level_detectors() {
        let series = breakout_series();
        let levels = Levels::new(vec![f64::NAN], vec![110.0]);
        assert!(run(&LevelApproaches, &series, &levels).is_err());
        assert!(run(&Breakouts, &series, &levels).is_err());
        assert!(run(&FalseBreakouts, &series, &levels).is_err());
        // Detectors that ignore levels are unaffected.
        assert!(run(&VolumeSpikes, &series, &levels).is_ok());
    }

    #[test]
    fn false_breakout_of_resistance() {
        let mut rows = vec![(104.0, 105.0, 103.0, 104.0, 100.0); 20];
        rows[18] = (104.0, 111.0, 104.0, 110.5, 100.0);
        rows[19] = (110.5, 110.8, 107.0, 107.5, 100.0);
        let series = fixtures::series_from_rows(&rows);
        let found = run(&FalseBreakouts, &series, &Levels::new(vec![], vec![110.0])).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].direction, Direction::Bearish);
        match &found[0].details {
            SignalDetails::FalseBreakout(f) => assert_eq!(f.fake_extreme, 111.0),
            other => panic!("unexpected details {:?}", other),
        }
    }

    #[test]
    fn flat_series_has_no_breakouts_blocks_or_gaps() {
        let series = fixtures::flat_series(200, 100.0);
        let levels = Levels::new(vec![95.0], vec![105.0]);
        assert!(run(&Breakouts, &series, &levels).unwrap().is_empty());
        assert!(run(&OrderBlocks, &series, &levels).unwrap().is_empty());
        assert!(run(&Imbalances, &series, &levels).unwrap().is_empty());
    }

    #[test]
    fn order_blocks_strongest_first() {
        let mut rows = vec![(100.0, 100.2, 99.8, 100.0, 100.0); 40];
        rows[25] = (100.0, 103.0, 100.0, 102.5, 100.0);
        rows[30] = (100.0, 106.0, 100.0, 105.5, 100.0);
        rows[35] = (100.0, 104.0, 100.0, 103.5, 100.0);
        let series = fixtures::series_from_rows(&rows);
        let found = run(&OrderBlocks, &series, &Levels::default()).unwrap();
        let indices: Vec<usize> = found
            .iter()
            .map(|c| match &c.details {
                SignalDetails::OrderBlock(ob) => ob.index,
                _ => usize::MAX,
            })
            .collect();
        assert_eq!(indices, vec![29, 34]);
    }

    #[test]
    fn structure_breaks_keep_the_last_two_listed() {
        let series = fixtures::falling_then_rising_series();
        let found: Vec<(Direction, usize)> = run(&StructureBreaks, &series, &Levels::default())
            .unwrap()
            .iter()
            .map(|c| match &c.details {
                SignalDetails::StructureBreak(b) => (c.direction, b.index),
                _ => (c.direction, usize::MAX),
            })
            .collect();
        assert_eq!(found, vec![(Direction::Bearish, 45), (Direction::Bearish, 57)]);
        assert!(run(&StructureBreaks, &series, &Levels::default())
            .unwrap()
            .iter()
            .all(|c| c.priority == Priority::High));
    }
}
