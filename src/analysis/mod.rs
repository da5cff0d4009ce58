// Indicator, structure and pattern detection plus the aggregation layers on top
pub mod categories;
pub mod correlation;
pub mod divergence;
pub mod indicator_engine;
pub mod level_finder;
pub mod multi_pair_scanner;
pub mod multi_timeframe;
pub mod patterns;
pub mod signal_aggregator;
pub mod smart_money;
pub mod technical;

// Re-export commonly used types
pub use categories::{AnalysisContext, Candidate, Detector};
pub use correlation::{CorrelationReport, analyze_correlation};
pub use indicator_engine::compute_indicators;
pub use level_finder::find_levels;
pub use multi_pair_scanner::{MarketOverview, MultiPairScanner, ScanOutcome};
pub use multi_timeframe::{MtfAnalysis, MultiTimeframeCoordinator};
pub use signal_aggregator::SignalAggregator;
