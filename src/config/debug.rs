//! Debugging feature flags.
//!
//! Toggle individual diagnostics here; keep them `false` by default. Every
//! use site is additionally gated by `cfg(debug_assertions)`.

/// Emit per-batch signal counts by category after aggregation.
pub const PRINT_BATCH_SUMMARY: bool = false;

/// Emit per-symbol wall time for multi-pair scans.
pub const PRINT_SCAN_TIMINGS: bool = false;

/// Emit a line for every timeframe the multi-timeframe pass skips.
pub const PRINT_SKIPPED_TIMEFRAMES: bool = false;

/// Emit indicator fields that came back entirely undefined.
pub const PRINT_UNDEFINED_INDICATORS: bool = false;

/// If non-empty, emit raw detector candidates only for this symbol.
/// Example: "BTCUSDT". Use "" to disable.
pub const PRINT_CANDIDATES_FOR_PAIR: &str = "";

/// Emit detailed config / series file serialization logs.
pub const PRINT_CONFIG_SERDE: bool = false;
