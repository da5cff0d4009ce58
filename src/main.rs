use std::str::FromStr;

use anyhow::{Context, Result, bail};
use clap::Parser;
use serde::Serialize;

use structure_scanner::analysis::correlation::analyze_correlation;
use structure_scanner::models::find_matching_series;
use structure_scanner::utils::TimeUtils;
use structure_scanner::{
    Cli, Command, MultiPairScanner, MultiTimeframeCoordinator, ScannerConfig, SeriesFile,
    SignalCategory,
};

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .context("Failed to serialize output")?;
    println!("{}", text);
    Ok(())
}

fn parse_categories(names: &[String]) -> Result<Vec<SignalCategory>> {
    names
        .iter()
        .map(|n| {
            SignalCategory::from_str(n.trim()).context(format!("Unknown signal category '{}'", n))
        })
        .collect()
}

fn run(args: &Cli, config: ScannerConfig) -> Result<()> {
    match &args.command {
        Command::Scan {
            input,
            interval,
            workers,
            categories,
            overview,
        } => {
            let file = SeriesFile::load_from_path(input)?;
            let series_data = match interval {
                Some(label) => file.data.at_interval(TimeUtils::interval_from_str(label)?),
                None => file.data.series_data,
            };
            if series_data.is_empty() {
                bail!("No series to scan in {}", input.display());
            }
            let enabled = categories.as_deref().map(parse_categories).transpose()?;

            let scanner = MultiPairScanner::new(config, *workers)?;
            let outcomes = scanner.scan(&series_data, enabled.as_deref());
            print_json(&outcomes, args.pretty)?;
            if *overview {
                print_json(&scanner.market_overview(&series_data), args.pretty)?;
            }
        }
        Command::Mtf {
            input,
            symbol,
            with_signals,
        } => {
            let file = SeriesFile::load_from_path(input)?;
            let coordinator = MultiTimeframeCoordinator::new(config);
            let analysis = coordinator.analyze(symbol, &file.data.series_data, *with_signals);
            if analysis.timeframes.is_empty() {
                log::warn!("{}: no timeframe had enough candles", symbol);
            }
            print_json(&analysis, args.pretty)?;
        }
        Command::Correlate {
            input,
            symbol,
            reference,
            interval,
        } => {
            let file = SeriesFile::load_from_path(input)?;
            let interval_ms = TimeUtils::interval_from_str(interval)?;
            let series = find_matching_series(&file.data.series_data, symbol, interval_ms)?;
            let reference = find_matching_series(&file.data.series_data, reference, interval_ms)?;
            let report = analyze_correlation(series, reference, config.min_candles.correlation)?;
            print_json(&report, args.pretty)?;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args = Cli::parse();
    #[cfg(debug_assertions)]
    log::info!("Parsed arguments: {:?}", args);

    let config = args.load_config()?;
    run(&args, config)
}
