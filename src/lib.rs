#![allow(clippy::const_is_empty)]
#![allow(clippy::collapsible_if)]
#![allow(clippy::collapsible_else_if)]
#![allow(clippy::type_complexity)]

// Core modules
pub mod analysis;
pub mod backtest;
pub mod config;
pub mod data;
pub mod domain;
pub mod models;
pub mod utils;

// Per-cycle orchestration
pub mod engine;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use analysis::{
    AnalysisEvent, AnalysisResult, MarketSentiment, MarketSentimentAggregator,
    ProbabilisticAnalyzer, SignalSource,
};
pub use backtest::{BacktestEngine, BacktestResult};
pub use config::{AppConfig, load_config};
pub use data::{TimeSeriesCollection, load_collection};
pub use domain::Candle;
pub use engine::{CycleReport, SignalEngine};
pub use models::{OhlcvTimeSeries, TimeSeriesSlice};

use std::path::PathBuf;

use anyhow::Result;
use utils::TimeUtils;
// CLI argument parsing
use clap::{Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// JSON file holding the OHLCV collection to analyse
    #[arg(long)]
    pub data: PathBuf,

    /// Optional JSON configuration; missing keys keep their defaults
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Timeframe label attached to events (overrides the config file)
    #[arg(long)]
    pub timeframe: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Run one analysis cycle over the latest bars
    Analyze,
    /// Replay the collection bar by bar and report trade statistics
    Backtest,
}

/// Load inputs named on the command line and run the requested command.
/// Returns the JSON report to print.
pub fn run_cli(args: &Cli) -> Result<String> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(timeframe) = &args.timeframe {
        config.timeframe = timeframe.clone();
    }
    let collection = load_collection(&args.data)?;
    check_timeframe_label(&collection, &config.timeframe);

    match args.command {
        Command::Analyze => {
            let mut engine = SignalEngine::new(collection, &config)?;
            log::info!(
                "Analyzing {} symbols: {}",
                engine.get_symbol_count(),
                engine.get_all_symbols().join(", ")
            );
            let report = engine.run_cycle();
            Ok(serde_json::to_string_pretty(report)?)
        }
        Command::Backtest => {
            let mut analyzer = ProbabilisticAnalyzer::new(&config.analysis)?;
            let mut backtest =
                BacktestEngine::new(config.backtest).with_timeframe(config.timeframe.clone());
            if config.sentiment.enabled {
                backtest = backtest.with_sentiment(MarketSentimentAggregator::new(config.sentiment));
            }
            let result = backtest.run(&collection, &mut analyzer);
            log::info!(
                "Backtest finished: {} trades, win rate {:.1}%, PnL {:.2}",
                result.total_trades,
                result.win_rate * 100.0,
                result.total_pnl
            );
            Ok(serde_json::to_string_pretty(&result)?)
        }
    }
}

/// Warn when the bar spacing in the data disagrees with the timeframe label.
/// Returns the label inferred from the data, if any.
pub fn check_timeframe_label(
    collection: &TimeSeriesCollection,
    timeframe: &str,
) -> Option<&'static str> {
    let label = TimeUtils::interval_to_string(collection.interval_ms()?);
    if label != timeframe {
        log::warn!(
            "Data bars look like {} but events will be labelled {}",
            label,
            timeframe
        );
    }
    Some(label)
}
