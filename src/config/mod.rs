//! Configuration module for the signal-sniper application.

pub mod analysis;
pub mod backtest;
pub mod debug;
pub mod persistence;
pub mod sentiment;

// Re-export commonly used items
pub use analysis::{
    ANALYSIS, AnalysisConfig, CorrelationSettings, ProbabilitySettings, RegimeThresholds,
    VolatilitySettings, WeightSettings,
};
pub use backtest::{BACKTEST, BacktestConfig};
pub use persistence::{AppConfig, DEFAULT_TIMEFRAME, load_config};
pub use sentiment::{GlobalVolatilityThresholds, SentimentSettings};
