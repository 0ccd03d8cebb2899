// Bar-by-bar trade simulation over analyzer signals
pub mod engine;
pub mod metrics;
pub mod trade;

pub use engine::BacktestEngine;
pub use metrics::BacktestResult;
pub use trade::{Trade, TradeDirection, TradeStatus};
