//! Debugging feature flags.
//!
//! Toggle individual diagnostics here; keep them `false` by default so release
//! builds remain quiet.

/// Emit the full correlation matrix after every rebuild.
pub const PRINT_CORRELATION_MATRIX: bool = false;

/// Emit the per-asset ROC / ATR breakdown behind each sentiment classification.
pub const PRINT_SENTIMENT_BREAKDOWN: bool = false;

/// Emit every analysis event as it is generated.
pub const PRINT_SIGNAL_EVENTS: bool = false;

/// Emit trade open/close events during backtest simulation.
pub const PRINT_TRADE_EVENTS: bool = false;

/// If non-empty, emit factor and score details only for this symbol.
/// Example: "BTCUSDT". Use "" to disable.
pub const PRINT_FACTORS_FOR_SYMBOL: &str = "";
