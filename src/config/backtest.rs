//! Backtest simulation configuration

use serde::{Deserialize, Serialize};

/// Bars per day assumed when annualizing the Sharpe ratio (4h cadence).
pub const SHARPE_BARS_PER_DAY: f64 = 6.0;
pub const SHARPE_TRADING_DAYS: f64 = 252.0;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    // Fraction of running equity committed per trade
    pub position_size_pct: f64,
    // Fractions of the (unslipped) entry price
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
    pub max_open_trades: usize,
    pub slippage_pct: f64,
    // Charged on entry notional, twice (round trip)
    pub commission_pct: f64,
    // When false, an opposite actionable signal only closes the open trade
    pub flip_on_opposite_signal: bool,
}

pub const BACKTEST: BacktestConfig = BacktestConfig {
    initial_capital: 10_000.0,
    position_size_pct: 0.02,
    stop_loss_pct: 0.02,
    take_profit_pct: 0.04,
    max_open_trades: 3,
    slippage_pct: 0.001,
    commission_pct: 0.001,
    flip_on_opposite_signal: false,
};

impl Default for BacktestConfig {
    fn default() -> Self {
        BACKTEST
    }
}

impl BacktestConfig {
    pub fn periods_per_year() -> f64 {
        SHARPE_BARS_PER_DAY * SHARPE_TRADING_DAYS
    }
}
