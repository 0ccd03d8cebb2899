//! Performance statistics over a finished run.
//!
//! Everything here is derived once from the trade ledger and equity curve.

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::backtest::trade::Trade;
use crate::config::BacktestConfig;
use crate::utils::maths_utils::wilson_interval;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub trades: Vec<Trade>,
    pub total_pnl: f64,
    pub total_trades: usize,
    pub winning_trades: usize,
    // Includes break-even trades
    pub losing_trades: usize,
    pub win_rate: f64,
    /// 95% Wilson interval around `win_rate`.
    pub win_rate_interval: (f64, f64),
    pub gross_profit: f64,
    pub gross_loss: f64,
    /// Infinite when there are profits and no losses. Serialized as `null` then.
    pub profit_factor: f64,
    pub max_drawdown: f64,
    pub sharpe_ratio: f64,
    pub equity_curve: Vec<f64>,
}

impl BacktestResult {
    pub fn from_ledger(trades: Vec<Trade>, equity_curve: Vec<f64>) -> Self {
        let total_trades = trades.len();
        let winning_trades = trades.iter().filter(|t| t.is_winner()).count();
        let gross_profit: f64 = trades.iter().map(|t| t.pnl).filter(|p| *p > 0.0).sum();
        let gross_loss: f64 = trades
            .iter()
            .map(|t| t.pnl)
            .filter(|p| *p < 0.0)
            .sum::<f64>()
            .abs();

        Self {
            total_pnl: trades.iter().map(|t| t.pnl).sum(),
            total_trades,
            winning_trades,
            losing_trades: total_trades - winning_trades,
            win_rate: win_rate(winning_trades, total_trades),
            win_rate_interval: wilson_interval(winning_trades, total_trades),
            gross_profit,
            gross_loss,
            profit_factor: profit_factor(gross_profit, gross_loss),
            max_drawdown: max_drawdown(&equity_curve),
            sharpe_ratio: sharpe_ratio(&equity_curve, BacktestConfig::periods_per_year()),
            trades,
            equity_curve,
        }
    }
}

pub fn win_rate(winners: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        winners as f64 / total as f64
    }
}

/// `gross_loss` is the absolute value of the summed losses.
pub fn profit_factor(gross_profit: f64, gross_loss: f64) -> f64 {
    if gross_loss > 0.0 {
        gross_profit / gross_loss
    } else if gross_profit > 0.0 {
        f64::INFINITY
    } else {
        0.0
    }
}

/// Largest fall from a running peak, as a fraction of that peak.
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    if equity_curve.len() < 2 {
        return 0.0;
    }
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0_f64;
    for &value in equity_curve {
        peak = peak.max(value);
        if peak > 0.0 {
            worst = worst.max((peak - value) / peak);
        }
    }
    worst
}

/// Annualized mean/std of step returns (population std). Zero with fewer than
/// two returns or no variance.
pub fn sharpe_ratio(equity_curve: &[f64], periods_per_year: f64) -> f64 {
    let returns: Vec<f64> = equity_curve
        .windows(2)
        .filter(|w| w[0] != 0.0)
        .map(|w| (w[1] - w[0]) / w[0])
        .filter(|r| r.is_finite())
        .collect();
    if returns.len() < 2 {
        return 0.0;
    }

    let mean_return = returns.iter().mean();
    let std_return = returns.iter().population_std_dev();
    if !(std_return > 0.0) {
        return 0.0;
    }
    mean_return / std_return * periods_per_year.sqrt()
}
