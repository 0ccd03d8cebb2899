use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::analysis::Direction;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeDirection {
    Long,
    Short,
}

impl TradeDirection {
    /// Consolidation has no tradeable side.
    pub fn from_direction(direction: Direction) -> Option<Self> {
        match direction {
            Direction::Upward => Some(TradeDirection::Long),
            Direction::Downward => Some(TradeDirection::Short),
            Direction::Consolidation => None,
        }
    }

    /// +1 for long, -1 for short.
    pub fn sign(&self) -> f64 {
        match self {
            TradeDirection::Long => 1.0,
            TradeDirection::Short => -1.0,
        }
    }

    /// Price after slippage against the trader when entering on this side.
    pub fn slipped_entry(&self, price: f64, slippage: f64) -> f64 {
        price * (1.0 + self.sign() * slippage)
    }

    /// Price after slippage against the trader when exiting this side.
    pub fn slipped_exit(&self, price: f64, slippage: f64) -> f64 {
        price * (1.0 - self.sign() * slippage)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeStatus {
    Open,
    ClosedTp,
    ClosedSl,
    ClosedSignal,
    ClosedEnd,
}

/// One simulated position. Created open; `close` consumes it and hands back
/// the terminal record, so a trade can never be closed twice or reopened.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Trade {
    pub symbol: String,
    pub direction: TradeDirection,
    // Slipped fill price
    pub entry_price: f64,
    pub entry_time: DateTime<Utc>,
    // Units of the instrument
    pub position_size: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub status: TradeStatus,
    pub exit_price: Option<f64>,
    pub exit_time: Option<DateTime<Utc>>,
    pub pnl: f64,
}

impl Trade {
    pub fn new(
        symbol: impl Into<String>,
        direction: TradeDirection,
        entry_price: f64,
        entry_time: DateTime<Utc>,
        position_size: f64,
        stop_loss: f64,
        take_profit: f64,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            direction,
            entry_price,
            entry_time,
            position_size,
            stop_loss,
            take_profit,
            status: TradeStatus::Open,
            exit_price: None,
            exit_time: None,
            pnl: 0.0,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == TradeStatus::Open
    }

    pub fn is_winner(&self) -> bool {
        self.pnl > 0.0
    }

    /// Mark-to-market PnL at `price`, before exit costs.
    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.direction.sign() * (price - self.entry_price) * self.position_size
    }

    /// Exit at `exit_price` (slipped against the trader) and book the PnL net of
    /// round-trip commission on the entry notional.
    pub fn close(
        mut self,
        exit_price: f64,
        exit_time: DateTime<Utc>,
        status: TradeStatus,
        slippage: f64,
        commission: f64,
    ) -> Trade {
        let fill = self.direction.slipped_exit(exit_price, slippage);
        let raw_pnl = self.direction.sign() * (fill - self.entry_price) * self.position_size;
        let commission_cost = self.entry_price * self.position_size * commission * 2.0;

        self.exit_price = Some(fill);
        self.exit_time = Some(exit_time);
        self.status = status;
        self.pnl = raw_pnl - commission_cost;
        self
    }
}
