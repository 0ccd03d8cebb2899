use serde::{Deserialize, Serialize};

/// One OHLCV bar
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Candle {
    pub timestamp_ms: i64,
    pub open_price: f64,
    pub high_price: f64,
    pub low_price: f64,
    pub close_price: f64,
    // Some feeds (forex quotes) carry no volume
    pub volume: Option<f64>,
}

impl Candle {
    pub fn new(
        timestamp_ms: i64,
        open_price: f64,
        high_price: f64,
        low_price: f64,
        close_price: f64,
        volume: Option<f64>,
    ) -> Self {
        Candle {
            timestamp_ms,
            open_price,
            high_price,
            low_price,
            close_price,
            volume,
        }
    }
}
