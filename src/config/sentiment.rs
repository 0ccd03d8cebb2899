//! Cross-market sentiment configuration

use serde::{Deserialize, Serialize};

pub const DEFAULT_RISK_ASSETS: &[&str] = &["BTCUSDT", "ETHUSDT", "SOLUSDT"];
pub const DEFAULT_SAFE_HAVEN_ASSETS: &[&str] = &["GC=F", "USDJPY=X", "USDCHF=X"];

/// Cross-market ATR% boundaries for the global volatility regime
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct GlobalVolatilityThresholds {
    pub low: f64,
    pub elevated: f64,
    pub crisis: f64,
}

impl Default for GlobalVolatilityThresholds {
    fn default() -> Self {
        Self {
            low: 0.5,
            elevated: 2.0,
            crisis: 4.0,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SentimentSettings {
    pub enabled: bool,
    pub risk_assets: Vec<String>,
    pub safe_haven_assets: Vec<String>,
    pub roc_lookback: usize,
    pub atr_period: usize,
    // Net score above this is risk-on
    pub risk_threshold: f64,
    // Net score below minus this (or a safe-haven score above it) is risk-off
    pub safe_haven_threshold: f64,
    pub volatility: GlobalVolatilityThresholds,
}

impl Default for SentimentSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            risk_assets: DEFAULT_RISK_ASSETS.iter().map(|s| s.to_string()).collect(),
            safe_haven_assets: DEFAULT_SAFE_HAVEN_ASSETS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            roc_lookback: 24,
            atr_period: 14,
            risk_threshold: 0.3,
            safe_haven_threshold: 0.3,
            volatility: GlobalVolatilityThresholds::default(),
        }
    }
}
