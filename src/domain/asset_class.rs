use serde::{Deserialize, Serialize};
use strum_macros::Display;

// Substrings that mark a symbol as a crypto pair (e.g. "BTCUSDT", "SOL-USD")
static CRYPTO_TOKENS: &[&str] = &["BTC", "ETH", "SOL", "USDT"];

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SafeHavenKind {
    Gold,
    Yen,
    Franc,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AssetClass {
    RiskAsset,
    SafeHaven(SafeHavenKind),
    Other,
}

impl SafeHavenKind {
    /// Which safe-haven proxy (if any) this symbol quotes.
    /// Gold futures use the "GC=" prefix; spot gold tickers usually spell it out.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        if symbol.contains("GC=") || symbol.to_uppercase().contains("GOLD") {
            Some(SafeHavenKind::Gold)
        } else if symbol.contains("JPY") {
            Some(SafeHavenKind::Yen)
        } else if symbol.contains("CHF") {
            Some(SafeHavenKind::Franc)
        } else {
            None
        }
    }
}

impl AssetClass {
    // Safe-haven markers win: "XAUUSDT" style gold tokens still count as gold, not crypto.
    pub fn from_symbol(symbol: &str) -> Self {
        if let Some(kind) = SafeHavenKind::from_symbol(symbol) {
            return AssetClass::SafeHaven(kind);
        }
        if is_crypto(symbol) {
            AssetClass::RiskAsset
        } else {
            AssetClass::Other
        }
    }
}

/// Crypto vs forex split used when averaging ATR across markets.
pub fn is_crypto(symbol: &str) -> bool {
    CRYPTO_TOKENS.iter().any(|&token| symbol.contains(token))
}
