use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};

use crate::analysis::indicators::average_true_range;
use crate::config::{RegimeThresholds, VolatilitySettings};
use crate::models::TimeSeriesSlice;

#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum VolatilityRegime {
    Low,
    Normal,
    High,
    Extreme,
}

impl VolatilityRegime {
    pub fn classify(atr_percent: f64, thresholds: &RegimeThresholds) -> Self {
        if atr_percent < thresholds.low {
            VolatilityRegime::Low
        } else if atr_percent < thresholds.normal {
            VolatilityRegime::Normal
        } else if atr_percent < thresholds.high {
            VolatilityRegime::High
        } else {
            VolatilityRegime::Extreme
        }
    }

    /// Regimes worth an alert.
    pub fn is_elevated(&self) -> bool {
        matches!(self, VolatilityRegime::High | VolatilityRegime::Extreme)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct VolatilityResult {
    pub symbol: String,
    pub atr: f64,
    pub atr_percent: f64,
    pub regime: VolatilityRegime,
    pub is_consolidation: bool,
    pub current_price: f64,
    // atr_percent on a 0..1 scale
    pub volatility_score: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VolatilityAnalyzer {
    settings: VolatilitySettings,
}

impl VolatilityAnalyzer {
    pub fn new(settings: VolatilitySettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &VolatilitySettings {
        &self.settings
    }

    /// ATR-based reading for the latest bar, or `None` when history is short
    /// or the latest price is not positive.
    pub fn analyze(&self, series: &TimeSeriesSlice<'_>) -> Option<VolatilityResult> {
        let symbol = series.symbol();
        if series.is_empty() {
            log::warn!("Empty series for {}", symbol);
            return None;
        }
        let period = self.settings.atr_period;
        if series.len() < period + 1 {
            log::debug!(
                "Insufficient data for {}: need {}, got {}",
                symbol,
                period + 1,
                series.len()
            );
            return None;
        }

        let closes = series.close_prices();
        let Some(atr) = average_true_range(series.high_prices(), series.low_prices(), closes, period)
        else {
            log::warn!("Failed to calculate ATR for {}", symbol);
            return None;
        };

        let current_price = *closes.last()?;
        if current_price <= 0.0 {
            log::warn!("Invalid price for {}: {}", symbol, current_price);
            return None;
        }

        let atr_percent = atr / current_price * 100.0;
        Some(VolatilityResult {
            symbol: symbol.to_string(),
            atr,
            atr_percent,
            regime: VolatilityRegime::classify(atr_percent, &self.settings.regimes),
            is_consolidation: self.is_consolidation(atr_percent),
            current_price,
            volatility_score: Self::volatility_score(atr_percent),
        })
    }

    /// `consolidation_threshold` is a fraction, `atr_percent` a percentage.
    pub fn is_consolidation(&self, atr_percent: f64) -> bool {
        atr_percent / 100.0 < self.settings.consolidation_threshold
    }

    /// ATR% mapped onto [0, 1], saturating at 3%.
    pub fn volatility_score(atr_percent: f64) -> f64 {
        (atr_percent / 3.0).clamp(0.0, 1.0)
    }
}
