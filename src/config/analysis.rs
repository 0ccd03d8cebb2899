//! Analysis and computation configuration

use serde::{Deserialize, Serialize};

/// Settings for the rolling cross-symbol correlation matrix
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct CorrelationSettings {
    // Bars older than this (relative to each symbol's latest bar) are ignored
    pub lookback_hours: i64,
    // Minimum bars a symbol needs inside the window to take part
    pub min_data_points: usize,
    // |corr| at or above this counts as "highly correlated"
    pub high_correlation_threshold: f64,
}

/// ATR% boundaries between the per-symbol volatility regimes
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct RegimeThresholds {
    pub low: f64,
    pub normal: f64,
    pub high: f64,
}

/// Settings for the per-symbol ATR volatility analysis
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct VolatilitySettings {
    pub atr_period: usize,
    // Fractional ATR (not percent) below which a symbol is "consolidating"
    pub consolidation_threshold: f64,
    pub regimes: RegimeThresholds,
}

/// Raw factor weights. Normalized by `ProbabilityWeights::new` before use.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct WeightSettings {
    pub roc: f64,
    pub volatility: f64,
    pub volume: f64,
    pub correlation: f64,
}

/// Settings for the multi-factor directional probability model
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct ProbabilitySettings {
    // Bars used for ROC and the volume moving average
    pub lookback: usize,
    pub atr_period: usize,
    // Minimum confidence for a probability event to be emitted
    pub confidence_threshold: f64,
    // Confidence at which a signal becomes actionable / high importance
    pub high_confidence_threshold: f64,
    pub weights: WeightSettings,
}

/// The Master Analysis Configuration
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    // Sub-groups
    pub correlation: CorrelationSettings,
    pub volatility: VolatilitySettings,
    pub probability: ProbabilitySettings,
}

pub const ANALYSIS: AnalysisConfig = AnalysisConfig {
    correlation: CorrelationSettings {
        lookback_hours: 24,
        min_data_points: 20,
        high_correlation_threshold: 0.7,
    },

    volatility: VolatilitySettings {
        atr_period: 14,
        consolidation_threshold: 0.01,
        regimes: RegimeThresholds {
            low: 0.5,
            normal: 1.0,
            high: 2.0,
        },
    },

    probability: ProbabilitySettings {
        lookback: 24,
        atr_period: 14,
        confidence_threshold: 0.4,
        high_confidence_threshold: 0.6,
        weights: WeightSettings {
            roc: 0.25,
            volatility: 0.25,
            volume: 0.25,
            correlation: 0.25,
        },
    },
};

impl Default for CorrelationSettings {
    fn default() -> Self {
        ANALYSIS.correlation
    }
}

impl Default for RegimeThresholds {
    fn default() -> Self {
        ANALYSIS.volatility.regimes
    }
}

impl Default for VolatilitySettings {
    fn default() -> Self {
        ANALYSIS.volatility
    }
}

impl Default for WeightSettings {
    fn default() -> Self {
        ANALYSIS.probability.weights
    }
}

impl Default for ProbabilitySettings {
    fn default() -> Self {
        ANALYSIS.probability
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        ANALYSIS
    }
}
