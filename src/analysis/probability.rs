//! Multi-factor directional forecast.
//!
//! Four factors (ROC, ATR%, volume ratio, average correlation) are combined into
//! one raw score per direction and turned into probabilities with a softmax.
//! An optional market-sentiment snapshot then tilts the distribution towards the
//! direction the wider market favours for this kind of asset.

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};

use crate::analysis::indicators::{atr_percent, rate_of_change, volume_ratio};
use crate::analysis::sentiment::{GlobalVolatilityRegime, MarketSentiment, RiskSentiment};
use crate::config::debug::PRINT_FACTORS_FOR_SYMBOL;
use crate::config::{ProbabilitySettings, WeightSettings};
use crate::domain::AssetClass;
use crate::models::TimeSeriesSlice;
use crate::utils::maths_utils::softmax;

/// Factor value used when ATR% cannot be computed.
pub const NEUTRAL_VOLATILITY: f64 = 1.0;
/// Factor value used when the volume ratio cannot be computed (or volume is absent).
pub const NEUTRAL_VOLUME: f64 = 1.0;
/// Factor value used when no correlation context is available.
pub const NEUTRAL_CORRELATION: f64 = 0.5;

/// Flat boost to consolidation under crisis-level global volatility.
pub const CRISIS_CONSOLIDATION_BOOST: f64 = 0.15;

// Tolerance before a weight vector is reported as "not summing to one"
const WEIGHT_SUM_TOLERANCE: f64 = 0.01;

#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Upward,
    Downward,
    Consolidation,
}

impl Direction {
    /// Declared order. Ties in arg-max go to the earliest entry.
    pub const ALL: [Direction; 3] = [
        Direction::Upward,
        Direction::Downward,
        Direction::Consolidation,
    ];
}

/// Probability mass per direction. Always sums to 1 once normalized.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct DirectionProbabilities {
    pub upward: f64,
    pub downward: f64,
    pub consolidation: f64,
}

impl DirectionProbabilities {
    pub fn from_array(values: [f64; 3]) -> Self {
        Self {
            upward: values[0],
            downward: values[1],
            consolidation: values[2],
        }
    }

    pub fn to_array(&self) -> [f64; 3] {
        [self.upward, self.downward, self.consolidation]
    }

    pub fn get(&self, direction: Direction) -> f64 {
        match direction {
            Direction::Upward => self.upward,
            Direction::Downward => self.downward,
            Direction::Consolidation => self.consolidation,
        }
    }

    pub fn sum(&self) -> f64 {
        self.upward + self.downward + self.consolidation
    }

    /// Rescale to sum to 1. A degenerate vector becomes uniform.
    pub fn normalized(&self) -> Self {
        let total = self.sum();
        if !(total > 0.0) || !total.is_finite() {
            return Self::from_array([1.0 / 3.0; 3]);
        }
        Self::from_array(self.to_array().map(|p| p / total))
    }

    /// Highest probability; strictly-greater comparison keeps the first of equals.
    pub fn argmax(&self) -> Direction {
        let mut best = Direction::ALL[0];
        for direction in Direction::ALL.into_iter().skip(1) {
            if self.get(direction) > self.get(best) {
                best = direction;
            }
        }
        best
    }

    /// Margin between the largest and second-largest probability.
    pub fn top_margin(&self) -> f64 {
        let mut values = self.to_array();
        values.sort_by(|a, b| b.total_cmp(a));
        values[0] - values[1]
    }
}

/// Factor weights, normalized to sum to 1 at construction.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct ProbabilityWeights {
    roc: f64,
    volatility: f64,
    volume: f64,
    correlation: f64,
}

impl Default for ProbabilityWeights {
    fn default() -> Self {
        Self {
            roc: 0.25,
            volatility: 0.25,
            volume: 0.25,
            correlation: 0.25,
        }
    }
}

impl ProbabilityWeights {
    /// Each weight must be finite and non-negative with a positive total.
    /// Every weight is divided by the raw total.
    pub fn new(roc: f64, volatility: f64, volume: f64, correlation: f64) -> Result<Self> {
        let raw = [roc, volatility, volume, correlation];
        if raw.iter().any(|w| !w.is_finite() || *w < 0.0) {
            bail!("Probability weights must be finite and non-negative, got {:?}", raw);
        }
        let total: f64 = raw.iter().sum();
        if total <= 0.0 {
            bail!("Probability weights must not all be zero");
        }
        if (total - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            log::warn!("Weights sum to {}, normalizing to 1.0", total);
        }
        Ok(Self {
            roc: roc / total,
            volatility: volatility / total,
            volume: volume / total,
            correlation: correlation / total,
        })
    }

    pub fn from_settings(settings: &WeightSettings) -> Result<Self> {
        Self::new(
            settings.roc,
            settings.volatility,
            settings.volume,
            settings.correlation,
        )
    }

    pub fn roc(&self) -> f64 {
        self.roc
    }

    pub fn volatility(&self) -> f64 {
        self.volatility
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn correlation(&self) -> f64 {
        self.correlation
    }
}

/// Factor values actually fed into the scores (neutral fallbacks included).
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct ProbabilityFactors {
    // Percent
    pub roc: f64,
    // ATR as a percentage of price
    pub volatility: f64,
    // Latest volume over its moving average
    pub volume: f64,
    // Mean |corr| against the other symbols
    pub correlation: f64,
}

/// Record of how market sentiment altered a prediction.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MarketContext {
    pub sentiment: RiskSentiment,
    pub asset_class: AssetClass,
    pub modifier: f64,
    pub reasoning: String,
    pub crisis_adjusted: bool,
    // Margin of the adjusted distribution scaled by the sentiment's own confidence
    pub adjusted_confidence: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ProbabilityResult {
    pub symbol: String,
    pub direction: Direction,
    pub probabilities: DirectionProbabilities,
    pub confidence: f64,
    pub is_actionable: bool,
    pub factors: ProbabilityFactors,
    pub market_context: Option<MarketContext>,
}

/// Sentiment multiplier and its explanation for one asset class.
pub fn sentiment_modifier(sentiment: RiskSentiment, asset_class: AssetClass) -> (f64, &'static str) {
    match (sentiment, asset_class) {
        (RiskSentiment::RiskOn, AssetClass::RiskAsset) => {
            (1.1, "Risk-on environment favors risk assets")
        }
        (RiskSentiment::RiskOn, AssetClass::SafeHaven(_)) => {
            (0.95, "Risk-on environment reduces safe-haven demand")
        }
        (RiskSentiment::RiskOff, AssetClass::RiskAsset) => {
            (0.9, "Risk-off environment pressures risk assets")
        }
        (RiskSentiment::RiskOff, AssetClass::SafeHaven(_)) => {
            (1.1, "Risk-off environment supports safe havens")
        }
        (RiskSentiment::Neutral, _) => (1.0, "Neutral market sentiment"),
        (_, AssetClass::Other) => (1.0, "No sentiment bias for this asset class"),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ProbabilityModel {
    settings: ProbabilitySettings,
    weights: ProbabilityWeights,
}

impl ProbabilityModel {
    pub fn new(settings: ProbabilitySettings) -> Result<Self> {
        let weights = ProbabilityWeights::from_settings(&settings.weights)?;
        Ok(Self { settings, weights })
    }

    pub fn with_weights(settings: ProbabilitySettings, weights: ProbabilityWeights) -> Self {
        Self { settings, weights }
    }

    pub fn weights(&self) -> &ProbabilityWeights {
        &self.weights
    }

    pub fn settings(&self) -> &ProbabilitySettings {
        &self.settings
    }

    /// Forecast for the latest bar of `series`, or `None` with fewer than
    /// `lookback + 1` bars.
    pub fn predict(
        &self,
        series: &TimeSeriesSlice<'_>,
        avg_correlation: Option<f64>,
        sentiment: Option<&MarketSentiment>,
    ) -> Option<ProbabilityResult> {
        let symbol = series.symbol();
        if series.len() < self.settings.lookback + 1 {
            log::debug!(
                "Insufficient data for {}: need {}, got {}",
                symbol,
                self.settings.lookback + 1,
                series.len()
            );
            return None;
        }

        let factors = self.factors(series, avg_correlation);
        let scores = self.raw_scores(&factors);
        let probabilities = DirectionProbabilities::from_array(
            softmax(&scores.to_array())
                .try_into()
                .unwrap_or([1.0 / 3.0; 3]),
        );

        if !PRINT_FACTORS_FOR_SYMBOL.is_empty() && PRINT_FACTORS_FOR_SYMBOL == symbol {
            log::info!(
                "[{}] factors={:?} scores={:?} probabilities={:?}",
                symbol,
                factors,
                scores,
                probabilities
            );
        }

        let mut result = self.finish(symbol, probabilities, factors);
        if let Some(sentiment) = sentiment {
            self.apply_market_context(&mut result, sentiment);
        }
        Some(result)
    }

    pub fn factors(
        &self,
        series: &TimeSeriesSlice<'_>,
        avg_correlation: Option<f64>,
    ) -> ProbabilityFactors {
        let closes = series.close_prices();
        ProbabilityFactors {
            roc: rate_of_change(closes, self.settings.lookback).unwrap_or(0.0),
            volatility: atr_percent(
                series.high_prices(),
                series.low_prices(),
                closes,
                self.settings.atr_period,
            )
            .unwrap_or(NEUTRAL_VOLATILITY),
            volume: series
                .volumes()
                .and_then(|v| volume_ratio(v, self.settings.lookback))
                .unwrap_or(NEUTRAL_VOLUME),
            // A measured 0.0 is a real reading; only a missing one is neutral
            correlation: avg_correlation.unwrap_or(NEUTRAL_CORRELATION),
        }
    }

    /// Unnormalized per-direction scores.
    pub fn raw_scores(&self, factors: &ProbabilityFactors) -> DirectionProbabilities {
        let w = &self.weights;
        let roc = factors.roc;
        let volatility = factors.volatility;

        let roc_up = roc.max(0.0) / 10.0;
        let roc_down = (-roc).max(0.0) / 10.0;
        let volatility_consolidation = (2.0 - volatility).max(0.0) / 2.0;
        let volume_factor = factors.volume.min(2.0) / 2.0;
        let correlation_penalty = factors.correlation * 0.5;

        let upward = w.roc * roc_up
            + w.volatility * (volatility / 3.0)
            + w.volume * volume_factor * if roc > 0.0 { 1.0 } else { 0.5 }
            - w.correlation * correlation_penalty;
        let downward = w.roc * roc_down
            + w.volatility * (volatility / 3.0)
            + w.volume * volume_factor * if roc < 0.0 { 1.0 } else { 0.5 }
            - w.correlation * correlation_penalty;
        let consolidation = w.roc * (1.0 - roc.abs() / 10.0)
            + w.volatility * volatility_consolidation
            + w.volume * (1.0 - volume_factor)
            + w.correlation * correlation_penalty;

        DirectionProbabilities {
            upward,
            downward,
            consolidation,
        }
    }

    fn finish(
        &self,
        symbol: &str,
        probabilities: DirectionProbabilities,
        factors: ProbabilityFactors,
    ) -> ProbabilityResult {
        let direction = probabilities.argmax();
        let confidence = probabilities.top_margin();
        ProbabilityResult {
            symbol: symbol.to_string(),
            direction,
            probabilities,
            confidence,
            is_actionable: self.is_actionable(direction, confidence),
            factors,
            market_context: None,
        }
    }

    pub fn is_actionable(&self, direction: Direction, confidence: f64) -> bool {
        confidence >= self.settings.high_confidence_threshold
            && direction != Direction::Consolidation
    }

    fn apply_market_context(&self, result: &mut ProbabilityResult, sentiment: &MarketSentiment) {
        let asset_class = AssetClass::from_symbol(&result.symbol);
        let (modifier, reasoning) = sentiment_modifier(sentiment.risk_sentiment, asset_class);
        let crisis = sentiment.volatility_indicators.regime == GlobalVolatilityRegime::Crisis;

        let mut adjusted = result.probabilities;
        if crisis {
            adjusted.consolidation += CRISIS_CONSOLIDATION_BOOST;
        }
        if modifier > 1.0 {
            adjusted.upward *= modifier;
        } else if modifier < 1.0 {
            adjusted.downward *= 2.0 - modifier;
        }
        let adjusted = adjusted.normalized();

        let adjusted_result = self.finish(&result.symbol, adjusted, result.factors);
        let adjusted_confidence = adjusted_result.confidence * sentiment.confidence;

        *result = ProbabilityResult {
            market_context: Some(MarketContext {
                sentiment: sentiment.risk_sentiment,
                asset_class,
                modifier,
                reasoning: reasoning.to_string(),
                crisis_adjusted: crisis,
                adjusted_confidence,
            }),
            ..adjusted_result
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ANALYSIS;
    use crate::models::OhlcvTimeSeries;
    use crate::test_support::{flat_series, sentiment_snapshot, trending_series};

    fn default_model() -> ProbabilityModel {
        ProbabilityModel::new(ANALYSIS.probability).unwrap()
    }

    fn roc_heavy_model() -> ProbabilityModel {
        let weights = ProbabilityWeights::new(0.7, 0.0, 0.3, 0.0).unwrap();
        ProbabilityModel::with_weights(ANALYSIS.probability, weights)
    }

    fn assert_valid_distribution(p: &DirectionProbabilities) {
        for v in p.to_array() {
            assert!(v >= 0.0 && v.is_finite(), "Bad probability {v}");
        }
        assert!((p.sum() - 1.0).abs() < 1e-6, "Sum was {}", p.sum());
    }

    fn sample_inputs() -> Vec<OhlcvTimeSeries> {
        let mut no_volume = trending_series("EURUSD=X", 40, 1.1, 0.05);
        no_volume.volumes = None;
        vec![
            trending_series("BTCUSDT", 40, 100.0, 0.25),
            trending_series("ETHUSDT", 40, 100.0, -0.4),
            trending_series("GC=F", 40, 2000.0, 1.5),
            flat_series("USDJPY=X", 40, 150.0),
            no_volume,
        ]
    }

    #[test]
    fn test_probabilities_sum_to_one_before_and_after_sentiment() {
        let model = default_model();
        let snapshots = [
            sentiment_snapshot(RiskSentiment::RiskOn, GlobalVolatilityRegime::Normal, 0.9),
            sentiment_snapshot(RiskSentiment::RiskOff, GlobalVolatilityRegime::Elevated, 0.7),
            sentiment_snapshot(RiskSentiment::Neutral, GlobalVolatilityRegime::Crisis, 0.4),
        ];
        for series in sample_inputs() {
            let slice = series.full_slice();
            for corr in [None, Some(0.0), Some(0.9)] {
                let plain = model.predict(&slice, corr, None).unwrap();
                assert_valid_distribution(&plain.probabilities);
                assert!(plain.market_context.is_none());
                for snapshot in &snapshots {
                    let adjusted = model.predict(&slice, corr, Some(snapshot)).unwrap();
                    assert_valid_distribution(&adjusted.probabilities);
                    assert!((0.0..=1.0).contains(&adjusted.confidence));
                }
            }
        }
    }

    #[test]
    fn test_steady_rise_is_upward() {
        // ~6% over the 24-bar lookback, flat volume, tight bars
        let series = trending_series("BTCUSDT", 40, 100.0, 0.2431);
        let result = roc_heavy_model().predict(&series.full_slice(), None, None).unwrap();

        assert!((result.factors.roc - 6.0).abs() < 0.01);
        assert!((result.factors.volume - 1.0).abs() < 1e-12);
        assert!(result.factors.volatility < 0.5, "Low ATR% expected");
        assert_eq!(result.direction, Direction::Upward);
        assert!(result.probabilities.upward > result.probabilities.downward);
        assert!(result.probabilities.upward > result.probabilities.consolidation);
        assert!(
            (result.confidence
                - (result.probabilities.upward - result.probabilities.consolidation))
                .abs()
                < 1e-12
        );
        assert!(!result.is_actionable, "Margin is well below 0.6");
    }

    #[test]
    fn test_strong_rally_is_actionable() {
        let weights = ProbabilityWeights::new(1.0, 0.0, 0.0, 0.0).unwrap();
        let model = ProbabilityModel::with_weights(ANALYSIS.probability, weights);
        // ~+20% over the lookback
        let series = trending_series("BTCUSDT", 40, 100.0, 0.77);
        let result = model.predict(&series.full_slice(), None, None).unwrap();
        assert_eq!(result.direction, Direction::Upward);
        assert!(result.confidence >= 0.6);
        assert!(result.is_actionable);

        let falling = trending_series("BTCUSDT", 40, 100.0, -0.9);
        let result = model.predict(&falling.full_slice(), None, None).unwrap();
        assert_eq!(result.direction, Direction::Downward);
        assert!(result.is_actionable);
    }

    #[test]
    fn test_flat_market_favours_consolidation() {
        let series = flat_series("EURUSD=X", 40, 1.1);
        let result = default_model().predict(&series.full_slice(), None, None).unwrap();
        assert_eq!(result.factors.roc, 0.0);
        assert_eq!(result.direction, Direction::Consolidation);
        assert!(!result.is_actionable, "Consolidation is never actionable");
        // roc == 0 gives identical upward and downward scores
        assert!((result.probabilities.upward - result.probabilities.downward).abs() < 1e-15);
    }

    #[test]
    fn test_insufficient_history() {
        let series = flat_series("EURUSD=X", 24, 1.1);
        assert!(default_model().predict(&series.full_slice(), None, None).is_none());
        let series = flat_series("EURUSD=X", 25, 1.1);
        assert!(default_model().predict(&series.full_slice(), None, None).is_some());
    }

    #[test]
    fn test_neutral_factor_fallbacks() {
        let mut series = flat_series("EURUSD=X", 30, 1.1);
        series.volumes = None;
        let model = default_model();
        let factors = model.factors(&series.full_slice(), None);
        assert_eq!(factors.volume, NEUTRAL_VOLUME);
        assert_eq!(factors.correlation, NEUTRAL_CORRELATION);

        // A supplied 0.0 is a real reading, not "missing"
        let factors = model.factors(&series.full_slice(), Some(0.0));
        assert_eq!(factors.correlation, 0.0);

        // ATR needs atr_period + 1 bars; ROC only lookback + 1 = 25
        let short_settings = ProbabilitySettings {
            atr_period: 40,
            ..ANALYSIS.probability
        };
        let model = ProbabilityModel::new(short_settings).unwrap();
        let factors = model.factors(&series.full_slice(), None);
        assert_eq!(factors.volatility, NEUTRAL_VOLATILITY);
    }

    #[test]
    fn test_declared_order_matches_enum_order() {
        use strum::IntoEnumIterator;
        assert_eq!(Direction::iter().collect::<Vec<_>>(), Direction::ALL.to_vec());
        assert_eq!(Direction::Consolidation.to_string(), "CONSOLIDATION");
    }

    #[test]
    fn test_argmax_tie_break_follows_declared_order() {
        let uniform = DirectionProbabilities::from_array([1.0 / 3.0; 3]);
        assert_eq!(uniform.argmax(), Direction::Upward);
        assert_eq!(uniform.top_margin(), 0.0);

        let down_cons = DirectionProbabilities::from_array([0.2, 0.4, 0.4]);
        assert_eq!(down_cons.argmax(), Direction::Downward);

        let cons = DirectionProbabilities::from_array([0.3, 0.3, 0.4]);
        assert_eq!(cons.argmax(), Direction::Consolidation);
        assert!((cons.top_margin() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_weights_normalize_by_raw_sum() {
        let w = ProbabilityWeights::new(1.0, 1.0, 1.0, 1.0).unwrap();
        assert_eq!(w.roc(), 0.25);
        assert_eq!(w.correlation(), 0.25);

        let w = ProbabilityWeights::new(2.0, 1.0, 1.0, 0.0).unwrap();
        assert_eq!(w.roc(), 0.5);
        assert_eq!(w.volume(), 0.25);

        assert!(ProbabilityWeights::new(-0.1, 0.5, 0.3, 0.3).is_err());
        assert!(ProbabilityWeights::new(0.0, 0.0, 0.0, 0.0).is_err());
        assert!(ProbabilityWeights::new(f64::NAN, 0.5, 0.3, 0.3).is_err());
        assert_eq!(ProbabilityWeights::default(), ProbabilityWeights::new(0.25, 0.25, 0.25, 0.25).unwrap());
    }

    #[test]
    fn test_sentiment_tilts_towards_favoured_direction() {
        let model = default_model();
        let btc = trending_series("BTCUSDT", 40, 100.0, 0.1);
        let slice = btc.full_slice();
        let plain = model.predict(&slice, None, None).unwrap();

        let risk_on = sentiment_snapshot(RiskSentiment::RiskOn, GlobalVolatilityRegime::Normal, 0.8);
        let boosted = model.predict(&slice, None, Some(&risk_on)).unwrap();
        assert!(boosted.probabilities.upward > plain.probabilities.upward);
        let ctx = boosted.market_context.as_ref().unwrap();
        assert_eq!(ctx.modifier, 1.1);
        assert_eq!(ctx.asset_class, AssetClass::RiskAsset);
        assert!(!ctx.crisis_adjusted);
        assert!((ctx.adjusted_confidence - boosted.confidence * 0.8).abs() < 1e-12);

        let risk_off = sentiment_snapshot(RiskSentiment::RiskOff, GlobalVolatilityRegime::Normal, 0.8);
        let pressured = model.predict(&slice, None, Some(&risk_off)).unwrap();
        assert!(pressured.probabilities.downward > plain.probabilities.downward);
        assert_eq!(pressured.market_context.as_ref().unwrap().modifier, 0.9);
    }

    #[test]
    fn test_crisis_boosts_consolidation() {
        let model = default_model();
        let gold = trending_series("GC=F", 40, 2000.0, 0.1);
        let slice = gold.full_slice();
        let plain = model.predict(&slice, None, None).unwrap();

        let crisis = sentiment_snapshot(RiskSentiment::Neutral, GlobalVolatilityRegime::Crisis, 0.4);
        let adjusted = model.predict(&slice, None, Some(&crisis)).unwrap();
        let ctx = adjusted.market_context.as_ref().unwrap();
        assert!(ctx.crisis_adjusted);
        assert_eq!(ctx.modifier, 1.0);
        let expected = (plain.probabilities.consolidation + CRISIS_CONSOLIDATION_BOOST)
            / (1.0 + CRISIS_CONSOLIDATION_BOOST);
        assert!((adjusted.probabilities.consolidation - expected).abs() < 1e-12);
    }

    #[test]
    fn test_modifier_table() {
        use crate::domain::SafeHavenKind;
        let gold = AssetClass::SafeHaven(SafeHavenKind::Gold);
        assert_eq!(sentiment_modifier(RiskSentiment::RiskOn, AssetClass::RiskAsset).0, 1.1);
        assert_eq!(sentiment_modifier(RiskSentiment::RiskOn, gold).0, 0.95);
        assert_eq!(sentiment_modifier(RiskSentiment::RiskOff, AssetClass::RiskAsset).0, 0.9);
        assert_eq!(sentiment_modifier(RiskSentiment::RiskOff, gold).0, 1.1);
        assert_eq!(sentiment_modifier(RiskSentiment::Neutral, gold).0, 1.0);
        assert_eq!(sentiment_modifier(RiskSentiment::RiskOn, AssetClass::Other).0, 1.0);
    }
}
