use std::collections::BTreeMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::analysis::correlation::{CorrelationAnalyzer, CorrelationMatrix};
use crate::analysis::probability::{
    Direction, DirectionProbabilities, ProbabilityFactors, ProbabilityModel, ProbabilityResult,
};
use crate::analysis::sentiment::{MarketSentiment, RiskSentiment};
use crate::analysis::volatility::{VolatilityAnalyzer, VolatilityRegime, VolatilityResult};
use crate::config::AnalysisConfig;
use crate::config::debug::PRINT_SIGNAL_EVENTS;
use crate::models::TimeSeriesSlice;
use crate::utils::maths_utils::round_to;

/// Importance assigned to routine events.
pub const IMPORTANCE_NORMAL: u8 = 1;
/// Importance assigned to high-confidence signals and extreme volatility.
pub const IMPORTANCE_HIGH: u8 = 2;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    ProbabilitySignal,
    VolatilityAlert,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ProbabilitySignalData {
    pub direction: Direction,
    pub probabilities: DirectionProbabilities,
    pub confidence: f64,
    pub is_actionable: bool,
    pub factors: ProbabilityFactors,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_sentiment: Option<RiskSentiment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_modifier: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_reasoning: Option<String>,
}

impl ProbabilitySignalData {
    fn from_result(result: &ProbabilityResult) -> Self {
        let context = result.market_context.as_ref();
        Self {
            direction: result.direction,
            probabilities: DirectionProbabilities::from_array(
                result.probabilities.to_array().map(|p| round_to(p, 4)),
            ),
            confidence: round_to(result.confidence, 4),
            is_actionable: result.is_actionable,
            factors: result.factors,
            market_sentiment: context.map(|c| c.sentiment),
            market_modifier: context.map(|c| c.modifier),
            market_reasoning: context.map(|c| c.reasoning.clone()),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct VolatilityAlertData {
    pub regime: VolatilityRegime,
    pub atr: f64,
    pub atr_percent: f64,
    pub current_price: f64,
    pub is_consolidation: bool,
    pub volatility_score: f64,
}

impl VolatilityAlertData {
    fn from_result(result: &VolatilityResult) -> Self {
        Self {
            regime: result.regime,
            atr: round_to(result.atr, 6),
            atr_percent: round_to(result.atr_percent, 4),
            current_price: round_to(result.current_price, 6),
            is_consolidation: result.is_consolidation,
            volatility_score: round_to(result.volatility_score, 4),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum EventData {
    Probability(ProbabilitySignalData),
    Volatility(VolatilityAlertData),
}

/// Emitted once, never mutated.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AnalysisEvent {
    pub event_type: EventType,
    pub symbol: String,
    pub timeframe: String,
    pub timestamp: DateTime<Utc>,
    pub importance: u8,
    pub data: EventData,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    pub symbol: String,
    pub timeframe: String,
    pub timestamp: DateTime<Utc>,
    pub probability: Option<ProbabilityResult>,
    pub volatility: Option<VolatilityResult>,
    pub events: Vec<AnalysisEvent>,
    // Label of the shared snapshot; the full snapshot is reported once per cycle
    pub market_sentiment: Option<RiskSentiment>,
}

impl AnalysisResult {
    /// Direction of an actionable forecast, if there is one.
    pub fn actionable_direction(&self) -> Option<Direction> {
        self.probability
            .as_ref()
            .filter(|p| p.is_actionable)
            .map(|p| p.direction)
    }
}

/// Anything that can turn one cycle's worth of series into per-symbol results.
/// The backtest drives its simulation through this.
pub trait SignalSource {
    /// Called once per cycle before `analyze_batch_at`.
    fn update_correlations(&mut self, series: &[TimeSeriesSlice<'_>]);

    fn analyze_batch_at(
        &self,
        series: &[TimeSeriesSlice<'_>],
        timeframe: &str,
        sentiment: Option<&MarketSentiment>,
        timestamp: DateTime<Utc>,
    ) -> BTreeMap<String, AnalysisResult>;
}

/// Combines volatility and probability per symbol and decides which events fire.
///
/// Owns the correlation matrix: call `update_correlations` once per cycle
/// (single writer) before analyzing.
#[derive(Debug, Clone)]
pub struct ProbabilisticAnalyzer {
    config: AnalysisConfig,
    correlation: CorrelationAnalyzer,
    volatility: VolatilityAnalyzer,
    probability: ProbabilityModel,
}

impl ProbabilisticAnalyzer {
    pub fn new(config: &AnalysisConfig) -> Result<Self> {
        Ok(Self {
            config: *config,
            correlation: CorrelationAnalyzer::new(config.correlation),
            volatility: VolatilityAnalyzer::new(config.volatility),
            probability: ProbabilityModel::new(config.probability)?,
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn correlation_analyzer(&self) -> &CorrelationAnalyzer {
        &self.correlation
    }

    pub fn volatility_analyzer(&self) -> &VolatilityAnalyzer {
        &self.volatility
    }

    pub fn probability_model(&self) -> &ProbabilityModel {
        &self.probability
    }

    /// Rebuild the held correlation matrix from this cycle's data.
    pub fn update_correlations(&mut self, series: &[TimeSeriesSlice<'_>]) -> &CorrelationMatrix {
        self.correlation.rebuild(series)
    }

    pub fn analyze(
        &self,
        series: &TimeSeriesSlice<'_>,
        timeframe: &str,
        sentiment: Option<&MarketSentiment>,
    ) -> AnalysisResult {
        self.analyze_at(series, timeframe, sentiment, Utc::now())
    }

    pub fn analyze_at(
        &self,
        series: &TimeSeriesSlice<'_>,
        timeframe: &str,
        sentiment: Option<&MarketSentiment>,
        timestamp: DateTime<Utc>,
    ) -> AnalysisResult {
        let symbol = series.symbol();
        let volatility = self.volatility.analyze(series);
        let avg_correlation = self.correlation.get_average_correlation(symbol);
        let probability = self.probability.predict(series, avg_correlation, sentiment);

        let mut events = Vec::new();
        if let Some(result) = &probability {
            events.extend(self.probability_event(result, timeframe, timestamp));
        }
        if let Some(result) = &volatility {
            events.extend(Self::volatility_event(result, timeframe, timestamp));
        }

        if PRINT_SIGNAL_EVENTS {
            for event in &events {
                log::info!(
                    "[{}] {} importance={} {:?}",
                    event.symbol,
                    event.event_type,
                    event.importance,
                    event.data
                );
            }
        }

        AnalysisResult {
            symbol: symbol.to_string(),
            timeframe: timeframe.to_string(),
            timestamp,
            probability,
            volatility,
            events,
            market_sentiment: sentiment.map(|s| s.risk_sentiment),
        }
    }

    pub fn analyze_batch(
        &self,
        series: &[TimeSeriesSlice<'_>],
        timeframe: &str,
        sentiment: Option<&MarketSentiment>,
    ) -> BTreeMap<String, AnalysisResult> {
        self.analyze_batch_at(series, timeframe, sentiment, Utc::now())
    }

    fn probability_event(
        &self,
        result: &ProbabilityResult,
        timeframe: &str,
        timestamp: DateTime<Utc>,
    ) -> Option<AnalysisEvent> {
        let settings = self.probability.settings();
        if result.confidence < settings.confidence_threshold {
            return None;
        }
        let importance = if result.confidence >= settings.high_confidence_threshold {
            IMPORTANCE_HIGH
        } else {
            IMPORTANCE_NORMAL
        };
        log::debug!(
            "Probability signal for {}: {} (conf={:.2}%)",
            result.symbol,
            result.direction,
            result.confidence * 100.0
        );
        Some(AnalysisEvent {
            event_type: EventType::ProbabilitySignal,
            symbol: result.symbol.clone(),
            timeframe: timeframe.to_string(),
            timestamp,
            importance,
            data: EventData::Probability(ProbabilitySignalData::from_result(result)),
        })
    }

    fn volatility_event(
        result: &VolatilityResult,
        timeframe: &str,
        timestamp: DateTime<Utc>,
    ) -> Option<AnalysisEvent> {
        if !result.regime.is_elevated() {
            return None;
        }
        let importance = if result.regime == VolatilityRegime::Extreme {
            IMPORTANCE_HIGH
        } else {
            IMPORTANCE_NORMAL
        };
        log::debug!(
            "Volatility alert for {}: {} (ATR%={:.2}%)",
            result.symbol,
            result.regime,
            result.atr_percent
        );
        Some(AnalysisEvent {
            event_type: EventType::VolatilityAlert,
            symbol: result.symbol.clone(),
            timeframe: timeframe.to_string(),
            timestamp,
            importance,
            data: EventData::Volatility(VolatilityAlertData::from_result(result)),
        })
    }

    /// Probability events of every result whose forecast is actionable.
    pub fn get_actionable_signals(
        results: &BTreeMap<String, AnalysisResult>,
    ) -> Vec<&AnalysisEvent> {
        results
            .values()
            .filter(|r| r.actionable_direction().is_some())
            .flat_map(|r| r.events.iter())
            .filter(|e| e.event_type == EventType::ProbabilitySignal)
            .collect()
    }

    pub fn get_high_importance_events(
        results: &BTreeMap<String, AnalysisResult>,
    ) -> Vec<&AnalysisEvent> {
        results
            .values()
            .flat_map(|r| r.events.iter())
            .filter(|e| e.importance >= IMPORTANCE_HIGH)
            .collect()
    }
}

impl SignalSource for ProbabilisticAnalyzer {
    fn update_correlations(&mut self, series: &[TimeSeriesSlice<'_>]) {
        self.correlation.rebuild(series);
    }

    /// Symbols are analyzed independently, so the batch runs in parallel.
    fn analyze_batch_at(
        &self,
        series: &[TimeSeriesSlice<'_>],
        timeframe: &str,
        sentiment: Option<&MarketSentiment>,
        timestamp: DateTime<Utc>,
    ) -> BTreeMap<String, AnalysisResult> {
        series
            .par_iter()
            .map(|slice| {
                (
                    slice.symbol().to_string(),
                    self.analyze_at(slice, timeframe, sentiment, timestamp),
                )
            })
            .collect()
    }
}
