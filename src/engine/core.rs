use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::{
    AnalysisEvent, AnalysisResult, CorrelationMatrix, MarketSentiment, MarketSentimentAggregator,
    ProbabilisticAnalyzer, SignalSource,
};
use crate::config::AppConfig;
use crate::data::timeseries::TimeSeriesCollection;

/// Everything one polling cycle produced.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub timestamp: DateTime<Utc>,
    pub timeframe: String,
    pub market_sentiment: Option<MarketSentiment>,
    pub correlation: CorrelationMatrix,
    pub results: BTreeMap<String, AnalysisResult>,
    pub actionable_signals: Vec<AnalysisEvent>,
    pub high_importance_events: Vec<AnalysisEvent>,
}

pub struct SignalEngine {
    /// Shared immutable data
    pub timeseries: Arc<TimeSeriesCollection>,

    /// Owns the correlation matrix between cycles
    analyzer: ProbabilisticAnalyzer,

    sentiment: MarketSentimentAggregator,

    timeframe: String,

    last_report: Option<CycleReport>,
}

impl SignalEngine {
    pub fn new(timeseries: TimeSeriesCollection, config: &AppConfig) -> Result<Self> {
        Ok(Self {
            timeseries: Arc::new(timeseries),
            analyzer: ProbabilisticAnalyzer::new(&config.analysis)?,
            sentiment: MarketSentimentAggregator::new(config.sentiment.clone()),
            timeframe: config.timeframe.clone(),
            last_report: None,
        })
    }

    pub fn run_cycle(&mut self) -> &CycleReport {
        self.run_cycle_at(Utc::now())
    }

    /// Sentiment (when enabled), then correlations, then every symbol against
    /// the same sentiment snapshot.
    pub fn run_cycle_at(&mut self, timestamp: DateTime<Utc>) -> &CycleReport {
        let timeseries = Arc::clone(&self.timeseries);
        let slices = timeseries.slices();

        let market_sentiment = self
            .sentiment
            .settings()
            .enabled
            .then(|| self.sentiment.aggregate_at(&slices, timestamp));
        if let Some(sentiment) = &market_sentiment {
            log::info!("Market sentiment: {}", sentiment.summary);
        }

        let correlation = self.analyzer.update_correlations(&slices).clone();
        if correlation.is_empty() {
            log::debug!("Correlation matrix unavailable this cycle");
        }

        let results = self.analyzer.analyze_batch_at(
            &slices,
            &self.timeframe,
            market_sentiment.as_ref(),
            timestamp,
        );
        let actionable_signals: Vec<AnalysisEvent> =
            ProbabilisticAnalyzer::get_actionable_signals(&results)
                .into_iter()
                .cloned()
                .collect();
        let high_importance_events: Vec<AnalysisEvent> =
            ProbabilisticAnalyzer::get_high_importance_events(&results)
                .into_iter()
                .cloned()
                .collect();

        log::info!(
            "Cycle complete: {} symbols, {} actionable, {} high-importance",
            results.len(),
            actionable_signals.len(),
            high_importance_events.len()
        );

        self.last_report.insert(CycleReport {
            timestamp,
            timeframe: self.timeframe.clone(),
            market_sentiment,
            correlation,
            results,
            actionable_signals,
            high_importance_events,
        })
    }

    pub fn last_report(&self) -> Option<&CycleReport> {
        self.last_report.as_ref()
    }

    pub fn analyzer(&self) -> &ProbabilisticAnalyzer {
        &self.analyzer
    }

    pub fn get_all_symbols(&self) -> Vec<String> {
        self.timeseries.unique_symbols()
    }

    pub fn get_symbol_count(&self) -> usize {
        self.timeseries.series_data.len()
    }
}
