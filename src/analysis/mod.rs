// Analysis pipeline: indicators -> correlation / volatility / sentiment -> probability -> events
pub mod analyzer;
pub mod correlation;
pub mod indicators;
pub mod probability;
pub mod sentiment;
pub mod volatility;

// Re-export commonly used types
pub use analyzer::{
    AnalysisEvent, AnalysisResult, EventData, EventType, ProbabilisticAnalyzer, SignalSource,
};
pub use correlation::{CorrelatedPair, CorrelationAnalyzer, CorrelationMatrix};
pub use probability::{
    Direction, DirectionProbabilities, MarketContext, ProbabilityModel, ProbabilityResult,
    ProbabilityWeights,
};
pub use sentiment::{MarketSentiment, MarketSentimentAggregator, RiskSentiment};
pub use volatility::{VolatilityAnalyzer, VolatilityRegime, VolatilityResult};
