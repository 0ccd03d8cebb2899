//! Loading and validation of the on-disk JSON configuration

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use super::analysis::AnalysisConfig;
use super::backtest::BacktestConfig;
use super::sentiment::SentimentSettings;

/// Timeframe label attached to events when none is supplied on the command line
pub const DEFAULT_TIMEFRAME: &str = "1h";

/// Every configurable group in one place. Missing keys fall back to defaults.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub timeframe: String,
    pub analysis: AnalysisConfig,
    pub sentiment: SentimentSettings,
    pub backtest: BacktestConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            timeframe: DEFAULT_TIMEFRAME.to_string(),
            analysis: AnalysisConfig::default(),
            sentiment: SentimentSettings::default(),
            backtest: BacktestConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: AppConfig =
            serde_json::from_str(text).context("Failed to parse configuration JSON")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject threshold combinations the analysis cannot interpret.
    pub fn validate(&self) -> Result<()> {
        let corr = &self.analysis.correlation;
        if corr.lookback_hours <= 0 {
            bail!("correlation.lookback_hours must be positive");
        }
        if corr.min_data_points < 2 {
            bail!("correlation.min_data_points must be at least 2");
        }
        if !(0.0..=1.0).contains(&corr.high_correlation_threshold) {
            bail!("correlation.high_correlation_threshold must lie in [0, 1]");
        }

        let vol = &self.analysis.volatility;
        if vol.atr_period == 0 {
            bail!("volatility.atr_period must be positive");
        }
        let r = &vol.regimes;
        if !(r.low < r.normal && r.normal < r.high) {
            bail!(
                "volatility.regimes must be strictly increasing (got {} / {} / {})",
                r.low,
                r.normal,
                r.high
            );
        }

        let prob = &self.analysis.probability;
        if prob.lookback == 0 || prob.atr_period == 0 {
            bail!("probability.lookback and probability.atr_period must be positive");
        }
        if !(0.0..=1.0).contains(&prob.confidence_threshold)
            || !(0.0..=1.0).contains(&prob.high_confidence_threshold)
        {
            bail!("probability confidence thresholds must lie in [0, 1]");
        }
        if prob.confidence_threshold > prob.high_confidence_threshold {
            bail!("probability.confidence_threshold exceeds high_confidence_threshold");
        }

        let sent = &self.sentiment;
        if sent.roc_lookback == 0 || sent.atr_period == 0 {
            bail!("sentiment.roc_lookback and sentiment.atr_period must be positive");
        }
        let g = &sent.volatility;
        if !(g.low < g.elevated && g.elevated < g.crisis) {
            bail!(
                "sentiment.volatility thresholds must be strictly increasing (got {} / {} / {})",
                g.low,
                g.elevated,
                g.crisis
            );
        }

        let bt = &self.backtest;
        if bt.initial_capital <= 0.0 {
            bail!("backtest.initial_capital must be positive");
        }
        for (name, value) in [
            ("position_size_pct", bt.position_size_pct),
            ("stop_loss_pct", bt.stop_loss_pct),
            ("take_profit_pct", bt.take_profit_pct),
        ] {
            if !(value > 0.0 && value < 1.0) {
                bail!("backtest.{} must lie in (0, 1), got {}", name, value);
            }
        }
        for (name, value) in [
            ("slippage_pct", bt.slippage_pct),
            ("commission_pct", bt.commission_pct),
        ] {
            if !(0.0..1.0).contains(&value) {
                bail!("backtest.{} must lie in [0, 1), got {}", name, value);
            }
        }
        if bt.max_open_trades == 0 {
            bail!("backtest.max_open_trades must be at least 1");
        }

        Ok(())
    }
}

/// Load configuration from `path`, or the built-in defaults when no path is given.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let Some(path) = path else {
        return Ok(AppConfig::default());
    };

    let file = File::open(path).context(format!("Failed to open config file: {:?}", path))?;
    let config: AppConfig = serde_json::from_reader(BufReader::new(file))
        .context(format!("Failed to parse config file: {:?}", path))?;
    config
        .validate()
        .with_context(|| format!("Invalid configuration in {:?}", path))?;
    log::info!("Loaded configuration from {}", path.display());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(AppConfig::default().validate().is_ok());
        assert!(load_config(None).is_ok(), "No path should yield defaults");
    }

    #[test]
    fn test_partial_json_overrides_only_named_keys() {
        let json = r#"{ "timeframe": "4h", "backtest": { "max_open_trades": 5 } }"#;
        let config = AppConfig::from_json_str(json).unwrap();
        assert_eq!(config.timeframe, "4h");
        assert_eq!(config.backtest.max_open_trades, 5);
        assert_eq!(config.backtest.initial_capital, 10_000.0);
        assert_eq!(config.analysis.probability.lookback, 24);
        assert_eq!(config.sentiment.risk_assets.len(), 3);
    }

    #[test]
    fn test_rejects_unordered_regimes() {
        let json = r#"{ "analysis": { "volatility": { "regimes": { "low": 1.0, "normal": 0.5, "high": 2.0 } } } }"#;
        assert!(AppConfig::from_json_str(json).is_err());
    }

    #[test]
    fn test_rejects_inverted_confidence_thresholds() {
        let json = r#"{ "analysis": { "probability": { "confidence_threshold": 0.7, "high_confidence_threshold": 0.6 } } }"#;
        assert!(AppConfig::from_json_str(json).is_err());
    }

    #[test]
    fn test_rejects_zero_open_trades() {
        let json = r#"{ "backtest": { "max_open_trades": 0 } }"#;
        assert!(AppConfig::from_json_str(json).is_err());
    }
}
