//! Cross-market risk-on / risk-off classification.
//!
//! Large-cap crypto stands in for risk appetite, gold / yen / franc for
//! safe-haven demand, and the cross-market ATR% for global stress.

use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};

use crate::analysis::indicators::{atr_percent, rate_of_change};
use crate::config::SentimentSettings;
use crate::config::debug::PRINT_SENTIMENT_BREAKDOWN;
use crate::domain::{SafeHavenKind, is_crypto};
use crate::models::TimeSeriesSlice;
use crate::utils::maths_utils::mean;

// Percent moves treated as "extreme" when scaling ROC into [-1, 1]
const RISK_ROC_SCALE: f64 = 10.0;
const GOLD_ROC_SCALE: f64 = 5.0;
const FX_ROC_SCALE: f64 = 3.0;
// Crypto ATR% runs structurally hotter than forex
const CRYPTO_ATR_WEIGHT: f64 = 0.5;

// Dominant-factor cut-offs
const CRYPTO_STRENGTH_SCORE: f64 = 0.3;
const GOLD_DEMAND_ROC: f64 = 1.0;
const FX_STRENGTH_SCORE: f64 = 0.3;

const CRISIS_CONFIDENCE: f64 = 0.4;
const ELEVATED_CONFIDENCE_FACTOR: f64 = 0.85;

#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskSentiment {
    RiskOn,
    RiskOff,
    Neutral,
}

#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "snake_case")]
pub enum GlobalVolatilityRegime {
    Low,
    #[default]
    Normal,
    Elevated,
    Crisis,
}

/// ROC reading for one configured asset that had enough history.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AssetContribution {
    pub symbol: String,
    pub roc: f64,
    // Signed contribution to the group score before averaging
    pub score: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct RiskIndicators {
    pub btc_roc: f64,
    pub eth_roc: f64,
    pub crypto_avg_roc: f64,
    pub risk_score: f64,
    pub contributions: Vec<AssetContribution>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct SafeHavenIndicators {
    pub gold_roc: f64,
    pub jpy_strength: f64,
    pub chf_strength: f64,
    pub safe_haven_score: f64,
    pub contributions: Vec<AssetContribution>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct GlobalVolatilityIndicators {
    pub forex_avg_atr_pct: f64,
    pub crypto_avg_atr_pct: f64,
    pub cross_market_atr_pct: f64,
    pub volatility_expansion: bool,
    pub regime: GlobalVolatilityRegime,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct RawScores {
    pub risk_score: f64,
    pub safe_haven_score: f64,
    pub net_score: f64,
}

/// One cycle's snapshot, shared by reference with every per-symbol prediction.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MarketSentiment {
    pub timestamp: DateTime<Utc>,
    pub risk_sentiment: RiskSentiment,
    pub risk_indicators: RiskIndicators,
    pub safe_haven_indicators: SafeHavenIndicators,
    pub volatility_indicators: GlobalVolatilityIndicators,
    pub confidence: f64,
    pub dominant_factor: String,
    pub summary: String,
    pub raw_scores: RawScores,
}

#[derive(Debug, Clone, Default)]
pub struct MarketSentimentAggregator {
    settings: SentimentSettings,
}

// Empty groups read as 0.0
fn average(values: &[f64]) -> f64 {
    mean(values).unwrap_or(0.0)
}

impl MarketSentimentAggregator {
    pub fn new(settings: SentimentSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &SentimentSettings {
        &self.settings
    }

    pub fn aggregate(&self, series: &[TimeSeriesSlice<'_>]) -> MarketSentiment {
        self.aggregate_at(series, Utc::now())
    }

    /// Same as `aggregate`, stamped with an explicit time (backtests, tests).
    pub fn aggregate_at(
        &self,
        series: &[TimeSeriesSlice<'_>],
        timestamp: DateTime<Utc>,
    ) -> MarketSentiment {
        let risk = self.risk_indicators(series);
        let safe_haven = self.safe_haven_indicators(series);
        let volatility = self.volatility_indicators(series);

        let (risk_sentiment, confidence, dominant_factor) =
            self.classify_sentiment(&risk, &safe_haven, &volatility);
        let summary = Self::summary(risk_sentiment, &risk, &safe_haven, &volatility);

        if PRINT_SENTIMENT_BREAKDOWN {
            log::info!(
                "Sentiment {} ({:.2}) risk={:?} safe_haven={:?} vol={:?}",
                risk_sentiment,
                confidence,
                risk.contributions,
                safe_haven.contributions,
                volatility
            );
        }

        let raw_scores = RawScores {
            risk_score: risk.risk_score,
            safe_haven_score: safe_haven.safe_haven_score,
            net_score: risk.risk_score - safe_haven.safe_haven_score,
        };

        MarketSentiment {
            timestamp,
            risk_sentiment,
            risk_indicators: risk,
            safe_haven_indicators: safe_haven,
            volatility_indicators: volatility,
            confidence,
            dominant_factor,
            summary,
            raw_scores,
        }
    }

    fn find<'s, 'a>(
        series: &'s [TimeSeriesSlice<'a>],
        symbol: &str,
    ) -> Option<&'s TimeSeriesSlice<'a>> {
        series.iter().find(|s| s.symbol() == symbol)
    }

    fn roc_for(&self, series: &[TimeSeriesSlice<'_>], symbol: &str) -> Option<f64> {
        let slice = Self::find(series, symbol)?;
        rate_of_change(slice.close_prices(), self.settings.roc_lookback)
    }

    pub fn risk_indicators(&self, series: &[TimeSeriesSlice<'_>]) -> RiskIndicators {
        let mut indicators = RiskIndicators::default();

        for symbol in &self.settings.risk_assets {
            let Some(roc) = self.roc_for(series, symbol) else {
                continue;
            };
            if symbol.contains("BTC") {
                indicators.btc_roc = roc;
            } else if symbol.contains("ETH") {
                indicators.eth_roc = roc;
            }
            indicators.contributions.push(AssetContribution {
                symbol: symbol.clone(),
                roc,
                score: roc / RISK_ROC_SCALE,
            });
        }

        let rocs: Vec<f64> = indicators.contributions.iter().map(|c| c.roc).collect();
        indicators.crypto_avg_roc = average(&rocs);
        indicators.risk_score = (indicators.crypto_avg_roc / RISK_ROC_SCALE).clamp(-1.0, 1.0);
        indicators
    }

    pub fn safe_haven_indicators(&self, series: &[TimeSeriesSlice<'_>]) -> SafeHavenIndicators {
        let mut indicators = SafeHavenIndicators::default();

        for symbol in &self.settings.safe_haven_assets {
            let Some(roc) = self.roc_for(series, symbol) else {
                continue;
            };
            // USD/JPY and USD/CHF fall when the haven currency strengthens
            let score = match SafeHavenKind::from_symbol(symbol) {
                Some(SafeHavenKind::Gold) => {
                    indicators.gold_roc = roc;
                    roc / GOLD_ROC_SCALE
                }
                Some(SafeHavenKind::Yen) => {
                    indicators.jpy_strength = -roc / FX_ROC_SCALE;
                    indicators.jpy_strength
                }
                Some(SafeHavenKind::Franc) => {
                    indicators.chf_strength = -roc / FX_ROC_SCALE;
                    indicators.chf_strength
                }
                None => {
                    log::debug!("{} is not a recognised safe-haven proxy", symbol);
                    continue;
                }
            };
            indicators.contributions.push(AssetContribution {
                symbol: symbol.clone(),
                roc,
                score,
            });
        }

        let scores: Vec<f64> = indicators.contributions.iter().map(|c| c.score).collect();
        indicators.safe_haven_score = average(&scores).clamp(-1.0, 1.0);
        indicators
    }

    pub fn volatility_indicators(
        &self,
        series: &[TimeSeriesSlice<'_>],
    ) -> GlobalVolatilityIndicators {
        let mut forex_atrs: Vec<f64> = Vec::new();
        let mut crypto_atrs: Vec<f64> = Vec::new();

        for slice in series {
            let Some(atr_pct) = atr_percent(
                slice.high_prices(),
                slice.low_prices(),
                slice.close_prices(),
                self.settings.atr_period,
            ) else {
                continue;
            };
            if is_crypto(slice.symbol()) {
                crypto_atrs.push(atr_pct);
            } else {
                forex_atrs.push(atr_pct);
            }
        }

        let cross_market: Vec<f64> = forex_atrs
            .iter()
            .copied()
            .chain(crypto_atrs.iter().map(|a| a * CRYPTO_ATR_WEIGHT))
            .collect();
        let cross_market_atr_pct = average(&cross_market);

        GlobalVolatilityIndicators {
            forex_avg_atr_pct: average(&forex_atrs),
            crypto_avg_atr_pct: average(&crypto_atrs),
            cross_market_atr_pct,
            volatility_expansion: cross_market_atr_pct > self.settings.volatility.elevated,
            regime: self.classify_volatility_regime(cross_market_atr_pct),
        }
    }

    pub fn classify_volatility_regime(&self, atr_pct: f64) -> GlobalVolatilityRegime {
        let t = &self.settings.volatility;
        if atr_pct < t.low {
            GlobalVolatilityRegime::Low
        } else if atr_pct < t.elevated {
            GlobalVolatilityRegime::Normal
        } else if atr_pct < t.crisis {
            GlobalVolatilityRegime::Elevated
        } else {
            GlobalVolatilityRegime::Crisis
        }
    }

    /// Returns (sentiment, confidence, dominant factor tag).
    /// A CRISIS volatility regime overrides every other reading.
    pub fn classify_sentiment(
        &self,
        risk: &RiskIndicators,
        safe_haven: &SafeHavenIndicators,
        volatility: &GlobalVolatilityIndicators,
    ) -> (RiskSentiment, f64, String) {
        if volatility.regime == GlobalVolatilityRegime::Crisis {
            log::debug!(
                "Crisis volatility override: {:.2}%",
                volatility.cross_market_atr_pct
            );
            return (
                RiskSentiment::Neutral,
                CRISIS_CONFIDENCE,
                "crisis_volatility".to_string(),
            );
        }

        let net_score = risk.risk_score - safe_haven.safe_haven_score;
        let haven = safe_haven.safe_haven_score;

        let (sentiment, mut confidence, mut factor) = if net_score > self.settings.risk_threshold
        {
            let factor = if risk.risk_score > CRYPTO_STRENGTH_SCORE {
                "crypto_strength"
            } else {
                "risk_appetite"
            };
            (
                RiskSentiment::RiskOn,
                (0.5 + net_score.abs()).min(1.0),
                factor.to_string(),
            )
        } else if net_score < -self.settings.safe_haven_threshold
            || haven > self.settings.safe_haven_threshold
        {
            let factor = if safe_haven.gold_roc > GOLD_DEMAND_ROC {
                "gold_demand"
            } else if safe_haven.jpy_strength > FX_STRENGTH_SCORE {
                "jpy_strength"
            } else if safe_haven.chf_strength > FX_STRENGTH_SCORE {
                "chf_strength"
            } else {
                "safe_haven_demand"
            };
            (
                RiskSentiment::RiskOff,
                (0.5 + net_score.abs().max(haven)).min(1.0),
                factor.to_string(),
            )
        } else {
            (
                RiskSentiment::Neutral,
                0.5 - net_score.abs(),
                "balanced_market".to_string(),
            )
        };

        if volatility.regime == GlobalVolatilityRegime::Elevated {
            confidence *= ELEVATED_CONFIDENCE_FACTOR;
            factor.push_str("_elevated_vol");
        }

        log::debug!(
            "Sentiment classification: {}, net_score={:.3}, confidence={:.2}, factor={}",
            sentiment,
            net_score,
            confidence,
            factor
        );

        (sentiment, confidence.clamp(0.0, 1.0), factor)
    }

    fn summary(
        sentiment: RiskSentiment,
        risk: &RiskIndicators,
        safe_haven: &SafeHavenIndicators,
        volatility: &GlobalVolatilityIndicators,
    ) -> String {
        let largest = |contributions: &[AssetContribution]| {
            contributions
                .iter()
                .filter(|c| c.roc != 0.0)
                .max_by(|a, b| a.score.abs().total_cmp(&b.score.abs()))
                .map(|c| format!("{} {:+.1}%", c.symbol, c.roc))
        };

        let mut parts: Vec<String> = Vec::new();
        match sentiment {
            RiskSentiment::RiskOn => {
                parts.push("Risk-on sentiment".to_string());
                parts.extend(largest(&risk.contributions));
            }
            RiskSentiment::RiskOff => {
                parts.push("Risk-off sentiment".to_string());
                parts.extend(largest(&safe_haven.contributions));
            }
            RiskSentiment::Neutral => parts.push("Neutral sentiment".to_string()),
        }
        if volatility.regime != GlobalVolatilityRegime::Normal {
            parts.push(format!("vol={}", volatility.regime));
        }
        parts.iter().join(" | ")
    }
}
