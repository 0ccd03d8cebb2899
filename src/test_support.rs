//! Synthetic series builders shared by the unit tests.

use crate::analysis::sentiment::{
    GlobalVolatilityIndicators, GlobalVolatilityRegime, MarketSentiment, RawScores,
    RiskIndicators, RiskSentiment, SafeHavenIndicators,
};
use crate::models::OhlcvTimeSeries;
use crate::utils::{TimeUtils, epoch_ms_to_datetime};

/// 2024-01-01T00:00:00Z
pub const BASE_TS_MS: i64 = 1_704_067_200_000;

pub fn hourly_timestamps(n: usize) -> Vec<i64> {
    (0..n as i64)
        .map(|i| BASE_TS_MS + i * TimeUtils::MS_IN_H)
        .collect()
}

/// Zero-variance bars: open = high = low = close.
pub fn flat_series(symbol: &str, n: usize, price: f64) -> OhlcvTimeSeries {
    OhlcvTimeSeries {
        symbol: symbol.to_string(),
        timestamps_ms: hourly_timestamps(n),
        open_prices: vec![price; n],
        high_prices: vec![price; n],
        low_prices: vec![price; n],
        close_prices: vec![price; n],
        volumes: Some(vec![1_000.0; n]),
    }
}

/// Geometric trend of `pct_per_bar` percent per bar with a tight 0.1% bar range.
pub fn trending_series(symbol: &str, n: usize, start: f64, pct_per_bar: f64) -> OhlcvTimeSeries {
    let closes: Vec<f64> = (0..n)
        .map(|i| start * (1.0 + pct_per_bar / 100.0).powi(i as i32))
        .collect();
    series_from_closes(symbol, &closes)
}

/// Bars built around the given closes, each spanning +/-0.05% of its close.
pub fn series_from_closes(symbol: &str, closes: &[f64]) -> OhlcvTimeSeries {
    let n = closes.len();
    let opens: Vec<f64> = (0..n)
        .map(|i| if i == 0 { closes[0] } else { closes[i - 1] })
        .collect();
    OhlcvTimeSeries {
        symbol: symbol.to_string(),
        timestamps_ms: hourly_timestamps(n),
        open_prices: opens,
        high_prices: closes.iter().map(|c| c * 1.0005).collect(),
        low_prices: closes.iter().map(|c| c * 0.9995).collect(),
        close_prices: closes.to_vec(),
        volumes: Some(vec![1_000.0; n]),
    }
}

/// Fully scripted (high, low, close) bars; open is the previous close.
pub fn series_from_bars(symbol: &str, bars: &[(f64, f64, f64)]) -> OhlcvTimeSeries {
    let n = bars.len();
    OhlcvTimeSeries {
        symbol: symbol.to_string(),
        timestamps_ms: hourly_timestamps(n),
        open_prices: (0..n)
            .map(|i| if i == 0 { bars[0].2 } else { bars[i - 1].2 })
            .collect(),
        high_prices: bars.iter().map(|b| b.0).collect(),
        low_prices: bars.iter().map(|b| b.1).collect(),
        close_prices: bars.iter().map(|b| b.2).collect(),
        volumes: Some(vec![1_000.0; n]),
    }
}

/// Hand-built sentiment snapshot with empty indicator groups.
pub fn sentiment_snapshot(
    risk_sentiment: RiskSentiment,
    regime: GlobalVolatilityRegime,
    confidence: f64,
) -> MarketSentiment {
    MarketSentiment {
        timestamp: epoch_ms_to_datetime(BASE_TS_MS),
        risk_sentiment,
        risk_indicators: RiskIndicators::default(),
        safe_haven_indicators: SafeHavenIndicators::default(),
        volatility_indicators: GlobalVolatilityIndicators {
            regime,
            ..Default::default()
        },
        confidence,
        dominant_factor: "scripted".to_string(),
        summary: String::new(),
        raw_scores: RawScores::default(),
    }
}
