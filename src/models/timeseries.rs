use anyhow::{Result, anyhow, bail};
use serde::{Deserialize, Serialize};

use crate::domain::candle::Candle;

// ============================================================================
// OhlcvTimeSeries: Raw time series data for one symbol
// ============================================================================

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct OhlcvTimeSeries {
    pub symbol: String,
    // Strictly increasing, UTC epoch milliseconds
    pub timestamps_ms: Vec<i64>,

    // Prices
    pub open_prices: Vec<f64>,
    pub high_prices: Vec<f64>,
    pub low_prices: Vec<f64>,
    pub close_prices: Vec<f64>,

    // Volumes (absent for quote-only feeds such as forex)
    #[serde(default)]
    pub volumes: Option<Vec<f64>>,
}

pub fn find_matching_ohlcv<'a>(
    timeseries_data: &'a [OhlcvTimeSeries],
    symbol: &str,
) -> Result<&'a OhlcvTimeSeries> {
    timeseries_data
        .iter()
        .find(|ohlcv| ohlcv.symbol == symbol)
        .ok_or_else(|| anyhow!("No matching OHLCV data found for symbol {}", symbol))
}

impl OhlcvTimeSeries {
    pub fn new(
        symbol: impl Into<String>,
        timestamps_ms: Vec<i64>,
        open_prices: Vec<f64>,
        high_prices: Vec<f64>,
        low_prices: Vec<f64>,
        close_prices: Vec<f64>,
        volumes: Option<Vec<f64>>,
    ) -> Result<Self> {
        let series = Self {
            symbol: symbol.into(),
            timestamps_ms,
            open_prices,
            high_prices,
            low_prices,
            close_prices,
            volumes,
        };
        series.validate()?;
        Ok(series)
    }

    /// Column lengths must agree and timestamps must be strictly increasing.
    pub fn validate(&self) -> Result<()> {
        let n = self.timestamps_ms.len();
        let columns = [
            ("open", self.open_prices.len()),
            ("high", self.high_prices.len()),
            ("low", self.low_prices.len()),
            ("close", self.close_prices.len()),
        ];
        for (name, len) in columns {
            if len != n {
                bail!(
                    "{}: {} column has {} rows, expected {}",
                    self.symbol,
                    name,
                    len,
                    n
                );
            }
        }
        if let Some(volumes) = &self.volumes {
            if volumes.len() != n {
                bail!(
                    "{}: volume column has {} rows, expected {}",
                    self.symbol,
                    volumes.len(),
                    n
                );
            }
        }
        if let Some(pos) = self.timestamps_ms.windows(2).position(|w| w[1] <= w[0]) {
            bail!(
                "{}: timestamps not strictly increasing at index {}",
                self.symbol,
                pos + 1
            );
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.timestamps_ms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps_ms.is_empty()
    }

    /// View over the whole series.
    pub fn full_slice(&self) -> TimeSeriesSlice<'_> {
        TimeSeriesSlice {
            series_data: self,
            end: self.len(),
        }
    }

    /// View over every bar with timestamp <= `timestamp_ms`.
    pub fn up_to(&self, timestamp_ms: i64) -> TimeSeriesSlice<'_> {
        TimeSeriesSlice {
            series_data: self,
            end: self.timestamps_ms.partition_point(|&ts| ts <= timestamp_ms),
        }
    }

    pub fn get_candle(&self, idx: usize) -> Option<Candle> {
        if idx >= self.len() {
            return None;
        }
        Some(Candle::new(
            self.timestamps_ms[idx],
            self.open_prices[idx],
            self.high_prices[idx],
            self.low_prices[idx],
            self.close_prices[idx],
            self.volumes.as_ref().map(|v| v[idx]),
        ))
    }

    pub fn last_close(&self) -> Option<f64> {
        self.close_prices.last().copied()
    }
}

// ============================================================================
// TimeSeriesSlice: Prefix view into OhlcvTimeSeries ("data known as of bar t")
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct TimeSeriesSlice<'a> {
    pub series_data: &'a OhlcvTimeSeries,
    end: usize, // exclusive
}

impl<'a> TimeSeriesSlice<'a> {
    pub fn symbol(&self) -> &'a str {
        &self.series_data.symbol
    }

    pub fn len(&self) -> usize {
        self.end
    }

    pub fn is_empty(&self) -> bool {
        self.end == 0
    }

    pub fn timestamps(&self) -> &'a [i64] {
        &self.series_data.timestamps_ms[..self.end]
    }

    pub fn high_prices(&self) -> &'a [f64] {
        &self.series_data.high_prices[..self.end]
    }

    pub fn low_prices(&self) -> &'a [f64] {
        &self.series_data.low_prices[..self.end]
    }

    pub fn close_prices(&self) -> &'a [f64] {
        &self.series_data.close_prices[..self.end]
    }

    pub fn volumes(&self) -> Option<&'a [f64]> {
        self.series_data.volumes.as_ref().map(|v| &v[..self.end])
    }

    pub fn last_close(&self) -> Option<f64> {
        self.close_prices().last().copied()
    }

    pub fn last_timestamp_ms(&self) -> Option<i64> {
        self.timestamps().last().copied()
    }

    pub fn last_candle(&self) -> Option<Candle> {
        self.end
            .checked_sub(1)
            .and_then(|idx| self.series_data.get_candle(idx))
    }
}
