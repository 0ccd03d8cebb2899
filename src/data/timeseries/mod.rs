pub mod cache_file;

use std::collections::BTreeSet;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::models::{OhlcvTimeSeries, TimeSeriesSlice, find_matching_ohlcv};
use crate::utils::TimeUtils;

#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct TimeSeriesCollection {
    pub name: String, // Metadata e.g. "Yahoo + Binance hourly"
    #[serde(default)]
    pub version: f64,
    pub series_data: Vec<OhlcvTimeSeries>,
}

impl TimeSeriesCollection {
    pub fn new(name: impl Into<String>, series_data: Vec<OhlcvTimeSeries>) -> Self {
        Self {
            name: name.into(),
            version: 1.0,
            series_data,
        }
    }

    pub fn unique_symbols(&self) -> Vec<String> {
        // BTreeSet maintains sorted order and ensures uniqueness
        self.series_data
            .iter()
            .map(|ts| ts.symbol.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn find(&self, symbol: &str) -> Result<&OhlcvTimeSeries> {
        find_matching_ohlcv(&self.series_data, symbol)
    }

    pub fn validate(&self) -> Result<()> {
        self.series_data.iter().try_for_each(|s| s.validate())
    }

    pub fn is_empty(&self) -> bool {
        self.series_data.is_empty()
    }

    /// Bar spacing of the first series long enough to measure.
    pub fn interval_ms(&self) -> Option<i64> {
        self.series_data
            .iter()
            .find_map(|s| TimeUtils::infer_interval_ms(&s.timestamps_ms))
    }

    /// Full views of every series.
    pub fn slices(&self) -> Vec<TimeSeriesSlice<'_>> {
        self.series_data.iter().map(|s| s.full_slice()).collect()
    }

    /// Every series truncated to bars stamped <= `timestamp_ms`. Series with no
    /// bars that early are left out.
    pub fn slices_up_to(&self, timestamp_ms: i64) -> Vec<TimeSeriesSlice<'_>> {
        self.series_data
            .iter()
            .map(|s| s.up_to(timestamp_ms))
            .filter(|slice| !slice.is_empty())
            .collect()
    }

    /// Timestamps present in every non-empty series, ascending.
    pub fn common_timestamps(&self) -> Vec<i64> {
        let non_empty: Vec<&OhlcvTimeSeries> =
            self.series_data.iter().filter(|s| !s.is_empty()).collect();
        let Some((first, rest)) = non_empty.split_first() else {
            return Vec::new();
        };
        let mut common: BTreeSet<i64> = first.timestamps_ms.iter().copied().collect();
        for series in rest {
            let ts: BTreeSet<i64> = series.timestamps_ms.iter().copied().collect();
            common = common.intersection(&ts).copied().collect();
        }
        common.into_iter().collect()
    }
}
