use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::analysis::indicators::log_returns;
use crate::config::CorrelationSettings;
use crate::config::debug::PRINT_CORRELATION_MATRIX;
use crate::models::TimeSeriesSlice;
use crate::utils::TimeUtils;
use crate::utils::maths_utils::pearson;

/// One partner in a correlation query.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CorrelatedPair {
    pub symbol1: String,
    pub symbol2: String,
    pub correlation: f64,
    // Aligned return observations behind the coefficient
    pub data_points: usize,
}

/// Symmetric symbol x symbol matrix of Pearson coefficients on log-returns.
/// Built wholesale; an empty matrix means "not enough data".
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct CorrelationMatrix {
    pub symbols: Vec<String>,
    pub values: Vec<Vec<f64>>,
    pub sample_size: usize,
}

impl CorrelationMatrix {
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    fn index_of(&self, symbol: &str) -> Option<usize> {
        self.symbols.iter().position(|s| s == symbol)
    }

    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.index_of(a)?;
        let j = self.index_of(b)?;
        Some(self.values[i][j])
    }

    /// Mean |corr| against every other symbol. `None` if the symbol is absent
    /// or has no partners.
    pub fn average_abs(&self, symbol: &str) -> Option<f64> {
        let i = self.index_of(symbol)?;
        let others: Vec<f64> = (0..self.symbols.len())
            .filter(|&j| j != i)
            .map(|j| self.values[i][j].abs())
            .collect();
        if others.is_empty() {
            return None;
        }
        Some(others.iter().sum::<f64>() / others.len() as f64)
    }

    /// Partners with |corr| >= threshold, strongest first.
    pub fn correlated_pairs(&self, symbol: &str, threshold: f64) -> Vec<CorrelatedPair> {
        let Some(i) = self.index_of(symbol) else {
            return Vec::new();
        };
        let mut pairs: Vec<CorrelatedPair> = self
            .symbols
            .iter()
            .enumerate()
            .filter(|&(j, _)| j != i)
            .filter(|&(j, _)| self.values[i][j].abs() >= threshold)
            .map(|(j, other)| CorrelatedPair {
                symbol1: symbol.to_string(),
                symbol2: other.clone(),
                correlation: self.values[i][j],
                data_points: self.sample_size,
            })
            .collect();
        pairs.sort_by(|a, b| b.correlation.abs().total_cmp(&a.correlation.abs()));
        pairs
    }
}

/// Build the matrix from scratch. Pure: identical input gives identical output.
pub fn build_correlation_matrix(
    series: &[TimeSeriesSlice<'_>],
    settings: &CorrelationSettings,
) -> CorrelationMatrix {
    if series.is_empty() {
        log::warn!("Empty price data provided for correlation");
        return CorrelationMatrix::default();
    }

    let min_returns = settings.min_data_points.saturating_sub(1);
    // An oversized lookback saturates to "all history"
    let window_ms = settings.lookback_hours.saturating_mul(TimeUtils::MS_IN_H);

    // 1. Per-symbol log-returns inside each symbol's own lookback window
    let mut returns_by_symbol: Vec<(String, BTreeMap<i64, f64>)> = Vec::new();
    for slice in series {
        let Some(latest) = slice.last_timestamp_ms() else {
            log::debug!("No data for {}, skipping correlation", slice.symbol());
            continue;
        };
        let cutoff = latest.saturating_sub(window_ms);
        let start = slice.timestamps().partition_point(|&ts| ts < cutoff);
        let timestamps = &slice.timestamps()[start..];
        let closes = &slice.close_prices()[start..];

        if timestamps.len() < settings.min_data_points {
            log::debug!(
                "Insufficient data for {}: {} points in window",
                slice.symbol(),
                timestamps.len()
            );
            continue;
        }

        let returns: BTreeMap<i64, f64> = log_returns(timestamps, closes).into_iter().collect();
        if returns.len() >= min_returns {
            returns_by_symbol.push((slice.symbol().to_string(), returns));
        }
    }

    if returns_by_symbol.len() < 2 {
        log::debug!("Need at least 2 symbols for correlation");
        return CorrelationMatrix::default();
    }

    // 2. Keep only timestamps every symbol has a return for
    let mut common: BTreeSet<i64> = returns_by_symbol[0].1.keys().copied().collect();
    for (_, returns) in &returns_by_symbol[1..] {
        common.retain(|ts| returns.contains_key(ts));
    }
    if common.len() < min_returns {
        log::debug!("Insufficient overlapping data: {} points", common.len());
        return CorrelationMatrix::default();
    }

    let aligned: Vec<Vec<f64>> = returns_by_symbol
        .iter()
        .map(|(_, returns)| common.iter().filter_map(|ts| returns.get(ts).copied()).collect())
        .collect();

    // 3. Upper triangle, mirrored so the matrix is exactly symmetric
    let n = aligned.len();
    let mut values = vec![vec![0.0; n]; n];
    for i in 0..n {
        values[i][i] = 1.0;
        for j in (i + 1)..n {
            let corr = pearson(&aligned[i], &aligned[j]);
            values[i][j] = corr;
            values[j][i] = corr;
        }
    }

    let matrix = CorrelationMatrix {
        symbols: returns_by_symbol.into_iter().map(|(s, _)| s).collect(),
        values,
        sample_size: common.len(),
    };

    log::debug!(
        "Built correlation matrix for {} symbols with {} data points",
        matrix.symbols.len(),
        matrix.sample_size
    );
    if PRINT_CORRELATION_MATRIX {
        for (symbol, row) in matrix.symbols.iter().zip(&matrix.values) {
            log::info!("{:>12} {:?}", symbol, row);
        }
    }

    matrix
}

/// Holds the most recent matrix between rebuilds.
///
/// Single writer: `rebuild` replaces the matrix wholesale and must not race
/// with itself. Reads never fail; they report `None` / empty before a build.
#[derive(Debug, Clone, Default)]
pub struct CorrelationAnalyzer {
    settings: CorrelationSettings,
    matrix: CorrelationMatrix,
}

impl CorrelationAnalyzer {
    pub fn new(settings: CorrelationSettings) -> Self {
        Self {
            settings,
            matrix: CorrelationMatrix::default(),
        }
    }

    pub fn settings(&self) -> &CorrelationSettings {
        &self.settings
    }

    pub fn matrix(&self) -> &CorrelationMatrix {
        &self.matrix
    }

    /// Replace the held matrix. A failed build leaves an empty matrix, so stale
    /// coefficients never outlive the cycle that produced them.
    pub fn rebuild(&mut self, series: &[TimeSeriesSlice<'_>]) -> &CorrelationMatrix {
        self.matrix = build_correlation_matrix(series, &self.settings);
        &self.matrix
    }

    pub fn get_correlation(&self, a: &str, b: &str) -> Option<f64> {
        self.matrix.get(a, b)
    }

    pub fn is_highly_correlated(&self, a: &str, b: &str, threshold: Option<f64>) -> bool {
        let threshold = threshold.unwrap_or(self.settings.high_correlation_threshold);
        self.get_correlation(a, b)
            .is_some_and(|corr| corr.abs() >= threshold)
    }

    pub fn get_average_correlation(&self, symbol: &str) -> Option<f64> {
        self.matrix.average_abs(symbol)
    }

    pub fn get_correlated_pairs(&self, symbol: &str, threshold: Option<f64>) -> Vec<CorrelatedPair> {
        let threshold = threshold.unwrap_or(self.settings.high_correlation_threshold);
        self.matrix.correlated_pairs(symbol, threshold)
    }
}
