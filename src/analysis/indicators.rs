//! Price indicators shared by the volatility, sentiment and probability stages.
//!
//! Every function returns `None` when the history is too short or the result
//! would need a division by a non-positive reference value.

/// Percentage change between the last close and the close `lookback` bars earlier.
pub fn rate_of_change(closes: &[f64], lookback: usize) -> Option<f64> {
    if lookback == 0 || closes.len() < lookback + 1 {
        return None;
    }
    let current = closes[closes.len() - 1];
    let past = closes[closes.len() - 1 - lookback];
    if past <= 0.0 {
        return None;
    }
    let roc = (current - past) / past * 100.0;
    roc.is_finite().then_some(roc)
}

/// max(high - low, |high - prev_close|, |low - prev_close|).
/// Without a previous close this is just the bar's own range.
pub fn true_range(high: f64, low: f64, prev_close: Option<f64>) -> f64 {
    let range = high - low;
    match prev_close {
        Some(prev) => range.max((high - prev).abs()).max((low - prev).abs()),
        None => range,
    }
}

/// Simple moving average of True Range over the last `period` bars.
/// Each of those bars needs a previous close, so `period + 1` bars are required.
pub fn average_true_range(
    highs: &[f64],
    lows: &[f64],
    closes: &[f64],
    period: usize,
) -> Option<f64> {
    let n = closes.len();
    if period == 0 || n < period + 1 || highs.len() != n || lows.len() != n {
        return None;
    }
    let total: f64 = (n - period..n)
        .map(|i| true_range(highs[i], lows[i], Some(closes[i - 1])))
        .sum();
    let atr = total / period as f64;
    atr.is_finite().then_some(atr)
}

/// ATR as a percentage of the latest close.
pub fn atr_percent(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Option<f64> {
    let atr = average_true_range(highs, lows, closes, period)?;
    let current_price = *closes.last()?;
    if current_price <= 0.0 {
        return None;
    }
    Some(atr / current_price * 100.0)
}

/// Latest volume over the mean of the last `lookback` volumes (latest included).
pub fn volume_ratio(volumes: &[f64], lookback: usize) -> Option<f64> {
    if lookback == 0 || volumes.len() < lookback {
        return None;
    }
    let window = &volumes[volumes.len() - lookback..];
    let moving_average = window.iter().sum::<f64>() / lookback as f64;
    if !(moving_average > 0.0) {
        return None;
    }
    let current = *window.last()?;
    let ratio = current / moving_average;
    ratio.is_finite().then_some(ratio)
}

/// `ln(close_t / close_{t-1})` paired with the timestamp of bar t.
/// Pairs with a non-positive or non-finite input are dropped.
pub fn log_returns(timestamps: &[i64], closes: &[f64]) -> Vec<(i64, f64)> {
    let n = timestamps.len().min(closes.len());
    (1..n)
        .filter_map(|i| {
            let (prev, curr) = (closes[i - 1], closes[i]);
            if prev <= 0.0 || curr <= 0.0 {
                return None;
            }
            let r = (curr / prev).ln();
            r.is_finite().then_some((timestamps[i], r))
        })
        .collect()
}
