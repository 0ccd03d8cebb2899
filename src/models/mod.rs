// Domain models for signal analysis
// These modules contain pure data structures independent of any I/O

pub mod timeseries;

// Re-export key types for convenience
pub use timeseries::{OhlcvTimeSeries, TimeSeriesSlice, find_matching_ohlcv};
