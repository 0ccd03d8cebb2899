// Data loading and collection handling
pub mod timeseries;

// Re-export commonly used types
pub use timeseries::TimeSeriesCollection;
pub use timeseries::cache_file::{load_collection, save_collection};
