// Domain types and value objects
pub mod asset_class;
pub mod candle;

// Re-export commonly used types
pub use asset_class::{AssetClass, SafeHavenKind, is_crypto};
pub use candle::Candle;
