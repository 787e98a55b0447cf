//! Market data models
//!
//! - `types` - Symbol normalization
//! - `snapshot` - Market snapshot returned by providers and cached by the service

mod snapshot;
mod types;

pub use snapshot::MarketSnapshot;
pub use types::normalize_symbol;
