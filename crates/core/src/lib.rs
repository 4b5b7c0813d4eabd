pub mod config;
pub mod config_loader;
pub mod diagnostics;
pub mod error;
pub mod listing;
pub mod oracle;

pub use config::{AppConfig, ArbitrageConfig, MatchingConfig, OracleConfig, RuntimeConfig};
pub use config_loader::ConfigLoader;
pub use diagnostics::{RunDiagnostics, SignalSummary};
pub use error::EngineError;
pub use listing::{validate_shape, ListingKey, MalformedReason, NormalizedListing, RawListing};
pub use oracle::MatchOracle;
