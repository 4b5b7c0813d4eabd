//! Error types for the unification engine.
//!
//! Only programming errors and configuration mistakes surface here.
//! Data-quality problems (malformed listings, oracle failures) degrade
//! gracefully and are reported through run diagnostics instead.

use thiserror::Error;

/// Errors that abort a unification run.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A built product holds two listings from the same source platform.
    /// This is a clustering bug, never a data problem, and must fail loudly
    /// rather than silently corrupt output.
    #[error("source collision in product '{canonical_title}': source '{source_id}' appears twice")]
    SourceCollision {
        /// Canonical title of the offending product.
        canonical_title: String,
        /// The duplicated source platform.
        source_id: String,
    },

    /// Configuration values are internally inconsistent.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A scoring worker task failed to complete.
    #[error("scoring worker failed: {0}")]
    Worker(String),
}
