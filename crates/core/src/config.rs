//! Configuration surface consumed by the unification engine.
//!
//! Values only, no mechanism: the engine takes these structs as plain data;
//! loading and merging lives in [`crate::config_loader`].

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::EngineError;

// =============================================================================
// App Configuration
// =============================================================================

/// Top-level configuration for one engine invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Similarity and clustering thresholds.
    pub matching: MatchingConfig,
    /// Oracle call budget.
    pub oracle: OracleConfig,
    /// Arbitrage materiality settings.
    pub arbitrage: ArbitrageConfig,
    /// Worker-pool sizing.
    pub runtime: RuntimeConfig,
}

impl AppConfig {
    /// Checks the configuration for internally inconsistent values.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] naming the first offending field.
    pub fn validate(&self) -> Result<(), EngineError> {
        self.matching.validate()?;
        if self.runtime.worker_pool_size == 0 {
            return Err(EngineError::Config(
                "runtime.worker_pool_size must be at least 1".to_string(),
            ));
        }
        if self.arbitrage.materiality_threshold < Decimal::ZERO {
            return Err(EngineError::Config(
                "arbitrage.materiality_threshold must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Matching Configuration
// =============================================================================

/// Thresholds governing similarity scoring and cluster acceptance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Lower bound (inclusive) of the ambiguous lexical band.
    pub ambiguous_band_low: f64,
    /// Upper bound (exclusive) of the ambiguous lexical band.
    pub ambiguous_band_high: f64,
    /// Minimum pairwise score for an edge to contribute to clustering.
    pub acceptance_threshold: f64,
    /// Bonus added to the lexical score when outcome sets are identical.
    pub outcome_set_bonus: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            ambiguous_band_low: 0.35,
            ambiguous_band_high: 0.75,
            acceptance_threshold: 0.55,
            outcome_set_bonus: 0.10,
        }
    }
}

impl MatchingConfig {
    /// Creates a strict configuration: narrow oracle band, high acceptance bar.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            ambiguous_band_low: 0.45,
            ambiguous_band_high: 0.65,
            acceptance_threshold: 0.75,
            outcome_set_bonus: 0.05,
        }
    }

    /// Creates a relaxed configuration for broader matching.
    #[must_use]
    pub fn relaxed() -> Self {
        Self {
            ambiguous_band_low: 0.25,
            ambiguous_band_high: 0.85,
            acceptance_threshold: 0.45,
            outcome_set_bonus: 0.15,
        }
    }

    /// Sets the acceptance threshold.
    #[must_use]
    pub fn with_acceptance_threshold(mut self, threshold: f64) -> Self {
        self.acceptance_threshold = threshold;
        self
    }

    /// Sets the ambiguous band bounds.
    #[must_use]
    pub fn with_ambiguous_band(mut self, low: f64, high: f64) -> Self {
        self.ambiguous_band_low = low;
        self.ambiguous_band_high = high;
        self
    }

    /// Returns true when a lexical score falls inside the ambiguous band
    /// `[low, high)` and the oracle should be consulted.
    #[must_use]
    pub fn is_ambiguous(&self, score: f64) -> bool {
        score >= self.ambiguous_band_low && score < self.ambiguous_band_high
    }

    fn validate(&self) -> Result<(), EngineError> {
        for (name, value) in [
            ("matching.ambiguous_band_low", self.ambiguous_band_low),
            ("matching.ambiguous_band_high", self.ambiguous_band_high),
            ("matching.acceptance_threshold", self.acceptance_threshold),
            ("matching.outcome_set_bonus", self.outcome_set_bonus),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(EngineError::Config(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        if self.ambiguous_band_low > self.ambiguous_band_high {
            return Err(EngineError::Config(format!(
                "matching.ambiguous_band_low ({}) exceeds ambiguous_band_high ({})",
                self.ambiguous_band_low, self.ambiguous_band_high
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Oracle Configuration
// =============================================================================

/// Timeout and retry budget for the external matching oracle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Deadline for a single judge call, in milliseconds.
    pub timeout_ms: u64,
    /// Retries after a failed or timed-out call. At most one retry is the
    /// contract with the matching collaborator.
    pub max_retries: u32,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5_000,
            max_retries: 1,
        }
    }
}

impl OracleConfig {
    /// Returns the per-call deadline as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

// =============================================================================
// Arbitrage Configuration
// =============================================================================

/// Materiality settings for arbitrage signals.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArbitrageConfig {
    /// Minimum absolute spread for a signal to be flagged actionable.
    pub materiality_threshold: Decimal,
}

impl Default for ArbitrageConfig {
    fn default() -> Self {
        Self {
            materiality_threshold: dec!(0.03),
        }
    }
}

impl ArbitrageConfig {
    /// Creates a conservative configuration that flags only wide spreads.
    #[must_use]
    pub fn conservative() -> Self {
        Self {
            materiality_threshold: dec!(0.05),
        }
    }

    /// Sets the materiality threshold.
    #[must_use]
    pub fn with_materiality_threshold(mut self, threshold: Decimal) -> Self {
        self.materiality_threshold = threshold;
        self
    }
}

// =============================================================================
// Runtime Configuration
// =============================================================================

/// Worker-pool sizing for the scoring stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Concurrent scoring tasks; also caps in-flight oracle calls.
    pub worker_pool_size: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            worker_pool_size: 8,
        }
    }
}
