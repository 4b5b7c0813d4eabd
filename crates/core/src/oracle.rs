//! The external matching-oracle boundary.

use std::collections::BTreeSet;

use anyhow::Result;
use async_trait::async_trait;

/// External capability consulted for ambiguous similarity judgments.
///
/// A narrow, single-method interface so any backend (embedding similarity,
/// an LLM call, a rule engine) can implement it without coupling to the
/// engine. The caller owns the timeout and the at-most-one-retry budget;
/// implementations should simply do the work or return an error.
///
/// Returned scores are expected in `[0, 1]`; the caller clamps them.
/// A failed or timed-out call never fails the run: the scorer falls back to
/// the lexical score.
#[async_trait]
pub trait MatchOracle: Send + Sync {
    /// Judges whether two listings describe the same real-world event.
    async fn judge(
        &self,
        title_a: &str,
        title_b: &str,
        outcomes_a: &BTreeSet<String>,
        outcomes_b: &BTreeSet<String>,
    ) -> Result<f64>;
}
