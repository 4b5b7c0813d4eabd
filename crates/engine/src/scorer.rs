//! Pairwise similarity scoring between listings from different sources.
//!
//! Two-stage design: a cheap lexical pass always runs; the external matching
//! oracle is consulted only when the lexical score lands in the configured
//! ambiguous band. Oracle failure degrades to the lexical score and never
//! fails the pipeline.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use arbscan_core::{ListingKey, MatchOracle, MatchingConfig, NormalizedListing, OracleConfig};

// =============================================================================
// Similarity Edge
// =============================================================================

/// Which path produced a similarity score. Recorded for auditability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoreMethod {
    /// Lexical score outside the ambiguous band, used directly.
    Lexical,
    /// Oracle judgment for an ambiguous pair.
    Oracle,
    /// Oracle was due but failed; lexical score used as fallback.
    Degraded,
}

/// A scored pairing of two listings from different sources.
///
/// Transient: consumed immediately by clustering, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityEdge {
    /// Key of the first listing; always ordered `a < b`.
    pub a: ListingKey,
    /// Key of the second listing.
    pub b: ListingKey,
    /// Similarity in `[0, 1]`.
    pub score: f64,
    /// The path that produced the score.
    pub method: ScoreMethod,
}

impl SimilarityEdge {
    /// Creates an edge with keys in canonical order, making scoring
    /// symmetric by construction.
    #[must_use]
    pub fn new(key_a: ListingKey, key_b: ListingKey, score: f64, method: ScoreMethod) -> Self {
        let (a, b) = if key_a <= key_b {
            (key_a, key_b)
        } else {
            (key_b, key_a)
        };
        Self { a, b, score, method }
    }
}

// =============================================================================
// Similarity Scorer
// =============================================================================

/// Scores listing pairs, escalating ambiguous cases to the oracle.
///
/// Holds per-run state only: the oracle response cache and the degradation
/// counters live for exactly one batch pass.
pub struct SimilarityScorer {
    matching: MatchingConfig,
    oracle_config: OracleConfig,
    oracle: Option<Arc<dyn MatchOracle>>,
    /// Per-run oracle cache keyed by unordered canonical-title pair.
    cache: Mutex<HashMap<(String, String), f64>>,
    oracle_calls: AtomicU32,
    oracle_degraded: AtomicU32,
}

impl SimilarityScorer {
    /// Creates a scorer; pass `None` to run lexical-only.
    #[must_use]
    pub fn new(
        matching: MatchingConfig,
        oracle_config: OracleConfig,
        oracle: Option<Arc<dyn MatchOracle>>,
    ) -> Self {
        Self {
            matching,
            oracle_config,
            oracle,
            cache: Mutex::new(HashMap::new()),
            oracle_calls: AtomicU32::new(0),
            oracle_degraded: AtomicU32::new(0),
        }
    }

    /// Oracle judge invocations made so far in this run, retries included.
    #[must_use]
    pub fn oracle_calls(&self) -> u32 {
        self.oracle_calls.load(Ordering::Relaxed)
    }

    /// Pairs that fell back to the lexical score after oracle failure.
    #[must_use]
    pub fn oracle_degraded(&self) -> u32 {
        self.oracle_degraded.load(Ordering::Relaxed)
    }

    /// Computes the lexical similarity: token-set Jaccard over canonical
    /// titles plus a bonus when outcome sets are set-equal.
    #[must_use]
    pub fn lexical_score(&self, a: &NormalizedListing, b: &NormalizedListing) -> f64 {
        let mut score = jaccard(&a.title_tokens, &b.title_tokens);
        if !a.outcome_set.is_empty() && a.outcome_set == b.outcome_set {
            score += self.matching.outcome_set_bonus;
        }
        score.min(1.0)
    }

    /// Scores a pair of listings from different sources.
    ///
    /// Outside the ambiguous band the lexical score is final. Inside it, the
    /// oracle is consulted with the configured deadline and at most one
    /// retry; on failure the lexical score is kept and the method tag
    /// records the degradation.
    pub async fn score(
        &self,
        a: &NormalizedListing,
        b: &NormalizedListing,
    ) -> SimilarityEdge {
        debug_assert_ne!(a.source_id(), b.source_id(), "a source never matches itself");

        let lexical = self.lexical_score(a, b);
        trace!(a = %a.key, b = %b.key, lexical, "lexical score");

        if !self.matching.is_ambiguous(lexical) {
            return SimilarityEdge::new(a.key.clone(), b.key.clone(), lexical, ScoreMethod::Lexical);
        }
        let Some(oracle) = self.oracle.as_deref() else {
            return SimilarityEdge::new(a.key.clone(), b.key.clone(), lexical, ScoreMethod::Lexical);
        };

        match self.consult_oracle(oracle, a, b).await {
            Some(score) => {
                debug!(a = %a.key, b = %b.key, lexical, oracle = score, "oracle resolved ambiguous pair");
                SimilarityEdge::new(a.key.clone(), b.key.clone(), score, ScoreMethod::Oracle)
            }
            None => {
                self.oracle_degraded.fetch_add(1, Ordering::Relaxed);
                warn!(a = %a.key, b = %b.key, lexical, "oracle unavailable, degrading to lexical score");
                SimilarityEdge::new(a.key.clone(), b.key.clone(), lexical, ScoreMethod::Degraded)
            }
        }
    }

    /// Consults the oracle with timeout and retry budget. Returns `None`
    /// when every attempt fails.
    async fn consult_oracle(
        &self,
        oracle: &dyn MatchOracle,
        a: &NormalizedListing,
        b: &NormalizedListing,
    ) -> Option<f64> {
        let cache_key = title_pair(&a.canonical_title, &b.canonical_title);
        if let Some(cached) = self.cache.lock().get(&cache_key).copied() {
            trace!(a = %a.key, b = %b.key, score = cached, "oracle cache hit");
            return Some(cached);
        }

        let deadline = self.oracle_config.timeout();
        for attempt in 0..=self.oracle_config.max_retries {
            self.oracle_calls.fetch_add(1, Ordering::Relaxed);
            let call = oracle.judge(
                &a.canonical_title,
                &b.canonical_title,
                &a.outcome_set,
                &b.outcome_set,
            );
            match tokio::time::timeout(deadline, call).await {
                Ok(Ok(raw_score)) => {
                    let score = raw_score.clamp(0.0, 1.0);
                    self.cache.lock().insert(cache_key, score);
                    return Some(score);
                }
                Ok(Err(error)) => {
                    debug!(a = %a.key, b = %b.key, attempt, %error, "oracle call failed");
                }
                Err(_) => {
                    debug!(a = %a.key, b = %b.key, attempt, timeout_ms = self.oracle_config.timeout_ms, "oracle call timed out");
                }
            }
        }
        None
    }
}

/// Token-set Jaccard similarity. Empty-vs-empty scores zero; titles that
/// normalize to nothing carry no evidence of a match.
fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    intersection as f64 / union as f64
}

fn title_pair(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}
