//! The batch pipeline: one invocation from raw listings to unified products,
//! ranked arbitrage signals, and run diagnostics.
//!
//! Each run is a pure function of its input and configuration. No state
//! survives between runs; results are emitted only after the full pass
//! completes.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use arbscan_core::{
    validate_shape, AppConfig, EngineError, MalformedReason, MatchOracle, NormalizedListing,
    RawListing, RunDiagnostics, SignalSummary,
};

use crate::analyzer::{analyze, rank, ArbitrageSignal};
use crate::cluster::{cluster, UnifiedProduct};
use crate::normalizer::{normalize, price_out_of_range};
use crate::scorer::{SimilarityEdge, SimilarityScorer};

/// Everything one batch pass produces.
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// Unified products, sorted by canonical title then product id.
    pub products: Vec<UnifiedProduct>,
    /// Arbitrage signals, sorted descending by implied profit.
    pub signals: Vec<ArbitrageSignal>,
    /// Data-quality counts and drop reasons for the run.
    pub diagnostics: RunDiagnostics,
}

/// The unification pipeline. Holds configuration and the optional matching
/// oracle; all per-run state lives inside [`Pipeline::run`].
pub struct Pipeline {
    config: AppConfig,
    oracle: Option<Arc<dyn MatchOracle>>,
}

impl Pipeline {
    /// Creates a pipeline without an oracle; ambiguous pairs keep their
    /// lexical score.
    #[must_use]
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            oracle: None,
        }
    }

    /// Attaches a matching oracle for ambiguous pairs.
    #[must_use]
    pub fn with_oracle(mut self, oracle: Arc<dyn MatchOracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    /// Runs one batch pass over the given raw listings.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] only for invariant violations and worker
    /// failures. Data-quality problems degrade into diagnostics instead.
    pub async fn run(&self, raw_listings: Vec<RawListing>) -> Result<RunOutput, EngineError> {
        let mut diagnostics = RunDiagnostics {
            listings_received: raw_listings.len() as u32,
            ..RunDiagnostics::default()
        };
        info!(listings = raw_listings.len(), "starting unification run");

        let mut listings = self.admit(raw_listings, &mut diagnostics);
        // Deterministic scoring and clustering order.
        listings.sort_by(|x, y| x.key.cmp(&y.key));

        let (mut edges, oracle_calls, oracle_degraded) = self.score_pairs(&listings).await?;
        edges.sort_by(|x, y| (&x.a, &x.b).cmp(&(&y.a, &y.b)));
        diagnostics.pairs_scored = edges.len() as u32;
        diagnostics.oracle_calls = oracle_calls;
        diagnostics.oracle_degraded = oracle_degraded;

        let products = cluster(&listings, &edges, self.config.matching.acceptance_threshold)?;
        diagnostics.products_created = products.len() as u32;
        diagnostics.multi_source_products =
            products.iter().filter(|p| p.is_multi_source()).count() as u32;
        diagnostics.high_confidence_products = products
            .iter()
            .filter(|p| p.is_multi_source() && p.confidence >= 0.8)
            .count() as u32;

        let mut signals: Vec<ArbitrageSignal> = products
            .iter()
            .flat_map(|product| analyze(product, &self.config.arbitrage))
            .collect();
        rank(&mut signals);
        diagnostics.signals_emitted = signals.len() as u32;
        diagnostics.flagged_signals = signals.iter().filter(|s| s.flagged).count() as u32;
        diagnostics.best_opportunity = signals.iter().find(|s| s.flagged).map(|s| SignalSummary {
            canonical_title: s.canonical_title.clone(),
            outcome: s.outcome.clone(),
            max_spread: s.max_spread,
            implied_profit_pct: s.implied_profit_pct,
        });

        info!(
            products = products.len(),
            signals = signals.len(),
            flagged = diagnostics.flagged_signals,
            dropped = diagnostics.dropped.len(),
            "unification run complete"
        );
        Ok(RunOutput {
            products,
            signals,
            diagnostics,
        })
    }

    /// Input-boundary pass: drops malformed listings, excludes out-of-range
    /// prices from clustering, normalizes the rest.
    fn admit(
        &self,
        raw_listings: Vec<RawListing>,
        diagnostics: &mut RunDiagnostics,
    ) -> Vec<NormalizedListing> {
        let mut listings = Vec::with_capacity(raw_listings.len());
        for raw in raw_listings {
            if let Err(reason) = validate_shape(&raw) {
                warn!(listing = %raw.key(), %reason, "dropping malformed listing");
                diagnostics.dropped.push((raw.key(), reason));
                continue;
            }
            if price_out_of_range(&raw) {
                warn!(listing = %raw.key(), "excluding listing with out-of-range price");
                diagnostics
                    .excluded
                    .push((raw.key(), MalformedReason::PriceOutOfRange));
                continue;
            }
            listings.push(normalize(&raw));
        }
        listings
    }

    /// Scores every cross-source pair on a bounded worker pool.
    ///
    /// The semaphore caps concurrent tasks and with them in-flight oracle
    /// calls. Permits are taken before spawning so the pool never overshoots.
    async fn score_pairs(
        &self,
        listings: &[NormalizedListing],
    ) -> Result<(Vec<SimilarityEdge>, u32, u32), EngineError> {
        let scorer = Arc::new(SimilarityScorer::new(
            self.config.matching.clone(),
            self.config.oracle.clone(),
            self.oracle.clone(),
        ));
        let semaphore = Arc::new(Semaphore::new(self.config.runtime.worker_pool_size));
        let mut tasks = JoinSet::new();

        for i in 0..listings.len() {
            for j in (i + 1)..listings.len() {
                if listings[i].source_id() == listings[j].source_id() {
                    continue;
                }
                let permit = semaphore
                    .clone()
                    .acquire_owned()
                    .await
                    .map_err(|e| EngineError::Worker(e.to_string()))?;
                let scorer = Arc::clone(&scorer);
                let a = listings[i].clone();
                let b = listings[j].clone();
                tasks.spawn(async move {
                    let edge = scorer.score(&a, &b).await;
                    drop(permit);
                    edge
                });
            }
        }

        let mut edges = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            edges.push(joined.map_err(|e| EngineError::Worker(e.to_string()))?);
        }
        Ok((edges, scorer.oracle_calls(), scorer.oracle_degraded()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::collections::BTreeSet;

    struct FixedOracle(f64);

    #[async_trait]
    impl MatchOracle for FixedOracle {
        async fn judge(
            &self,
            _title_a: &str,
            _title_b: &str,
            _outcomes_a: &BTreeSet<String>,
            _outcomes_b: &BTreeSet<String>,
        ) -> anyhow::Result<f64> {
            Ok(self.0)
        }
    }

    fn raw(source: &str, native: &str, title: &str, price: Decimal) -> RawListing {
        RawListing {
            source_id: source.to_string(),
            source_native_id: native.to_string(),
            title: title.to_string(),
            outcome_labels: vec!["Yes".to_string()],
            outcome_prices: [("Yes".to_string(), price)].into_iter().collect(),
            fetched_at: Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap(),
        }
    }

    fn election_pair() -> Vec<RawListing> {
        vec![
            raw(
                "polymarket",
                "101",
                "Will Candidate X win the election?",
                dec!(0.62),
            ),
            raw("predictit", "7890", "Candidate X wins election", dec!(0.70)),
        ]
    }

    // ==================== End-to-End Tests ====================

    #[tokio::test]
    async fn test_ambiguous_pair_unified_and_flagged() {
        let pipeline = Pipeline::new(AppConfig::default()).with_oracle(Arc::new(FixedOracle(0.9)));
        let output = pipeline.run(election_pair()).await.unwrap();

        assert_eq!(output.products.len(), 1);
        let product = &output.products[0];
        assert_eq!(product.member_count(), 2);
        assert!((product.confidence - 0.9).abs() < f64::EPSILON);

        assert_eq!(output.signals.len(), 1);
        let signal = &output.signals[0];
        assert_eq!(signal.outcome, "yes");
        assert_eq!(signal.max_spread, dec!(0.08));
        let profit = signal.implied_profit_pct.unwrap();
        assert!((profit - dec!(0.129)).abs() < dec!(0.001));
        assert!(signal.flagged);

        let diag = &output.diagnostics;
        assert_eq!(diag.pairs_scored, 1);
        assert_eq!(diag.oracle_calls, 1);
        assert_eq!(diag.multi_source_products, 1);
        assert_eq!(diag.high_confidence_products, 1);
        assert_eq!(diag.flagged_signals, 1);
        assert_eq!(diag.best_opportunity.as_ref().unwrap().outcome, "yes");
    }

    #[tokio::test]
    async fn test_runs_are_byte_identical() {
        let input = election_pair();
        let pipeline = Pipeline::new(AppConfig::default()).with_oracle(Arc::new(FixedOracle(0.9)));

        let first = pipeline.run(input.clone()).await.unwrap();
        let second = pipeline.run(input).await.unwrap();

        let products_a = serde_json::to_string(&first.products).unwrap();
        let products_b = serde_json::to_string(&second.products).unwrap();
        assert_eq!(products_a, products_b);

        let signals_a = serde_json::to_string(&first.signals).unwrap();
        let signals_b = serde_json::to_string(&second.signals).unwrap();
        assert_eq!(signals_a, signals_b);
    }

    #[tokio::test]
    async fn test_out_of_range_price_excluded() {
        let mut input = election_pair();
        input.push(raw("kalshi", "K1", "Candidate X wins election", dec!(1.4)));

        let pipeline = Pipeline::new(AppConfig::default()).with_oracle(Arc::new(FixedOracle(0.9)));
        let output = pipeline.run(input).await.unwrap();

        // The bad listing never reaches clustering.
        assert_eq!(output.products.len(), 1);
        assert_eq!(output.products[0].member_count(), 2);
        let diag = &output.diagnostics;
        assert_eq!(diag.excluded.len(), 1);
        assert_eq!(diag.excluded[0].1, MalformedReason::PriceOutOfRange);
        assert_eq!(diag.listings_clustered(), 2);
    }

    #[tokio::test]
    async fn test_malformed_listing_dropped_with_diagnostic() {
        let mut input = election_pair();
        input.push(raw("kalshi", "K2", "   ", dec!(0.5)));

        let pipeline = Pipeline::new(AppConfig::default()).with_oracle(Arc::new(FixedOracle(0.9)));
        let output = pipeline.run(input).await.unwrap();

        let diag = &output.diagnostics;
        assert_eq!(diag.dropped.len(), 1);
        assert_eq!(diag.dropped[0].1, MalformedReason::EmptyTitle);
        assert_eq!(output.products.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_input_completes_with_zero_products() {
        let pipeline = Pipeline::new(AppConfig::default());
        let output = pipeline.run(Vec::new()).await.unwrap();

        assert!(output.products.is_empty());
        assert!(output.signals.is_empty());
        assert_eq!(output.diagnostics.listings_received, 0);
    }

    #[tokio::test]
    async fn test_same_source_pairs_never_scored() {
        let input = vec![
            raw("polymarket", "1", "event alpha happens", dec!(0.5)),
            raw("polymarket", "2", "event alpha happens", dec!(0.5)),
        ];

        let pipeline = Pipeline::new(AppConfig::default());
        let output = pipeline.run(input).await.unwrap();

        assert_eq!(output.diagnostics.pairs_scored, 0);
        assert_eq!(output.products.len(), 2);
    }

    #[tokio::test]
    async fn test_no_oracle_keeps_lexical_score() {
        // 0.7 lexical sits in the ambiguous band but clears acceptance, so
        // the pair still unifies without an oracle.
        let pipeline = Pipeline::new(AppConfig::default());
        let output = pipeline.run(election_pair()).await.unwrap();

        assert_eq!(output.products.len(), 1);
        assert_eq!(output.diagnostics.oracle_calls, 0);
        assert!((output.products[0].confidence - 0.7).abs() < 1e-9);
    }
}
