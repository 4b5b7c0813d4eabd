//! Cross-platform market unification and arbitrage-signal detection.
//!
//! Takes heterogeneous, differently-worded market listings from N source
//! platforms, clusters them into canonical products representing the same
//! real-world event, scores each cluster's confidence, and emits ranked
//! arbitrage signals from price differences inside a cluster.
//!
//! ```text
//! raw listings (per source)
//!        |
//!   normalizer        canonical titles, outcome sets, clamped prices
//!        |
//!   scorer            pairwise Jaccard + oracle for the ambiguous band
//!        |
//!   cluster           greedy best-first merges, one listing per source
//!        |
//!   analyzer          per-outcome spreads, ranked by implied profit
//! ```
//!
//! The [`pipeline`] module ties the stages into one batch pass:
//!
//! ```no_run
//! use arbscan_core::AppConfig;
//! use arbscan_engine::Pipeline;
//!
//! # async fn example(listings: Vec<arbscan_core::RawListing>) -> anyhow::Result<()> {
//! let pipeline = Pipeline::new(AppConfig::default());
//! let output = pipeline.run(listings).await?;
//! for signal in output.signals.iter().filter(|s| s.flagged) {
//!     println!("{}: spread {}", signal.canonical_title, signal.max_spread);
//! }
//! # Ok(())
//! # }
//! ```

pub mod analyzer;
pub mod cluster;
pub mod normalizer;
pub mod pipeline;
pub mod scorer;

pub use analyzer::{analyze, rank, ArbitrageSignal};
pub use cluster::{cluster, UnifiedProduct};
pub use normalizer::{normalize, price_out_of_range};
pub use pipeline::{Pipeline, RunOutput};
pub use scorer::{ScoreMethod, SimilarityEdge, SimilarityScorer};
