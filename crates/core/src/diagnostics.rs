//! Run diagnostics for one batch pass.
//!
//! Data-quality problems never abort a run; they land here as counts and
//! per-listing reasons so the report assembler can surface them.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::listing::{ListingKey, MalformedReason};

/// Diagnostics accumulated over one batch pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunDiagnostics {
    /// Raw listings handed in by the scraping collaborator.
    pub listings_received: u32,
    /// Listings dropped at the input boundary, with reasons.
    pub dropped: Vec<(ListingKey, MalformedReason)>,
    /// Listings excluded from clustering (e.g. out-of-range prices), with reasons.
    pub excluded: Vec<(ListingKey, MalformedReason)>,
    /// Cross-source pairs scored.
    pub pairs_scored: u32,
    /// Oracle judge invocations, retries included.
    pub oracle_calls: u32,
    /// Pairs where the oracle failed and the lexical score was used instead.
    pub oracle_degraded: u32,
    /// Unified products created.
    pub products_created: u32,
    /// Products with members from two or more sources.
    pub multi_source_products: u32,
    /// Multi-source products with confidence of at least 0.8.
    pub high_confidence_products: u32,
    /// Arbitrage signals emitted.
    pub signals_emitted: u32,
    /// Signals at or above the materiality threshold.
    pub flagged_signals: u32,
    /// The top-ranked flagged signal, if any.
    pub best_opportunity: Option<SignalSummary>,
}

impl RunDiagnostics {
    /// Returns the number of listings that entered clustering.
    #[must_use]
    pub fn listings_clustered(&self) -> u32 {
        self.listings_received
            .saturating_sub(self.dropped.len() as u32)
            .saturating_sub(self.excluded.len() as u32)
    }
}

/// Condensed view of one arbitrage signal for run summaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalSummary {
    /// Canonical title of the unified product.
    pub canonical_title: String,
    /// Outcome the discrepancy was found on.
    pub outcome: String,
    /// Absolute price spread across sources.
    pub max_spread: Decimal,
    /// Spread relative to the cheapest source, when defined.
    pub implied_profit_pct: Option<Decimal>,
}
