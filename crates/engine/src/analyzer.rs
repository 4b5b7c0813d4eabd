//! Arbitrage analysis over unified products.
//!
//! Emits one signal per outcome priced by at least two members. Spread math
//! is exact decimal arithmetic; a zero minimum price leaves the implied
//! profit undefined rather than infinite.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use arbscan_core::ArbitrageConfig;

use crate::cluster::UnifiedProduct;

/// A detected price discrepancy for one outcome across sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbitrageSignal {
    /// The product the discrepancy was found in.
    pub product_id: Uuid,
    /// Canonical title of that product, carried for reporting.
    pub canonical_title: String,
    /// The outcome compared across sources.
    pub outcome: String,
    /// Price per source for this outcome. Sources not pricing the outcome
    /// are absent, never treated as a zero price.
    pub source_prices: BTreeMap<String, Decimal>,
    /// Highest minus lowest source price, never negative.
    pub max_spread: Decimal,
    /// Spread relative to the cheapest source; `None` when the cheapest
    /// price is zero.
    pub implied_profit_pct: Option<Decimal>,
    /// True when the spread meets the materiality threshold.
    pub flagged: bool,
}

/// Computes arbitrage signals for one product.
///
/// Products with fewer than two members yield nothing; there is no
/// cross-source comparison to make.
#[must_use]
pub fn analyze(product: &UnifiedProduct, config: &ArbitrageConfig) -> Vec<ArbitrageSignal> {
    if !product.is_multi_source() {
        return Vec::new();
    }

    // Outcome -> price per source, over every outcome any member prices.
    let mut prices_by_outcome: BTreeMap<&str, BTreeMap<String, Decimal>> = BTreeMap::new();
    for (source, listing) in &product.members {
        for (outcome, price) in &listing.outcome_prices {
            prices_by_outcome
                .entry(outcome.as_str())
                .or_default()
                .insert(source.clone(), *price);
        }
    }

    let mut signals = Vec::new();
    for (outcome, source_prices) in prices_by_outcome {
        if source_prices.len() < 2 {
            continue;
        }
        // Non-empty by the length check above.
        let Some(min) = source_prices.values().min().copied() else {
            continue;
        };
        let Some(max) = source_prices.values().max().copied() else {
            continue;
        };
        let max_spread = max - min;
        let implied_profit_pct = if min > Decimal::ZERO {
            Some(max_spread / min)
        } else {
            None
        };
        let flagged = max_spread >= config.materiality_threshold;
        if flagged {
            debug!(
                product = %product.canonical_title,
                outcome,
                %max_spread,
                "material spread"
            );
        }
        signals.push(ArbitrageSignal {
            product_id: product.product_id,
            canonical_title: product.canonical_title.clone(),
            outcome: outcome.to_string(),
            source_prices,
            max_spread,
            implied_profit_pct,
            flagged,
        });
    }
    signals
}

/// Sorts signals descending by implied profit, the ordering the downstream
/// report relies on. Undefined profits sort last; remaining ties fall back
/// to `(product_id, outcome)` to keep runs byte-identical.
pub fn rank(signals: &mut [ArbitrageSignal]) {
    signals.sort_by(|x, y| {
        match (&y.implied_profit_pct, &x.implied_profit_pct) {
            (Some(a), Some(b)) => a.cmp(b),
            (Some(_), None) => std::cmp::Ordering::Greater,
            (None, Some(_)) => std::cmp::Ordering::Less,
            (None, None) => std::cmp::Ordering::Equal,
        }
        .then_with(|| (x.product_id, &x.outcome).cmp(&(y.product_id, &y.outcome)))
    });
}
