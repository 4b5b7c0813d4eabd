//! Listing data model shared across the unification pipeline.
//!
//! A [`RawListing`] is one market's data exactly as the scraping collaborator
//! delivered it; a [`NormalizedListing`] is its canonical form. Both carry the
//! `(source_id, source_native_id)` natural key and nothing else ties them
//! together.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// =============================================================================
// Listing Key
// =============================================================================

/// Natural key identifying one listing on one source platform.
///
/// `Ord` so every collection keyed by listings iterates deterministically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ListingKey {
    /// Source platform identifier (e.g. "polymarket", "kalshi").
    pub source_id: String,
    /// The listing's identifier on that platform.
    pub source_native_id: String,
}

impl ListingKey {
    /// Creates a new listing key.
    #[must_use]
    pub fn new(source_id: impl Into<String>, source_native_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            source_native_id: source_native_id.into(),
        }
    }
}

impl fmt::Display for ListingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source_id, self.source_native_id)
    }
}

// =============================================================================
// Raw Listing
// =============================================================================

/// One market listing as published by one source platform.
///
/// Immutable once created by the scraping collaborator. Prices are implied
/// probabilities and are expected in `[0, 1]`; out-of-range values are
/// tolerated here and handled at normalization time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawListing {
    /// Source platform identifier.
    pub source_id: String,
    /// The listing's identifier on the source platform.
    pub source_native_id: String,
    /// Market title as scraped, noise and all.
    pub title: String,
    /// Outcome labels in the order the platform presents them.
    pub outcome_labels: Vec<String>,
    /// Price per outcome label.
    pub outcome_prices: BTreeMap<String, Decimal>,
    /// When the scraper fetched this listing.
    pub fetched_at: DateTime<Utc>,
}

impl RawListing {
    /// Returns the natural key for this listing.
    #[must_use]
    pub fn key(&self) -> ListingKey {
        ListingKey::new(self.source_id.clone(), self.source_native_id.clone())
    }
}

// =============================================================================
// Normalized Listing
// =============================================================================

/// The canonical form of a listing, derived from exactly one [`RawListing`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedListing {
    /// Natural key of the originating raw listing.
    pub key: ListingKey,
    /// Lower-cased, punctuation-stripped, stop-word-free title.
    pub canonical_title: String,
    /// Token set of the canonical title, for overlap scoring.
    pub title_tokens: BTreeSet<String>,
    /// Canonicalized outcome labels.
    pub outcome_set: BTreeSet<String>,
    /// Price per canonicalized outcome, clamped to `[0, 1]`.
    pub outcome_prices: BTreeMap<String, Decimal>,
    /// When the scraper fetched the originating listing.
    pub fetched_at: DateTime<Utc>,
}

impl NormalizedListing {
    /// Returns the source platform identifier.
    #[must_use]
    pub fn source_id(&self) -> &str {
        &self.key.source_id
    }
}

// =============================================================================
// Input-Boundary Shape Checks
// =============================================================================

/// Why a raw listing failed the input-boundary shape checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MalformedReason {
    /// Title is empty or whitespace-only.
    EmptyTitle,
    /// No outcome label has a price attached.
    NoPricedOutcomes,
    /// At least one price falls outside `[0, 1]`.
    PriceOutOfRange,
}

impl fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyTitle => write!(f, "empty title"),
            Self::NoPricedOutcomes => write!(f, "no priced outcomes"),
            Self::PriceOutOfRange => write!(f, "price out of [0, 1]"),
        }
    }
}

/// Checks the basic shape of a raw listing at the input boundary.
///
/// Listings failing this check are dropped from the run with a diagnostic;
/// they never abort the run.
///
/// # Errors
///
/// Returns the [`MalformedReason`] describing the first failed check.
pub fn validate_shape(raw: &RawListing) -> Result<(), MalformedReason> {
    if raw.title.trim().is_empty() {
        return Err(MalformedReason::EmptyTitle);
    }
    if !raw
        .outcome_labels
        .iter()
        .any(|label| raw.outcome_prices.contains_key(label))
    {
        return Err(MalformedReason::NoPricedOutcomes);
    }
    Ok(())
}
