//! Listing normalization.
//!
//! Canonicalizes raw listings into a standard shape: lower-cased titles with
//! punctuation, emoji and stop words removed, canonical outcome labels, and
//! prices clamped to `[0, 1]`. Normalization is pure and total; any raw
//! title is accepted.

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;

use arbscan_core::{NormalizedListing, RawListing};

/// Words stripped from canonical titles: platform names plus filler that
/// carries no event identity.
const STOP_WORDS: &[&str] = &[
    "polymarket",
    "predictit",
    "kalshi",
    "manifold",
    "market",
    "will",
    "by",
    "the",
    "a",
    "an",
    "of",
    "in",
    "to",
    "be",
    "is",
    "and",
];

/// Normalizes one raw listing into its canonical form.
///
/// Outcome labels with no attached price are dropped; remaining prices are
/// clamped to `[0, 1]`. Idempotent: normalizing an already-canonical title
/// yields the same `canonical_title` and `outcome_set`.
#[must_use]
pub fn normalize(raw: &RawListing) -> NormalizedListing {
    let canonical_title = canonicalize_title(&raw.title);
    let title_tokens: BTreeSet<String> = canonical_title
        .split_whitespace()
        .map(str::to_string)
        .collect();

    let mut outcome_set = BTreeSet::new();
    let mut outcome_prices = BTreeMap::new();
    for label in &raw.outcome_labels {
        let Some(price) = raw.outcome_prices.get(label) else {
            continue;
        };
        let canonical = canonicalize_outcome(label);
        if canonical.is_empty() {
            continue;
        }
        outcome_set.insert(canonical.clone());
        outcome_prices.insert(canonical, clamp_unit(*price));
    }

    NormalizedListing {
        key: raw.key(),
        canonical_title,
        title_tokens,
        outcome_set,
        outcome_prices,
        fetched_at: raw.fetched_at,
    }
}

/// Returns true when any raw price falls outside `[0, 1]`.
///
/// Such listings are normalized (clamped) but excluded from clustering and
/// recorded in run diagnostics rather than rejected outright.
#[must_use]
pub fn price_out_of_range(raw: &RawListing) -> bool {
    raw.outcome_prices
        .values()
        .any(|price| *price < Decimal::ZERO || *price > Decimal::ONE)
}

/// Lower-cases, strips punctuation and emoji, collapses whitespace, and
/// removes stop words.
fn canonicalize_title(title: &str) -> String {
    scrub(title)
        .into_iter()
        .filter(|word| !STOP_WORDS.contains(&word.as_str()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Canonicalizes an outcome label ("Yes"/"YES"/"yes" all map to "yes").
/// Stop words are kept; outcome labels are too short to carry filler.
fn canonicalize_outcome(label: &str) -> String {
    scrub(label).join(" ")
}

/// Shared scrubbing pass: lowercase, non-alphanumeric to space, collapse
/// whitespace. Emoji and punctuation are not alphanumeric and fall away.
fn scrub(text: &str) -> Vec<String> {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

fn clamp_unit(price: Decimal) -> Decimal {
    price.clamp(Decimal::ZERO, Decimal::ONE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn raw(title: &str, labels: &[&str], prices: &[(&str, Decimal)]) -> RawListing {
        RawListing {
            source_id: "polymarket".to_string(),
            source_native_id: "pm-1".to_string(),
            title: title.to_string(),
            outcome_labels: labels.iter().map(ToString::to_string).collect(),
            outcome_prices: prices
                .iter()
                .map(|(label, price)| ((*label).to_string(), *price))
                .collect(),
            fetched_at: Utc::now(),
        }
    }

    // ==================== Title Canonicalization Tests ====================

    #[test]
    fn test_canonical_title_strips_noise() {
        let listing = raw(
            "Will Candidate X win the election?",
            &["Yes"],
            &[("Yes", dec!(0.62))],
        );
        assert_eq!(normalize(&listing).canonical_title, "candidate x win election");
    }

    #[test]
    fn test_canonical_title_strips_platform_names_and_emoji() {
        let listing = raw(
            "🔥 Polymarket: BTC above $100k??",
            &["Yes"],
            &[("Yes", dec!(0.5))],
        );
        assert_eq!(normalize(&listing).canonical_title, "btc above 100k");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let first = normalize(&raw(
            "Will Candidate X win the election?",
            &["YES"],
            &[("YES", dec!(0.62))],
        ));
        let second = normalize(&raw(
            &first.canonical_title,
            &["yes"],
            &[("yes", dec!(0.62))],
        ));

        assert_eq!(first.canonical_title, second.canonical_title);
        assert_eq!(first.outcome_set, second.outcome_set);
    }

    #[test]
    fn test_casing_and_punctuation_variants_converge() {
        let a = normalize(&raw("WILL candidate x WIN the ELECTION???", &[], &[]));
        let b = normalize(&raw("will Candidate X win the election", &[], &[]));

        assert_eq!(a.canonical_title, b.canonical_title);
        assert_eq!(a.title_tokens, b.title_tokens);
    }

    #[test]
    fn test_all_stop_word_title_yields_empty_canonical() {
        let listing = raw("Will the market be...", &[], &[]);
        let normalized = normalize(&listing);

        assert!(normalized.canonical_title.is_empty());
        assert!(normalized.title_tokens.is_empty());
    }

    // ==================== Outcome Tests ====================

    #[test]
    fn test_outcome_labels_canonicalized() {
        let listing = raw(
            "Some event",
            &["Yes", "NO"],
            &[("Yes", dec!(0.6)), ("NO", dec!(0.4))],
        );
        let normalized = normalize(&listing);

        let outcomes: Vec<&str> = normalized.outcome_set.iter().map(String::as_str).collect();
        assert_eq!(outcomes, vec!["no", "yes"]);
        assert_eq!(normalized.outcome_prices["yes"], dec!(0.6));
    }

    #[test]
    fn test_unpriced_outcome_dropped() {
        let listing = raw("Some event", &["Yes", "No"], &[("Yes", dec!(0.6))]);
        let normalized = normalize(&listing);

        assert!(normalized.outcome_set.contains("yes"));
        assert!(!normalized.outcome_set.contains("no"));
    }

    // ==================== Price Tests ====================

    #[test]
    fn test_prices_clamped_to_unit_interval() {
        let listing = raw(
            "Some event",
            &["Yes", "No"],
            &[("Yes", dec!(1.4)), ("No", dec!(-0.2))],
        );
        let normalized = normalize(&listing);

        assert_eq!(normalized.outcome_prices["yes"], Decimal::ONE);
        assert_eq!(normalized.outcome_prices["no"], Decimal::ZERO);
    }

    #[test]
    fn test_price_out_of_range_detection() {
        let bad = raw("Some event", &["Yes"], &[("Yes", dec!(1.4))]);
        let good = raw("Some event", &["Yes"], &[("Yes", dec!(0.62))]);

        assert!(price_out_of_range(&bad));
        assert!(!price_out_of_range(&good));
    }

    #[test]
    fn test_boundary_prices_in_range() {
        let listing = raw(
            "Some event",
            &["Yes", "No"],
            &[("Yes", Decimal::ZERO), ("No", Decimal::ONE)],
        );
        assert!(!price_out_of_range(&listing));
    }
}
