//! Constrained greedy clustering of scored listings into unified products.
//!
//! Not generic connected-components: an edge contributes only at or above the
//! acceptance threshold, a cluster holds at most one listing per source, and
//! two groups merge only when every cross pair between them is itself an
//! accepted edge. Merges are processed in descending score order so the
//! strongest evidence wins first; the whole pass is deterministic for a given
//! input and configuration.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use uuid::Uuid;

use arbscan_core::{EngineError, ListingKey, NormalizedListing};

use crate::scorer::SimilarityEdge;

// =============================================================================
// Unified Product
// =============================================================================

/// A cluster of listings across sources believed to represent the same
/// real-world event.
///
/// Immutable once built; each batch pass produces a fresh snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedProduct {
    /// Stable identifier derived from the canonical title and sorted member
    /// keys. Identical input yields the identical id across runs.
    pub product_id: Uuid,
    /// Canonical title of the product: the lexicographically smallest member
    /// title, so the choice never depends on merge order.
    pub canonical_title: String,
    /// Member listings keyed by source platform, at most one per source.
    pub members: BTreeMap<String, NormalizedListing>,
    /// Worst-case match certainty: the minimum accepted pairwise edge score
    /// among members. Singletons score 1.0.
    pub confidence: f64,
    /// Latest `fetched_at` among members. Derived from input, not from the
    /// wall clock, so repeated runs stay byte-identical.
    pub created_at: DateTime<Utc>,
}

impl UnifiedProduct {
    /// Number of member listings.
    #[must_use]
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// True when members span two or more sources.
    #[must_use]
    pub fn is_multi_source(&self) -> bool {
        self.members.len() >= 2
    }

    /// Lowest price listed for `outcome` across members, with its source.
    #[must_use]
    pub fn best_price_for(&self, outcome: &str) -> Option<(&str, Decimal)> {
        self.members
            .iter()
            .filter_map(|(source, listing)| {
                listing
                    .outcome_prices
                    .get(outcome)
                    .map(|price| (source.as_str(), *price))
            })
            .min_by(|(_, a), (_, b)| a.cmp(b))
    }
}

// =============================================================================
// Clustering
// =============================================================================

/// One in-progress cluster during the merge pass.
struct Cluster {
    members: BTreeSet<ListingKey>,
    sources: BTreeSet<String>,
    /// Minimum accepted edge score among members so far; 1.0 for singletons.
    min_edge: f64,
}

/// Groups listings into unified products using accepted similarity edges.
///
/// Edges below `threshold` are ignored. A listing with no accepted edge
/// becomes its own singleton product. Output is sorted by canonical title
/// then product id.
///
/// # Errors
///
/// Returns [`EngineError::SourceCollision`] if a built product would hold two
/// listings from the same source. The merge rules prevent this; reaching it
/// means a clustering bug, and the run aborts rather than emit corrupt output.
pub fn cluster(
    listings: &[NormalizedListing],
    edges: &[SimilarityEdge],
    threshold: f64,
) -> Result<Vec<UnifiedProduct>, EngineError> {
    let by_key: HashMap<&ListingKey, &NormalizedListing> =
        listings.iter().map(|listing| (&listing.key, listing)).collect();

    // Accepted-edge score lookup, keyed by ordered pair.
    let mut scores: BTreeMap<(ListingKey, ListingKey), f64> = BTreeMap::new();
    let mut accepted: Vec<&SimilarityEdge> = Vec::new();
    for edge in edges {
        if edge.score >= threshold
            && by_key.contains_key(&edge.a)
            && by_key.contains_key(&edge.b)
        {
            scores.insert((edge.a.clone(), edge.b.clone()), edge.score);
            accepted.push(edge);
        }
    }
    debug!(
        listings = listings.len(),
        edges = edges.len(),
        accepted = accepted.len(),
        threshold,
        "clustering"
    );

    // Strongest evidence first; equal scores keep key order for determinism.
    accepted.sort_by(|x, y| {
        y.score
            .total_cmp(&x.score)
            .then_with(|| (&x.a, &x.b).cmp(&(&y.a, &y.b)))
    });

    let mut clusters: Vec<Option<Cluster>> = Vec::with_capacity(listings.len());
    let mut assignment: HashMap<ListingKey, usize> = HashMap::new();
    for listing in listings {
        assignment.insert(listing.key.clone(), clusters.len());
        clusters.push(Some(Cluster {
            members: BTreeSet::from([listing.key.clone()]),
            sources: BTreeSet::from([listing.source_id().to_string()]),
            min_edge: 1.0,
        }));
    }

    // Walk equal-score groups. Within a group, repeatedly apply the viable
    // merge with the largest combined cluster (favoring consolidation over
    // two fresh pairs), breaking remaining ties by smallest edge key.
    let mut start = 0;
    while start < accepted.len() {
        let mut end = start;
        while end < accepted.len() && accepted[end].score == accepted[start].score {
            end += 1;
        }
        let group = &accepted[start..end];

        loop {
            let mut best: Option<(usize, usize, usize, &SimilarityEdge)> = None;
            for edge in group {
                let ca = assignment[&edge.a];
                let cb = assignment[&edge.b];
                if ca == cb {
                    continue;
                }
                let (left, right) = (cluster_ref(&clusters, ca), cluster_ref(&clusters, cb));
                if !left.sources.is_disjoint(&right.sources) {
                    continue;
                }
                if !fully_linked(left, right, &scores) {
                    continue;
                }
                let combined = left.members.len() + right.members.len();
                let better = match best {
                    None => true,
                    Some((best_combined, _, _, best_edge)) => combined > best_combined
                        || (combined == best_combined
                            && (&edge.a, &edge.b) < (&best_edge.a, &best_edge.b)),
                };
                if better {
                    best = Some((combined, ca, cb, edge));
                }
            }
            let Some((_, ca, cb, edge)) = best else {
                break;
            };
            trace!(a = %edge.a, b = %edge.b, score = edge.score, "merging clusters");
            merge(&mut clusters, &mut assignment, ca, cb, &scores);
        }
        start = end;
    }

    // Build products; the source-disjoint merge rule makes a collision here
    // a programming error.
    let mut products = Vec::new();
    for slot in clusters {
        let Some(group) = slot else {
            continue;
        };
        products.push(build_product(&group, &by_key)?);
    }
    products.sort_by(|x, y| {
        x.canonical_title
            .cmp(&y.canonical_title)
            .then_with(|| x.product_id.cmp(&y.product_id))
    });
    Ok(products)
}

fn cluster_ref(clusters: &[Option<Cluster>], id: usize) -> &Cluster {
    match &clusters[id] {
        Some(cluster) => cluster,
        // Assignments always point at live clusters.
        None => unreachable!("assignment points at a merged-away cluster"),
    }
}

/// True when every cross pair between the two groups is an accepted edge.
fn fully_linked(
    left: &Cluster,
    right: &Cluster,
    scores: &BTreeMap<(ListingKey, ListingKey), f64>,
) -> bool {
    left.members.iter().all(|x| {
        right
            .members
            .iter()
            .all(|y| scores.contains_key(&pair_key(x, y)))
    })
}

fn merge(
    clusters: &mut [Option<Cluster>],
    assignment: &mut HashMap<ListingKey, usize>,
    into: usize,
    from: usize,
    scores: &BTreeMap<(ListingKey, ListingKey), f64>,
) {
    let absorbed = clusters[from].take();
    let Some(absorbed) = absorbed else {
        return;
    };
    let Some(target) = clusters[into].as_mut() else {
        return;
    };

    let mut min_edge = target.min_edge.min(absorbed.min_edge);
    for x in &target.members {
        for y in &absorbed.members {
            if let Some(score) = scores.get(&pair_key(x, y)) {
                min_edge = min_edge.min(*score);
            }
        }
    }

    for member in absorbed.members {
        assignment.insert(member.clone(), into);
        target.members.insert(member);
    }
    target.sources.extend(absorbed.sources);
    target.min_edge = min_edge;
}

fn pair_key(x: &ListingKey, y: &ListingKey) -> (ListingKey, ListingKey) {
    if x <= y {
        (x.clone(), y.clone())
    } else {
        (y.clone(), x.clone())
    }
}

fn build_product(
    group: &Cluster,
    by_key: &HashMap<&ListingKey, &NormalizedListing>,
) -> Result<UnifiedProduct, EngineError> {
    let mut members: BTreeMap<String, NormalizedListing> = BTreeMap::new();
    let mut canonical_title: Option<String> = None;
    let mut created_at: Option<DateTime<Utc>> = None;

    for key in &group.members {
        let Some(listing) = by_key.get(key) else {
            continue;
        };
        let listing = (*listing).clone();
        if canonical_title
            .as_deref()
            .map_or(true, |title| listing.canonical_title.as_str() < title)
        {
            canonical_title = Some(listing.canonical_title.clone());
        }
        if created_at.map_or(true, |at| listing.fetched_at > at) {
            created_at = Some(listing.fetched_at);
        }
        if let Some(previous) = members.insert(listing.key.source_id.clone(), listing) {
            return Err(EngineError::SourceCollision {
                canonical_title: canonical_title.unwrap_or_default(),
                source_id: previous.key.source_id,
            });
        }
    }

    let canonical_title = canonical_title.unwrap_or_default();
    let confidence = if members.len() <= 1 { 1.0 } else { group.min_edge };
    Ok(UnifiedProduct {
        product_id: product_id(&canonical_title, &members),
        canonical_title,
        confidence,
        created_at: created_at.unwrap_or_default(),
        members,
    })
}

/// Stable product id: UUIDv5 over the canonical title and sorted member keys.
fn product_id(canonical_title: &str, members: &BTreeMap<String, NormalizedListing>) -> Uuid {
    let mut name = String::from(canonical_title);
    for listing in members.values() {
        name.push('\n');
        name.push_str(&listing.key.to_string());
    }
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
}
