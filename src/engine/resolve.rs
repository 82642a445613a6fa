//! Input resolution: expand raw input into work items.

use std::collections::{BTreeMap, HashSet};

use tracing::{info, warn};

use super::cache::DealerCache;
use crate::model::{RunInput, WorkItem};

/// Stand-in for an empty dealer key.
pub const EMPTY_DEALER_KEY: &str = "0";

/// Empty dealer keys become [`EMPTY_DEALER_KEY`]; anything else is kept verbatim.
pub fn normalize_dealer_key(key: &str) -> &str {
    if key.is_empty() { EMPTY_DEALER_KEY } else { key }
}

/// Distinct normalized dealer keys, in order of first appearance.
pub fn dealer_keys(input: &RunInput) -> Vec<String> {
    let raw: Box<dyn Iterator<Item = &String>> = if input.is_explicit() {
        Box::new(input.pairs.keys())
    } else {
        Box::new(input.dealer_keys.iter())
    };

    let mut seen = HashSet::new();
    raw.map(|k| normalize_dealer_key(k))
        .filter(|k| seen.insert(*k))
        .map(str::to_string)
        .collect()
}

/// Work items produced from one input.
#[derive(Debug, Default)]
pub struct Resolved {
    pub items: Vec<WorkItem>,
    /// Dealer keys whose lookup failed; their items were never emitted.
    pub dropped_dealers: Vec<String>,
}

/// Expand the input against a preloaded cache.
///
/// Explicit pairs produce exactly the listed combinations; otherwise every
/// dealer key is combined with every product key. Dealers missing from the
/// cache are dropped with a log line only.
pub async fn resolve(input: &RunInput, cache: &DealerCache) -> Resolved {
    let mut resolved = Resolved::default();

    // Merge pairs whose keys normalize to the same dealer.
    let mut pairs: BTreeMap<&str, Vec<&String>> = BTreeMap::new();
    if input.is_explicit() {
        info!("using explicit dealer → product pairs");
        for (dealer_key, products) in &input.pairs {
            pairs
                .entry(normalize_dealer_key(dealer_key))
                .or_default()
                .extend(products);
        }
    } else {
        info!("using legacy mode: every dealer × every product");
    }

    for dealer_key in dealer_keys(input) {
        let Some(dealer) = cache.get(&dealer_key).await else {
            warn!(dealer_key = %dealer_key, "dealer unresolved, dropping its work items");
            resolved.dropped_dealers.push(dealer_key);
            continue;
        };

        let products: Vec<&String> = if input.is_explicit() {
            pairs.get(dealer_key.as_str()).cloned().unwrap_or_default()
        } else {
            input.product_keys.iter().collect()
        };

        if products.is_empty() {
            warn!(dealer_key = %dealer_key, "dealer has no products in the input");
            continue;
        }

        resolved
            .items
            .extend(products.into_iter().map(|product_key| WorkItem {
                dealer: dealer.clone(),
                product_key: product_key.clone(),
            }));
    }

    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::model::Dealer;
    use crate::ports::DealerLookup;
    use async_trait::async_trait;

    struct KnownDealers(&'static [&'static str]);

    #[async_trait]
    impl DealerLookup for KnownDealers {
        async fn resolve_dealer(&self, external_key: &str) -> Result<Option<Dealer>> {
            Ok(self
                .0
                .iter()
                .position(|k| *k == external_key)
                .map(|i| Dealer {
                    id: i as i64 + 1,
                    external_key: external_key.to_string(),
                }))
        }
    }

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    async fn preloaded(input: &RunInput, known: &'static [&'static str]) -> DealerCache {
        let cache = DealerCache::new();
        cache.preload(&KnownDealers(known), dealer_keys(input)).await;
        cache
    }

    #[test]
    fn empty_dealer_key_becomes_sentinel() {
        let input = RunInput::cross(strings(&["", "12", "0", "12"]), vec![]);
        assert_eq!(dealer_keys(&input), strings(&["0", "12"]));
    }

    #[tokio::test]
    async fn explicit_pairs_take_precedence_over_lists() {
        let mut input = RunInput::cross(strings(&["1", "2"]), strings(&["X", "Y", "Z"]));
        input.pairs.insert("1".to_string(), strings(&["A", "B"]));
        let cache = preloaded(&input, &["1", "2"]).await;

        let resolved = resolve(&input, &cache).await;
        let keys: Vec<_> = resolved.items.iter().map(|i| i.product_key.as_str()).collect();
        assert_eq!(keys, vec!["A", "B"]);
        assert!(resolved.dropped_dealers.is_empty());
    }

    #[tokio::test]
    async fn legacy_mode_is_cross_product_minus_unresolved_dealers() {
        let input = RunInput::cross(strings(&["good", "bad"]), strings(&["P1", "P2", "P3"]));
        let cache = preloaded(&input, &["good"]).await;

        let resolved = resolve(&input, &cache).await;
        assert_eq!(resolved.items.len(), 3);
        assert!(resolved.items.iter().all(|i| i.dealer.external_key == "good"));
        assert_eq!(resolved.dropped_dealers, strings(&["bad"]));
    }

    #[tokio::test]
    async fn empty_key_in_pairs_merges_with_sentinel() {
        let mut pairs = BTreeMap::new();
        pairs.insert(String::new(), strings(&["A"]));
        pairs.insert("0".to_string(), strings(&["B"]));
        let input = RunInput::pairs(pairs);
        let cache = preloaded(&input, &["0"]).await;

        let resolved = resolve(&input, &cache).await;
        let keys: Vec<_> = resolved.items.iter().map(|i| i.product_key.as_str()).collect();
        assert_eq!(keys, vec!["A", "B"]);
    }
}
