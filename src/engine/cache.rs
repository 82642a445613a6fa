//! Dealer cache: resolve each dealer key once per run.

use std::collections::HashMap;

use opentelemetry::KeyValue;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::model::Dealer;
use crate::ports::DealerLookup;
use crate::telemetry::metrics;

/// Memoized dealer resolution keyed by external key.
///
/// Misses are cached too (as `None`) so a key that failed to resolve is
/// never looked up again within the same run. Population happens before any
/// worker exists, but all access still goes through the lock.
#[derive(Debug, Default)]
pub struct DealerCache {
    entries: RwLock<HashMap<String, Option<Dealer>>>,
}

impl DealerCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve every key not yet cached. Returns how many keys resolved to a dealer.
    pub async fn preload<L, I, K>(&self, lookup: &L, keys: I) -> usize
    where
        L: DealerLookup + ?Sized,
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let mut found = 0;
        for key in keys {
            let key = key.as_ref();
            if let Some(cached) = self.entries.read().await.get(key) {
                found += usize::from(cached.is_some());
                continue;
            }

            let resolved = match lookup.resolve_dealer(key).await {
                Ok(Some(dealer)) => {
                    debug!(dealer_key = key, dealer_id = dealer.id, "dealer resolved");
                    metrics::dealer_lookups().add(1, &[KeyValue::new("result", "found")]);
                    found += 1;
                    Some(dealer)
                }
                Ok(None) => {
                    warn!(dealer_key = key, "dealer not found, skipping its work items");
                    metrics::dealer_lookups().add(1, &[KeyValue::new("result", "missing")]);
                    None
                }
                Err(e) => {
                    warn!(dealer_key = key, error = %e, "dealer lookup failed, skipping its work items");
                    metrics::dealer_lookups().add(1, &[KeyValue::new("result", "error")]);
                    None
                }
            };

            self.entries.write().await.insert(key.to_string(), resolved);
        }
        found
    }

    /// The cached dealer, if the key resolved.
    pub async fn get(&self, key: &str) -> Option<Dealer> {
        self.entries.read().await.get(key).cloned().flatten()
    }

    /// Number of keys looked up so far, hits and misses alike.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
