//! In-memory collaborators shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use dealer_sync::error::{Error, Result};
use dealer_sync::model::{Dealer, LinkRecord, Product, StagingMarker};
use dealer_sync::ports::{
    DealerLookup, IntegrationCommit, LinkStore, Notifier, ProductLookup, StagingQuery,
};

/// A store whose contents and failure points are set up per test.
#[derive(Default)]
pub struct FakeStore {
    dealers: HashMap<String, i64>,
    dealer_errors: HashSet<String>,
    products: HashMap<String, Vec<i64>>,
    product_errors: HashSet<String>,
    exists_errors: HashSet<(i64, i64)>,
    commit_errors: HashSet<(i64, i64)>,
    /// Commits that report success but leave no staging marker.
    silent_commits: HashSet<(i64, i64)>,
    staging_errors: HashSet<(i64, i64)>,
    fail_create: bool,

    links: Mutex<Vec<LinkRecord>>,
    staging: Mutex<HashSet<(i64, i64)>>,
    dealer_calls: Mutex<HashMap<String, usize>>,
    create_calls: Mutex<Vec<usize>>,
    commits: AtomicUsize,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dealer(mut self, key: &str, id: i64) -> Self {
        self.dealers.insert(key.to_string(), id);
        self
    }

    pub fn dealer_error(mut self, key: &str) -> Self {
        self.dealer_errors.insert(key.to_string());
        self
    }

    pub fn product(mut self, key: &str, id: i64) -> Self {
        self.products.entry(key.to_string()).or_default().push(id);
        self
    }

    pub fn product_error(mut self, key: &str) -> Self {
        self.product_errors.insert(key.to_string());
        self
    }

    pub fn existing_link(self, product_id: i64, dealer_id: i64) -> Self {
        self.links
            .lock()
            .unwrap()
            .push(LinkRecord::active(product_id, dealer_id));
        self
    }

    pub fn exists_error(mut self, product_id: i64, dealer_id: i64) -> Self {
        self.exists_errors.insert((product_id, dealer_id));
        self
    }

    pub fn commit_error(mut self, dealer_id: i64, product_id: i64) -> Self {
        self.commit_errors.insert((dealer_id, product_id));
        self
    }

    pub fn silent_commit(mut self, dealer_id: i64, product_id: i64) -> Self {
        self.silent_commits.insert((dealer_id, product_id));
        self
    }

    pub fn staging_error(mut self, dealer_id: i64, product_id: i64) -> Self {
        self.staging_errors.insert((dealer_id, product_id));
        self
    }

    pub fn failing_create(mut self) -> Self {
        self.fail_create = true;
        self
    }

    pub fn dealer_lookups(&self, key: &str) -> usize {
        self.dealer_calls
            .lock()
            .unwrap()
            .get(key)
            .copied()
            .unwrap_or(0)
    }

    /// Size of every bulk-create call, in call order.
    pub fn create_calls(&self) -> Vec<usize> {
        self.create_calls.lock().unwrap().clone()
    }

    pub fn links(&self) -> Vec<LinkRecord> {
        self.links.lock().unwrap().clone()
    }

    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DealerLookup for FakeStore {
    async fn resolve_dealer(&self, external_key: &str) -> Result<Option<Dealer>> {
        *self
            .dealer_calls
            .lock()
            .unwrap()
            .entry(external_key.to_string())
            .or_default() += 1;
        if self.dealer_errors.contains(external_key) {
            return Err(Error::Other(format!("dealer lookup failed for {external_key}")));
        }
        Ok(self.dealers.get(external_key).map(|&id| Dealer {
            id,
            external_key: external_key.to_string(),
        }))
    }
}

#[async_trait]
impl ProductLookup for FakeStore {
    async fn find_products(&self, external_key: &str) -> Result<Vec<Product>> {
        if self.product_errors.contains(external_key) {
            return Err(Error::Other("connection reset".to_string()));
        }
        Ok(self
            .products
            .get(external_key)
            .map(|ids| {
                ids.iter()
                    .map(|&id| Product {
                        id,
                        external_key: external_key.to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl LinkStore for FakeStore {
    async fn link_exists(&self, product_id: i64, dealer_id: i64) -> Result<bool> {
        if self.exists_errors.contains(&(product_id, dealer_id)) {
            return Err(Error::Other("existence check timed out".to_string()));
        }
        Ok(self
            .links
            .lock()
            .unwrap()
            .iter()
            .any(|l| l.product_id == product_id && l.dealer_id == dealer_id))
    }

    async fn create_links(&self, records: &[LinkRecord]) -> Result<()> {
        self.create_calls.lock().unwrap().push(records.len());
        if self.fail_create {
            return Err(Error::Other("bulk insert rejected".to_string()));
        }
        self.links.lock().unwrap().extend_from_slice(records);
        Ok(())
    }
}

#[async_trait]
impl IntegrationCommit for FakeStore {
    async fn commit(&self, dealer_id: i64, product_id: i64) -> Result<()> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        if self.commit_errors.contains(&(dealer_id, product_id)) {
            return Err(Error::Other("commit procedure raised".to_string()));
        }
        if !self.silent_commits.contains(&(dealer_id, product_id)) {
            self.staging.lock().unwrap().insert((dealer_id, product_id));
        }
        Ok(())
    }
}

#[async_trait]
impl StagingQuery for FakeStore {
    async fn find_staging(&self, product_id: i64, dealer_id: i64) -> Result<Option<StagingMarker>> {
        if self.staging_errors.contains(&(dealer_id, product_id)) {
            return Err(Error::Other("staging query failed".to_string()));
        }
        let found = self.staging.lock().unwrap().contains(&(dealer_id, product_id));
        Ok(found.then_some(StagingMarker {
            product_id,
            dealer_id,
        }))
    }
}

/// Records every payload; optionally fails each send. With a watched store
/// it also snapshots the store's bulk-create calls at each send.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<String>>,
    pub fail: bool,
    watched: Option<Arc<FakeStore>>,
    creates_at_send: Mutex<Vec<Vec<usize>>>,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn watching(store: Arc<FakeStore>) -> Self {
        Self {
            watched: Some(store),
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    /// `create_calls()` of the watched store as seen by each send.
    pub fn creates_at_send(&self) -> Vec<Vec<usize>> {
        self.creates_at_send.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, payload: &str) -> Result<()> {
        if let Some(ref store) = self.watched {
            self.creates_at_send.lock().unwrap().push(store.create_calls());
        }
        self.sent.lock().unwrap().push(payload.to_string());
        if self.fail {
            return Err(Error::Queue("broker unavailable".to_string()));
        }
        Ok(())
    }
}
