//! Capability interfaces the engine consumes.
//!
//! The engine never talks to a database or a message broker directly; it
//! depends on these narrow traits. `db::store::PgStore` implements the store
//! side, `db::pgmq::PgmqNotifier` the notification side, and tests provide
//! in-memory fakes.

use async_trait::async_trait;
use tracing::info;

use crate::error::{Error, Result};
use crate::model::{Dealer, LinkRecord, Product, StagingMarker};

/// Resolve a dealer by its external code.
#[async_trait]
pub trait DealerLookup: Send + Sync {
    /// `Ok(None)` when no dealer carries the key.
    async fn resolve_dealer(&self, external_key: &str) -> Result<Option<Dealer>>;
}

/// Resolve products by barcode-like external key.
#[async_trait]
pub trait ProductLookup: Send + Sync {
    /// Matches in a stable order; callers use the first.
    async fn find_products(&self, external_key: &str) -> Result<Vec<Product>>;
}

/// Product-dealer link persistence.
#[async_trait]
pub trait LinkStore: Send + Sync {
    async fn link_exists(&self, product_id: i64, dealer_id: i64) -> Result<bool>;

    /// Persist all records in one bulk operation.
    async fn create_links(&self, records: &[LinkRecord]) -> Result<()>;
}

/// The side-effecting commit for one (dealer, product) pair.
#[async_trait]
pub trait IntegrationCommit: Send + Sync {
    async fn commit(&self, dealer_id: i64, product_id: i64) -> Result<()>;
}

/// Lookup of the marker a successful commit leaves behind.
#[async_trait]
pub trait StagingQuery: Send + Sync {
    async fn find_staging(&self, product_id: i64, dealer_id: i64) -> Result<Option<StagingMarker>>;
}

/// Everything the engine needs from the backing store.
pub trait Store: DealerLookup + ProductLookup + LinkStore + IntegrationCommit + StagingQuery {}

impl<T> Store for T where T: DealerLookup + ProductLookup + LinkStore + IntegrationCommit + StagingQuery {}

/// Downstream completion signal.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, payload: &str) -> Result<()>;
}

/// Stand-in used when the real channel was unreachable at construction.
/// Logs what it would have sent.
#[derive(Debug, Clone)]
pub struct NoopNotifier {
    pub queue: String,
}

impl NoopNotifier {
    pub fn new(queue: impl Into<String>) -> Self {
        Self {
            queue: queue.into(),
        }
    }
}

#[async_trait]
impl Notifier for NoopNotifier {
    async fn send(&self, payload: &str) -> Result<()> {
        if payload.is_empty() {
            return Err(Error::Queue("refusing to send empty payload".to_string()));
        }
        info!(queue = %self.queue, payload, "notification skipped (no queue connection)");
        Ok(())
    }
}
