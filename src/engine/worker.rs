//! Worker pool: drain the job queue, run the per-item pipeline, publish outcomes.

use std::sync::Arc;
use std::time::Instant;

use opentelemetry::KeyValue;
use tokio::sync::{Mutex, mpsc};
use tracing::{Instrument, debug, info, warn};

use super::batch::BatchWriter;
use super::progress::RunState;
use crate::model::{LinkRecord, OutcomeRecord, WorkItem};
use crate::ports::Store;
use crate::telemetry::metrics;
use crate::telemetry::run::{record_item_outcome, start_item_span};

pub const REASON_PRODUCT_NOT_FOUND: &str = "not found by external key";
pub const REASON_PRODUCT_LOOKUP: &str = "product lookup failed";
pub const REASON_LINK_BATCH: &str = "failed to create product-dealer link (batch)";
pub const REASON_COMMIT: &str = "commit failed";
pub const REASON_STAGING_QUERY: &str = "staging lookup failed";
pub const REASON_NOT_COMMITTED: &str = "record not found after commit";

/// Job queue shared by all workers. Each receive holds the lock only until
/// one item is taken.
pub type JobQueue = Arc<Mutex<mpsc::Receiver<WorkItem>>>;

/// Run the pipeline for one item.
///
/// Returns `None` when the link existence check errors: the item is logged
/// and left out of both result collections.
pub async fn process_item<S>(store: &S, batch: &BatchWriter<S>, item: &WorkItem) -> Option<OutcomeRecord>
where
    S: Store + ?Sized,
{
    let dealer_id = item.dealer.id;

    let products = match store.find_products(&item.product_key).await {
        Ok(products) => products,
        Err(e) => {
            warn!(product_key = %item.product_key, error = %e, "product lookup failed");
            return Some(
                OutcomeRecord::fail(dealer_id, None, REASON_PRODUCT_LOOKUP)
                    .with_external_key(&item.product_key),
            );
        }
    };
    let Some(product) = products.first() else {
        return Some(
            OutcomeRecord::fail(dealer_id, None, REASON_PRODUCT_NOT_FOUND)
                .with_external_key(&item.product_key),
        );
    };
    let product_id = product.id;

    let exists = match store.link_exists(product_id, dealer_id).await {
        Ok(exists) => exists,
        Err(e) => {
            warn!(product_id, dealer_id, error = %e, "link existence check failed, dropping item");
            metrics::items_dropped().add(1, &[KeyValue::new("stage", "existence_check")]);
            return None;
        }
    };

    if !exists {
        if let Err(e) = batch.add(LinkRecord::active(product_id, dealer_id)).await {
            warn!(product_id, dealer_id, error = %e, "could not queue product-dealer link");
            return Some(OutcomeRecord::fail(dealer_id, Some(product_id), REASON_LINK_BATCH));
        }
    }

    let start = Instant::now();
    let committed = store.commit(dealer_id, product_id).await;
    metrics::operation_duration_ms().record(
        start.elapsed().as_secs_f64() * 1000.0,
        &[KeyValue::new("operation", "integration.commit")],
    );
    if let Err(e) = committed {
        warn!(product_id, dealer_id, error = %e, "commit failed");
        return Some(OutcomeRecord::fail(dealer_id, Some(product_id), REASON_COMMIT));
    }

    // A commit that reports success is not trusted until its marker is visible.
    match store.find_staging(product_id, dealer_id).await {
        Ok(Some(_)) => Some(OutcomeRecord::ok(dealer_id, product_id)),
        Ok(None) => Some(OutcomeRecord::fail(dealer_id, Some(product_id), REASON_NOT_COMMITTED)),
        Err(e) => {
            warn!(product_id, dealer_id, error = %e, "staging lookup failed");
            Some(OutcomeRecord::fail(dealer_id, Some(product_id), REASON_STAGING_QUERY))
        }
    }
}

/// Consume jobs until the queue is closed and empty. Returns the number of
/// items this worker consumed.
pub async fn run_worker<S>(
    id: usize,
    store: Arc<S>,
    batch: Arc<BatchWriter<S>>,
    state: Arc<RunState>,
    jobs: JobQueue,
    results: mpsc::Sender<OutcomeRecord>,
) -> usize
where
    S: Store + ?Sized,
{
    let mut consumed = 0;
    loop {
        // Lock receiver, grab one item, release lock immediately
        let item = {
            let mut rx = jobs.lock().await;
            rx.recv().await
        };
        let Some(item) = item else {
            break;
        };

        let span = start_item_span(&item.dealer.external_key, &item.product_key);
        let outcome = process_item(store.as_ref(), &batch, &item)
            .instrument(span.clone())
            .await;
        consumed += 1;

        match outcome {
            Some(outcome) => {
                record_item_outcome(&span, &outcome);
                metrics::items_processed()
                    .add(1, &[KeyValue::new("status", outcome.status.to_string())]);
                if results.send(outcome).await.is_err() {
                    warn!(worker = id, "result queue closed, stopping worker");
                    break;
                }
            }
            None => state.record_dropped_item(),
        }

        if let Some(progress) = state.record_completed() {
            info!(
                processed = progress.processed,
                rate_per_sec = progress.rate_per_sec.round(),
                elapsed_secs = progress.elapsed.as_secs(),
                "progress"
            );
        }
    }

    debug!(worker = id, consumed, "worker finished");
    consumed
}
