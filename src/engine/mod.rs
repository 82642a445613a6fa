//! Reconciliation engine.
//!
//! One [`Engine::run`] resolves the input into work items, fans them out to a
//! fixed pool of workers over a bounded job queue, and fans outcomes back in
//! over a bounded result queue. Shutdown order is fixed: close the job
//! queue, join every worker, close the result queue, flush the remaining
//! link batch, collect the report, then notify downstream.

pub mod aggregate;
pub mod batch;
pub mod cache;
pub mod progress;
pub mod resolve;
pub mod worker;

use std::sync::Arc;
use std::time::Duration;

use opentelemetry::KeyValue;
use tokio::sync::{Mutex, mpsc};
use tracing::{Instrument, error, info, warn};

use crate::error::{Error, Result};
use crate::model::{Report, RunId, RunInput};
use crate::ports::{Notifier, Store};
use crate::telemetry::metrics;
use crate::telemetry::run::start_run_span;

use self::batch::{BatchWriter, DEFAULT_BATCH_SIZE};
use self::cache::DealerCache;
use self::progress::RunState;

pub use self::aggregate::collect;
pub use self::worker::{
    REASON_COMMIT, REASON_LINK_BATCH, REASON_NOT_COMMITTED, REASON_PRODUCT_LOOKUP,
    REASON_PRODUCT_NOT_FOUND, REASON_STAGING_QUERY,
};

/// Upper bound on job and result queue capacity.
pub const DEFAULT_QUEUE_CAP: usize = 1000;

/// Payload sent downstream once a run completes.
pub const DEFAULT_NOTIFY_PAYLOAD: &str = "move";

/// Engine tuning.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Concurrent workers.
    pub workers: usize,
    /// Link records per bulk create.
    pub batch_size: usize,
    /// Cap on queue capacity; the actual size is min(work items, cap).
    pub queue_cap: usize,
    /// Minimum wall-clock gap between progress reports.
    pub progress_interval: Duration,
    pub notify_payload: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            batch_size: DEFAULT_BATCH_SIZE,
            queue_cap: DEFAULT_QUEUE_CAP,
            progress_interval: Duration::from_secs(5),
            notify_payload: DEFAULT_NOTIFY_PAYLOAD.to_string(),
        }
    }
}

/// Twice the available parallelism, never fewer than four.
pub fn default_workers() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(usize::from)
        .unwrap_or(1);
    (cpus * 2).max(4)
}

/// Counters captured at the end of a run.
#[derive(Debug, Clone)]
pub struct RunStats {
    pub run_id: RunId,
    pub work_items: usize,
    pub processed: u64,
    pub dropped_dealers: u64,
    /// Items left out of the report because the existence check errored.
    pub dropped_items: u64,
    pub links_flushed: u64,
    /// Links still buffered after the trailing flush (non-zero only if it failed).
    pub links_pending: usize,
    pub elapsed: Duration,
}

/// What a run returns: the report plus its statistics.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub report: Report,
    pub stats: RunStats,
}

/// The reconciliation engine. Holds collaborators only; every piece of
/// mutable run state is created inside [`Engine::run`].
pub struct Engine<S: ?Sized> {
    store: Arc<S>,
    notifier: Arc<dyn Notifier>,
    config: EngineConfig,
}

impl<S: ?Sized> Clone for Engine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            notifier: Arc::clone(&self.notifier),
            config: self.config.clone(),
        }
    }
}

impl<S> Engine<S>
where
    S: Store + ?Sized + 'static,
{
    pub fn new(store: Arc<S>, notifier: Arc<dyn Notifier>, config: EngineConfig) -> Self {
        Self {
            store,
            notifier,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Process every work item the input resolves to and report outcomes.
    ///
    /// Per-item, batch and notification failures are absorbed; the only
    /// error is an internal task failure of the aggregator.
    pub async fn run(&self, input: RunInput) -> Result<RunOutcome> {
        let run_id = RunId::new();
        let workers = self.config.workers.max(1);
        let span = start_run_span(run_id, workers);
        self.run_inner(run_id, workers, input)
            .instrument(span)
            .await
    }

    async fn run_inner(&self, run_id: RunId, workers: usize, input: RunInput) -> Result<RunOutcome> {
        let state = Arc::new(RunState::new(self.config.progress_interval));
        info!(%run_id, workers, "starting run");

        // Preload the dealer cache, then expand the input.
        let cache = DealerCache::new();
        let dealer_keys = resolve::dealer_keys(&input);
        cache.preload(self.store.as_ref(), &dealer_keys).await;
        let resolved = resolve::resolve(&input, &cache).await;
        if !resolved.dropped_dealers.is_empty() {
            state.record_dropped_dealers(resolved.dropped_dealers.len() as u64);
            metrics::items_dropped().add(
                resolved.dropped_dealers.len() as u64,
                &[KeyValue::new("stage", "dealer_lookup")],
            );
        }

        let work_items = resolved.items.len();
        tracing::Span::current().record("run.items", work_items);
        let capacity = work_items.min(self.config.queue_cap).max(1);

        let (job_tx, job_rx) = mpsc::channel(capacity);
        let (result_tx, result_rx) = mpsc::channel(capacity);
        let jobs: worker::JobQueue = Arc::new(Mutex::new(job_rx));
        let batch = Arc::new(BatchWriter::new(Arc::clone(&self.store), self.config.batch_size));

        let aggregator = tokio::spawn(aggregate::collect(result_rx));

        let mut handles = Vec::with_capacity(workers);
        for id in 1..=workers {
            handles.push(tokio::spawn(
                worker::run_worker(
                    id,
                    Arc::clone(&self.store),
                    Arc::clone(&batch),
                    Arc::clone(&state),
                    Arc::clone(&jobs),
                    result_tx.clone(),
                )
                .in_current_span(),
            ));
        }

        for item in resolved.items {
            if job_tx.send(item).await.is_err() {
                error!("job queue closed before all items were sent");
                break;
            }
        }
        info!(work_items, "all work items queued");
        drop(job_tx);

        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "worker task failed");
            }
        }
        // Last sender: the result queue closes only after every worker exited.
        drop(result_tx);

        if let Err(e) = batch.flush().await {
            error!(error = %e, "trailing link flush failed");
        }

        let report = aggregator
            .await
            .map_err(|e| Error::Other(format!("result aggregator failed: {e}")))?;

        match self.notifier.send(&self.config.notify_payload).await {
            Ok(()) => {
                metrics::notifications().add(1, &[KeyValue::new("result", "ok")]);
            }
            Err(e) => {
                warn!(error = %e, "completion notification failed");
                metrics::notifications().add(1, &[KeyValue::new("result", "error")]);
            }
        }

        let stats = RunStats {
            run_id,
            work_items,
            processed: state.processed(),
            dropped_dealers: state.dropped_dealers(),
            dropped_items: state.dropped_items(),
            links_flushed: batch.flushed(),
            links_pending: batch.pending().await,
            elapsed: state.elapsed(),
        };

        info!(
            %run_id,
            work_items,
            success = report.success.len(),
            failure = report.failure.len(),
            dropped_items = stats.dropped_items,
            dropped_dealers = stats.dropped_dealers,
            links_flushed = stats.links_flushed,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "run finished"
        );

        Ok(RunOutcome { report, stats })
    }
}
