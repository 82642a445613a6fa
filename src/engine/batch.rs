//! Batch writer for newly discovered product-dealer links.
//!
//! Records accumulate under a single mutex that guards both append and
//! flush. Reaching the batch size flushes synchronously inside `add`, so the
//! worker that filled the batch waits for the bulk write. A failed flush
//! keeps the buffer for the next attempt.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use opentelemetry::KeyValue;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::error::Result;
use crate::model::LinkRecord;
use crate::ports::LinkStore;
use crate::telemetry::metrics;

pub const DEFAULT_BATCH_SIZE: usize = 100;

pub struct BatchWriter<S: ?Sized> {
    store: Arc<S>,
    batch_size: usize,
    pending: Mutex<Vec<LinkRecord>>,
    flushed: AtomicU64,
}

impl<S: LinkStore + ?Sized> BatchWriter<S> {
    pub fn new(store: Arc<S>, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            store,
            batch_size,
            pending: Mutex::new(Vec::with_capacity(batch_size)),
            flushed: AtomicU64::new(0),
        }
    }

    /// Append a record, flushing when the batch is full.
    ///
    /// An error means the automatic flush failed; the record stays buffered.
    pub async fn add(&self, record: LinkRecord) -> Result<()> {
        let mut pending = self.pending.lock().await;
        pending.push(record);
        if pending.len() >= self.batch_size {
            self.flush_locked(&mut pending).await?;
        }
        Ok(())
    }

    /// Write everything buffered. No-op on an empty buffer.
    /// Returns the number of records written.
    pub async fn flush(&self) -> Result<usize> {
        let mut pending = self.pending.lock().await;
        self.flush_locked(&mut pending).await
    }

    async fn flush_locked(&self, pending: &mut Vec<LinkRecord>) -> Result<usize> {
        if pending.is_empty() {
            return Ok(0);
        }

        let count = pending.len();
        let start = Instant::now();
        info!(count, "flushing product-dealer link batch");

        if let Err(e) = self.store.create_links(pending).await {
            error!(count, error = %e, "link batch flush failed, keeping records for the next flush");
            metrics::links_flushed().add(count as u64, &[KeyValue::new("result", "error")]);
            return Err(e);
        }

        pending.clear();
        self.flushed.fetch_add(count as u64, Ordering::Relaxed);
        metrics::links_flushed().add(count as u64, &[KeyValue::new("result", "ok")]);
        metrics::operation_duration_ms().record(
            start.elapsed().as_secs_f64() * 1000.0,
            &[KeyValue::new("operation", "links.create")],
        );
        Ok(count)
    }

    /// Records waiting for the next flush.
    pub async fn pending(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Records successfully written so far.
    pub fn flushed(&self) -> u64 {
        self.flushed.load(Ordering::Relaxed)
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicBool;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct RecordingLinks {
        calls: StdMutex<Vec<Vec<LinkRecord>>>,
        fail: AtomicBool,
    }

    #[async_trait]
    impl LinkStore for RecordingLinks {
        async fn link_exists(&self, _product_id: i64, _dealer_id: i64) -> Result<bool> {
            Ok(false)
        }

        async fn create_links(&self, records: &[LinkRecord]) -> Result<()> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(Error::Other("insert rejected".to_string()));
            }
            self.calls.lock().unwrap().push(records.to_vec());
            Ok(())
        }
    }

    #[tokio::test]
    async fn threshold_flush_then_trailing_flush() {
        let store = Arc::new(RecordingLinks::default());
        let writer = BatchWriter::new(Arc::clone(&store), 2);

        writer.add(LinkRecord::active(1, 10)).await.unwrap();
        writer.add(LinkRecord::active(2, 10)).await.unwrap();
        writer.add(LinkRecord::active(3, 10)).await.unwrap();
        assert_eq!(writer.pending().await, 1);

        assert_eq!(writer.flush().await.unwrap(), 1);

        let calls = store.calls.lock().unwrap().clone();
        assert_eq!(calls.iter().map(Vec::len).collect::<Vec<_>>(), vec![2, 1]);
        assert_eq!(writer.flushed(), 3);
    }

    #[tokio::test]
    async fn empty_flush_does_not_call_store() {
        let store = Arc::new(RecordingLinks::default());
        let writer = BatchWriter::new(Arc::clone(&store), 10);

        assert_eq!(writer.flush().await.unwrap(), 0);
        assert!(store.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_flush_keeps_buffer() {
        let store = Arc::new(RecordingLinks::default());
        store.fail.store(true, Ordering::SeqCst);
        let writer = BatchWriter::new(Arc::clone(&store), 1);

        assert!(writer.add(LinkRecord::active(1, 10)).await.is_err());
        assert_eq!(writer.pending().await, 1);

        store.fail.store(false, Ordering::SeqCst);
        assert_eq!(writer.flush().await.unwrap(), 1);
        assert_eq!(writer.pending().await, 0);
        assert_eq!(store.calls.lock().unwrap().len(), 1);
    }
}
