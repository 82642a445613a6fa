//! pgmq queue operations via direct SQLx, and the completion notifier
//! built on them.
//!
//! Calls pgmq's SQL functions pgmq.create and pgmq.send. Consumers read the
//! queue on their side.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use super::Db;
use crate::error::{Error, Result};
use crate::ports::{NoopNotifier, Notifier};

/// Default queue receiving the completion signal.
pub const DEFAULT_NOTIFY_QUEUE: &str = "integration";

impl Db {
    /// Create a pgmq queue (idempotent).
    pub async fn create_queue(&self, queue_name: &str) -> Result<()> {
        sqlx::query("SELECT pgmq.create($1)")
            .bind(queue_name)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Send a message to a pgmq queue. Returns the message ID.
    /// delay_seconds: 0 for immediate, >0 for delayed delivery.
    pub async fn send_to_queue(
        &self,
        queue_name: &str,
        payload: &serde_json::Value,
        delay_seconds: i32,
    ) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT pgmq.send($1, $2, $3)")
            .bind(queue_name)
            .bind(payload)
            .bind(delay_seconds)
            .fetch_one(self.pool())
            .await?;
        Ok(row.0)
    }
}

/// Sends the completion signal as a JSON string message on a pgmq queue.
#[derive(Debug, Clone)]
pub struct PgmqNotifier {
    db: Arc<Db>,
    queue: String,
}

impl PgmqNotifier {
    /// Ensure the queue exists and return a notifier for it.
    ///
    /// If the queue cannot be created (no pgmq extension, permissions, ...)
    /// the returned notifier is a [`NoopNotifier`] and runs proceed without
    /// a downstream signal.
    pub async fn connect(db: Arc<Db>, queue: &str) -> Arc<dyn Notifier> {
        match db.create_queue(queue).await {
            Ok(()) => {
                info!(queue, "notification queue ready");
                Arc::new(Self {
                    db,
                    queue: queue.to_string(),
                })
            }
            Err(e) => {
                warn!(queue, error = %e, "notification queue unavailable, notifications disabled");
                Arc::new(NoopNotifier::new(queue))
            }
        }
    }
}

#[async_trait]
impl Notifier for PgmqNotifier {
    async fn send(&self, payload: &str) -> Result<()> {
        if payload.is_empty() {
            return Err(Error::Queue("refusing to send empty payload".to_string()));
        }

        let msg_id = self
            .db
            .send_to_queue(&self.queue, &serde_json::json!(payload), 0)
            .await
            .map_err(|e| Error::Queue(format!("send to '{}' failed: {e}", self.queue)))?;

        info!(queue = %self.queue, msg_id, payload, "notification sent");
        Ok(())
    }
}
