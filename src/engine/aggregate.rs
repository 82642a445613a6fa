//! Result aggregation: the single consumer of the result queue.

use tokio::sync::mpsc;

use crate::model::{OutcomeRecord, Report};

/// Drain the result queue into a report, partitioned by status.
///
/// Returns once every sender is gone. No ordering is kept, not even within
/// one dealer's items.
pub async fn collect(mut results: mpsc::Receiver<OutcomeRecord>) -> Report {
    let mut report = Report::default();
    while let Some(outcome) = results.recv().await {
        if outcome.is_ok() {
            report.success.push(outcome);
        } else {
            report.failure.push(outcome);
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn partitions_by_status_until_closed() {
        let (tx, rx) = mpsc::channel(4);
        let handle = tokio::spawn(collect(rx));

        tx.send(OutcomeRecord::ok(1, 10)).await.unwrap();
        tx.send(OutcomeRecord::fail(1, None, "nope")).await.unwrap();
        tx.send(OutcomeRecord::ok(2, 20)).await.unwrap();
        drop(tx);

        let report = handle.await.unwrap();
        assert_eq!(report.success.len(), 2);
        assert_eq!(report.failure.len(), 1);
        assert_eq!(report.failure[0].reason.as_deref(), Some("nope"));
    }
}
