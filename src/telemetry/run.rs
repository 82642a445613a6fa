//! Run and work-item span helpers.

use tracing::Span;

use crate::model::{OutcomeRecord, RunId};

/// Start the span covering one engine run.
pub fn start_run_span(run_id: RunId, workers: usize) -> Span {
    tracing::info_span!(
        "sync.run",
        "run.id" = %run_id,
        "run.workers" = workers,
        "run.items" = tracing::field::Empty,
    )
}

/// Start a span for one work item.
///
/// The `item.status` and `item.reason` fields are declared empty and are
/// filled by [`record_item_outcome`].
pub fn start_item_span(dealer_key: &str, product_key: &str) -> Span {
    tracing::debug_span!(
        "sync.item",
        "item.dealer" = dealer_key,
        "item.product" = product_key,
        "item.status" = tracing::field::Empty,
        "item.reason" = tracing::field::Empty,
    )
}

/// Record the outcome of a work item on its span.
pub fn record_item_outcome(span: &Span, outcome: &OutcomeRecord) {
    span.record("item.status", tracing::field::display(outcome.status));
    if let Some(ref reason) = outcome.reason {
        span.record("item.reason", reason.as_str());
    }
}
