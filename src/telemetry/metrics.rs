//! Metric instrument factories for dealer-sync.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! All instruments are created lazily from the `"dealer-sync"` meter.
//! Without an OTLP endpoint the global provider is a no-op.

use opentelemetry::metrics::{Counter, Histogram, Meter};

/// Returns the shared meter for dealer-sync instruments.
fn meter() -> Meter {
    opentelemetry::global::meter("dealer-sync")
}

/// Counter: work items that produced an outcome.
/// Labels: `status` ("ok" | "fail").
pub fn items_processed() -> Counter<u64> {
    meter()
        .u64_counter("dealer_sync.items.processed")
        .with_description("Work items that produced an outcome")
        .build()
}

/// Counter: work items or dealers excluded from the report.
/// Labels: `stage` ("dealer_lookup" | "existence_check").
pub fn items_dropped() -> Counter<u64> {
    meter()
        .u64_counter("dealer_sync.items.dropped")
        .with_description("Work items excluded from both result collections")
        .build()
}

/// Counter: link records written by bulk flushes.
/// Labels: `result` ("ok" | "error").
pub fn links_flushed() -> Counter<u64> {
    meter()
        .u64_counter("dealer_sync.links.flushed")
        .with_description("Product-dealer links handed to bulk create")
        .build()
}

/// Counter: dealer lookups performed during cache preload.
/// Labels: `result` ("found" | "missing" | "error").
pub fn dealer_lookups() -> Counter<u64> {
    meter()
        .u64_counter("dealer_sync.dealer.lookups")
        .with_description("Dealer lookups against the store")
        .build()
}

/// Counter: completion notifications.
/// Labels: `result` ("ok" | "error").
pub fn notifications() -> Counter<u64> {
    meter()
        .u64_counter("dealer_sync.notifications")
        .with_description("Completion notifications sent downstream")
        .build()
}

/// Histogram: operation duration in milliseconds.
/// Labels: `operation`.
pub fn operation_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("dealer_sync.operation.duration_ms")
        .with_description("Operation duration in milliseconds")
        .with_unit("ms")
        .build()
}
