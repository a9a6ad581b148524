//! Metric instrument factories for delayq.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! Without one installed the instruments are no-ops.

use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Histogram, Meter};

use crate::model::QueueId;

fn meter() -> Meter {
    opentelemetry::global::meter("delayq")
}

/// Common label set for per-queue instruments.
pub fn queue_labels(queue: &QueueId) -> [KeyValue; 1] {
    [KeyValue::new("queue", queue.to_string())]
}

/// Counter: slots appended to a queue.
/// Labels: `queue`.
pub fn slots_enqueued() -> Counter<u64> {
    meter()
        .u64_counter("delayq.slots.enqueued")
        .with_description("Number of slots enqueued")
        .build()
}

/// Counter: slots whose completion was resolved.
/// Labels: `queue`.
pub fn slots_released() -> Counter<u64> {
    meter()
        .u64_counter("delayq.slots.released")
        .with_description("Number of slots released to their waiters")
        .build()
}

/// Histogram: time from enqueue to release, in milliseconds.
/// Labels: `queue`.
pub fn slot_wait_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("delayq.slot.wait_ms")
        .with_description("Time from enqueue to release")
        .with_unit("ms")
        .build()
}
