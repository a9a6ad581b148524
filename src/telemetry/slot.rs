//! Slot execution span helpers.
//!
//! One span per popped slot, covering the armed timer through release.

use tracing::Span;

use crate::model::{QueueId, SlotId};

/// Start a span for a slot's in-flight window.
pub fn start_slot_span(queue: &QueueId, slot: SlotId, delay_ms: u64) -> Span {
    tracing::info_span!(
        "slot.execute",
        "queue.id" = %queue,
        "slot.id" = slot.0,
        "slot.delay_ms" = delay_ms,
    )
}

/// Record a slot state transition on the given span.
///
/// Emits a tracing `info` event scoped to the span.
pub fn record_state_transition(span: &Span, from: &str, to: &str) {
    span.in_scope(|| {
        tracing::info!(from = from, to = to, "state_transition");
    });
}
