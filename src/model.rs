//! Core data model.
//!
//! A queue hands out slots. Each slot waits in FIFO order, then runs its
//! delay while holding the queue's single in-flight position, then releases
//! its waiter.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Newtype for queue instance IDs. Used to correlate logs, spans and events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueueId(pub Uuid);

impl QueueId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for QueueId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Short display: first 8 chars of UUID
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

impl Default for QueueId {
    fn default() -> Self {
        Self::new()
    }
}

/// Position of a slot within its queue. Assigned at enqueue, starting at 1.
///
/// Release order always matches `SlotId` order within one queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SlotId(pub u64);

impl std::fmt::Display for SlotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// Scheduling phase of a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Nothing in flight. `advance()` may start the next slot.
    Idle,
    /// One slot's timer is armed. `advance()` is a no-op until it fires.
    Draining,
}

impl Phase {
    /// Can transition from self to `to`?
    ///
    /// `Draining -> Draining` is not a direct edge: a release always passes
    /// through `Idle`, even when auto-advance restarts immediately.
    pub fn can_transition_to(self, to: Phase) -> bool {
        use Phase::*;
        matches!(
            (self, to),
            (Idle, Draining)
                | (Idle, Idle)      // advance with nothing pending
                | (Draining, Idle)
        )
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Phase::Idle => "idle",
            Phase::Draining => "draining",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Point-in-time snapshot of a queue's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Slots waiting in `pending`. Excludes the in-flight slot.
    pub pending: usize,
    pub phase: Phase,
    /// The slot whose timer is armed, if any.
    pub in_flight: Option<SlotId>,
    /// Total slots ever enqueued.
    pub enqueued: u64,
    /// Total slots whose completion has been resolved.
    pub released: u64,
}

/// Whole milliseconds in `d`, saturating.
pub(crate) fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
