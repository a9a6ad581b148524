//! Structured events emitted by a queue on every slot transition.
//!
//! Observers subscribe via [`DelayedQueue::subscribe`](crate::queue::DelayedQueue::subscribe)
//! to build dashboards or to audit ordering. Events are the queue's voice;
//! the caller's own continuation is what runs when a slot is released.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::model::{QueueId, SlotId};

/// Buffered events per subscriber before it starts lagging.
pub const EVENT_CAPACITY: usize = 256;

/// A structured event emitted by a queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEvent {
    /// Monotonic sequence number per queue. Consumers can detect gaps.
    pub seq: u64,
    /// When this event occurred.
    pub timestamp: DateTime<Utc>,
    /// Which queue emitted it.
    pub queue: QueueId,
    /// What happened.
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// Appended to `pending`.
    SlotEnqueued {
        slot: SlotId,
        delay_ms: u64,
        pending: usize,
    },
    /// Popped from `pending`; its timer is now armed.
    SlotStarted {
        slot: SlotId,
        delay_ms: u64,
        pending: usize,
    },
    /// Completion resolved; the queue is idle again.
    SlotReleased { slot: SlotId, waited_ms: u64 },
    /// Timer dropped unfired (its runtime shut down). The queue is idle
    /// again and the completion resolves as abandoned.
    SlotAbandoned { slot: SlotId },
}

impl EventKind {
    pub fn slot(&self) -> SlotId {
        match self {
            EventKind::SlotEnqueued { slot, .. }
            | EventKind::SlotStarted { slot, .. }
            | EventKind::SlotReleased { slot, .. }
            | EventKind::SlotAbandoned { slot } => *slot,
        }
    }
}

/// Sequenced broadcast of a single queue's events.
#[derive(Debug)]
pub(crate) struct EventStream {
    queue: QueueId,
    next_seq: u64,
    tx: broadcast::Sender<QueueEvent>,
}

impl EventStream {
    pub(crate) fn new(queue: QueueId) -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            queue,
            next_seq: 0,
            tx,
        }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.tx.subscribe()
    }

    /// Emit an event. Having no subscribers is fine.
    pub(crate) fn emit(&mut self, kind: EventKind) {
        self.next_seq += 1;
        let _ = self.tx.send(QueueEvent {
            seq: self.next_seq,
            timestamp: Utc::now(),
            queue: self.queue,
            kind,
        });
    }
}
