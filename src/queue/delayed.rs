//! The delayed queue: FIFO slots, one in flight at a time.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::{broadcast, oneshot};
use tokio::time::Instant;
use tracing::{Instrument, Span, debug, warn};

use crate::config::QueueConfig;
use crate::error::{Error, Result};
use crate::event::{EventKind, EventStream, QueueEvent};
use crate::model::{Phase, QueueId, QueueStats, SlotId, duration_ms};
use crate::telemetry::metrics;
use crate::telemetry::slot::{record_state_transition, start_slot_span};

use super::completion::Completion;

/// A sequential delayed queue.
///
/// Callers [`enqueue`](Self::enqueue) slots and await the returned
/// [`Completion`]. Slots are released strictly in the order they were
/// enqueued. Only one slot is ever in flight: it is popped, its delay runs
/// on a tokio timer, and its completion resolves when the timer fires. A
/// slot's delay counts from the moment it starts, not from when it was
/// enqueued, so a long delay ahead of a short one holds the short one back.
///
/// With `auto_advance` the queue drains itself. Without it, the caller
/// starts each slot with [`advance`](Self::advance), typically right after
/// awaiting the previous completion:
///
/// ```no_run
/// # async fn demo() -> delayq::error::Result<()> {
/// use delayq::{DelayedQueue, QueueConfig};
/// use std::time::Duration;
///
/// let queue = DelayedQueue::new(QueueConfig::default())?;
/// let first = queue.enqueue(Some(Duration::from_millis(1000)));
/// let second = queue.enqueue(Some(Duration::from_millis(100)));
///
/// queue.advance();
/// first.await?;
/// queue.advance();
/// second.await?;
/// # Ok(())
/// # }
/// ```
///
/// Cloning yields another handle to the same queue. Pending slots are
/// dropped, and their completions abandoned, once every handle and any
/// armed timer are gone.
#[derive(Clone)]
pub struct DelayedQueue {
    shared: Arc<Shared>,
}

struct Shared {
    id: QueueId,
    config: QueueConfig,
    runtime: Handle,
    state: Mutex<State>,
}

struct State {
    pending: VecDeque<Slot>,
    /// `Some` iff a slot's timer is armed. This is the queue's busy flag.
    in_flight: Option<SlotId>,
    last_slot: u64,
    enqueued: u64,
    released: u64,
    events: EventStream,
}

struct Slot {
    id: SlotId,
    delay: Duration,
    enqueued_at: Instant,
    tx: oneshot::Sender<()>,
}

impl State {
    fn phase(&self) -> Phase {
        if self.in_flight.is_some() {
            Phase::Draining
        } else {
            Phase::Idle
        }
    }
}

impl DelayedQueue {
    /// Create a queue whose timers run on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// [`Error::NoRuntime`] when called outside a tokio runtime.
    pub fn new(config: QueueConfig) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| Error::NoRuntime)?;
        Ok(Self::with_handle(config, runtime))
    }

    /// Create a queue whose timers run on the given runtime.
    pub fn with_handle(config: QueueConfig, runtime: Handle) -> Self {
        let id = QueueId::new();
        debug!(
            queue = %id,
            auto_advance = config.auto_advance,
            default_delay_ms = config.default_delay_ms,
            "queue created"
        );
        Self {
            shared: Arc::new(Shared {
                id,
                config,
                runtime,
                state: Mutex::new(State {
                    pending: VecDeque::new(),
                    in_flight: None,
                    last_slot: 0,
                    enqueued: 0,
                    released: 0,
                    events: EventStream::new(id),
                }),
            }),
        }
    }

    /// Append a slot and return its completion.
    ///
    /// `delay` overrides the queue's default delay for this slot only. A
    /// zero delay is valid; the slot still goes through the timer.
    /// With `auto_advance`, this also tries to start the next slot.
    pub fn enqueue(&self, delay: Option<Duration>) -> Completion {
        let shared = &self.shared;
        let delay = shared.config.delay_or_default(delay);
        let (tx, rx) = oneshot::channel();

        let mut state = shared.lock();
        state.last_slot += 1;
        state.enqueued += 1;
        let slot = SlotId(state.last_slot);
        state.pending.push_back(Slot {
            id: slot,
            delay,
            enqueued_at: Instant::now(),
            tx,
        });

        let pending = state.pending.len();
        let delay_ms = duration_ms(delay);
        state.events.emit(EventKind::SlotEnqueued {
            slot,
            delay_ms,
            pending,
        });
        metrics::slots_enqueued().add(1, &metrics::queue_labels(&shared.id));
        debug!(queue = %shared.id, %slot, delay_ms, pending, "slot enqueued");

        let next = if shared.config.auto_advance {
            shared.start_next(&mut state)
        } else {
            None
        };
        drop(state);
        if let Some(next) = next {
            next.spawn();
        }

        Completion::new(slot, rx)
    }

    /// Like [`enqueue`](Self::enqueue), taking a signed millisecond delay.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidDelay`] for a negative delay. Nothing is enqueued.
    pub fn enqueue_millis(&self, delay_ms: i64) -> Result<Completion> {
        let ms = u64::try_from(delay_ms).map_err(|_| Error::InvalidDelay(delay_ms))?;
        Ok(self.enqueue(Some(Duration::from_millis(ms))))
    }

    /// Start the oldest pending slot.
    ///
    /// No-op while a slot is in flight or when nothing is pending.
    pub fn advance(&self) {
        let next = self.shared.start_next(&mut self.shared.lock());
        if let Some(next) = next {
            next.spawn();
        }
    }

    /// Number of slots waiting to start. The in-flight slot is not counted.
    pub fn size(&self) -> usize {
        self.shared.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// True while a slot's timer is armed.
    pub fn is_busy(&self) -> bool {
        self.shared.lock().in_flight.is_some()
    }

    pub fn phase(&self) -> Phase {
        self.shared.lock().phase()
    }

    pub fn stats(&self) -> QueueStats {
        let state = self.shared.lock();
        QueueStats {
            pending: state.pending.len(),
            phase: state.phase(),
            in_flight: state.in_flight,
            enqueued: state.enqueued,
            released: state.released,
        }
    }

    pub fn id(&self) -> QueueId {
        self.shared.id
    }

    pub fn config(&self) -> &QueueConfig {
        &self.shared.config
    }

    /// Receive this queue's events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.shared.lock().events.subscribe()
    }
}

impl std::fmt::Debug for DelayedQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelayedQueue")
            .field("id", &self.shared.id)
            .field("config", &self.shared.config)
            .field("stats", &self.stats())
            .finish()
    }
}

impl Shared {
    /// State is only mutated in short non-panicking sections, so a poisoned
    /// lock still guards consistent data.
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move the oldest pending slot into flight.
    ///
    /// The returned timer must be spawned after the lock is released: on a
    /// runtime that has shut down, `spawn` drops it on the spot and
    /// [`Armed`]'s drop takes the lock.
    fn start_next(self: &Arc<Self>, state: &mut State) -> Option<Armed> {
        if state.in_flight.is_some() {
            return None;
        }
        let slot = state.pending.pop_front()?;

        debug_assert!(state.phase().can_transition_to(Phase::Draining));
        state.in_flight = Some(slot.id);

        let delay_ms = duration_ms(slot.delay);
        let pending = state.pending.len();
        state.events.emit(EventKind::SlotStarted {
            slot: slot.id,
            delay_ms,
            pending,
        });

        let span = start_slot_span(&self.id, slot.id, delay_ms);
        record_state_transition(&span, "pending", "in_flight");

        Some(Armed {
            shared: Arc::clone(self),
            delay: slot.delay,
            slot: Some(slot),
            span,
        })
    }

    /// Timer fired: resolve the slot, go idle, and maybe start the next one.
    fn release(self: &Arc<Self>, slot: Slot) {
        let waited = slot.enqueued_at.elapsed();
        let mut state = self.lock();

        if slot.tx.send(()).is_err() {
            debug!(queue = %self.id, slot = %slot.id, "completion dropped before release");
        }
        debug_assert_eq!(state.in_flight, Some(slot.id));
        debug_assert!(state.phase().can_transition_to(Phase::Idle));
        state.in_flight = None;
        state.released += 1;

        let waited_ms = duration_ms(waited);
        state.events.emit(EventKind::SlotReleased {
            slot: slot.id,
            waited_ms,
        });
        record_state_transition(&Span::current(), "in_flight", "released");

        let labels = metrics::queue_labels(&self.id);
        metrics::slots_released().add(1, &labels);
        metrics::slot_wait_ms().record(waited.as_secs_f64() * 1000.0, &labels);

        let next = if self.config.auto_advance {
            self.start_next(&mut state)
        } else {
            None
        };
        drop(state);
        if let Some(next) = next {
            next.spawn();
        }
    }

    /// The timer was dropped before it fired, which only happens when its
    /// runtime shuts down. Frees the in-flight position so a later
    /// `advance()` is not a permanent no-op; the completion resolves as
    /// abandoned when `slot` drops. Does not start the next slot.
    fn abandon(&self, slot: Slot) {
        let mut state = self.lock();
        if state.in_flight == Some(slot.id) {
            state.in_flight = None;
        }
        state.events.emit(EventKind::SlotAbandoned { slot: slot.id });
        record_state_transition(&Span::current(), "in_flight", "abandoned");
        warn!(queue = %self.id, slot = %slot.id, "slot timer dropped before firing");
    }
}

/// A slot in flight whose timer has not fired yet.
///
/// Dropping it unfired hands the slot to [`Shared::abandon`].
struct Armed {
    shared: Arc<Shared>,
    delay: Duration,
    slot: Option<Slot>,
    span: Span,
}

impl Armed {
    fn spawn(self) {
        let runtime = self.shared.runtime.clone();
        let span = self.span.clone();
        runtime.spawn(self.fire().instrument(span));
    }

    async fn fire(mut self) {
        tokio::time::sleep(self.delay).await;
        if let Some(slot) = self.slot.take() {
            self.shared.release(slot);
        }
    }
}

impl Drop for Armed {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            let _entered = self.span.enter();
            self.shared.abandon(slot);
        }
    }
}
