//! The caller's side of a slot.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::{Error, Result};
use crate::model::SlotId;

/// Resolves when the slot's turn has arrived.
///
/// Returned by [`DelayedQueue::enqueue`](super::DelayedQueue::enqueue).
/// Resolves exactly once: `Ok(())` when the slot is released, or
/// [`Error::Abandoned`] if the queue was torn down first. Dropping a
/// `Completion` does not remove its slot; the queue still spends the
/// slot's delay in turn.
#[derive(Debug)]
#[must_use = "a Completion does nothing unless awaited"]
pub struct Completion {
    slot: SlotId,
    rx: oneshot::Receiver<()>,
}

impl Completion {
    pub(crate) fn new(slot: SlotId, rx: oneshot::Receiver<()>) -> Self {
        Self { slot, rx }
    }

    /// The slot this completion belongs to.
    pub fn slot(&self) -> SlotId {
        self.slot
    }
}

impl Future for Completion {
    type Output = Result<()>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let slot = this.slot;
        Pin::new(&mut this.rx)
            .poll(cx)
            .map(|released| released.map_err(|_| Error::Abandoned(slot)))
    }
}
