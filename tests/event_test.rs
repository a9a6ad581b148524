//! Integration tests for the queue event stream.

use std::time::Duration;

use delayq::event::EventKind;
use delayq::model::SlotId;
use delayq::{DelayedQueue, QueueConfig};

#[tokio::test(start_paused = true)]
async fn events_trace_a_slot_lifecycle() {
    let queue = DelayedQueue::new(QueueConfig::default()).unwrap();
    let mut events = queue.subscribe();

    let completion = queue.enqueue(Some(Duration::from_millis(25)));
    queue.advance();
    completion.await.unwrap();

    let enqueued = events.try_recv().unwrap();
    let started = events.try_recv().unwrap();
    let released = events.try_recv().unwrap();
    assert!(events.try_recv().is_err());

    assert_eq!(
        enqueued.kind,
        EventKind::SlotEnqueued {
            slot: SlotId(1),
            delay_ms: 25,
            pending: 1
        }
    );
    assert_eq!(
        started.kind,
        EventKind::SlotStarted {
            slot: SlotId(1),
            delay_ms: 25,
            pending: 0
        }
    );
    match released.kind {
        EventKind::SlotReleased { slot, waited_ms } => {
            assert_eq!(slot, SlotId(1));
            assert!(waited_ms >= 25);
        }
        other => panic!("expected SlotReleased, got {other:?}"),
    }

    assert_eq!(
        [enqueued.seq, started.seq, released.seq],
        [1, 2, 3],
        "sequence numbers are gapless"
    );
    assert!(enqueued.queue == queue.id() && released.queue == queue.id());
}

#[tokio::test(start_paused = true)]
async fn events_without_subscribers_are_dropped_silently() {
    let queue = DelayedQueue::new(QueueConfig::default().auto_advance(true)).unwrap();
    queue.enqueue(None).await.unwrap();

    // Subscribing late only sees what comes next.
    let mut events = queue.subscribe();
    assert!(events.try_recv().is_err());

    queue.enqueue(None).await.unwrap();
    let first = events.try_recv().unwrap();
    assert_eq!(first.kind.slot(), SlotId(2));
    assert_eq!(first.seq, 4);
}

#[tokio::test(start_paused = true)]
async fn events_serialize_with_snake_case_tags() {
    let queue = DelayedQueue::new(QueueConfig::default()).unwrap();
    let mut events = queue.subscribe();
    let _pending = queue.enqueue(Some(Duration::from_millis(7)));

    let event = events.try_recv().unwrap();
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["kind"]["type"], "slot_enqueued");
    assert_eq!(json["kind"]["slot"], 1);
    assert_eq!(json["kind"]["delay_ms"], 7);
    assert_eq!(json["seq"], 1);
}
