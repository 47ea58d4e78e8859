use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::BoundedQueue;
use crate::error::Error;
use crate::format::Payload;

fn sample(tx_id: u64) -> Payload {
    Payload {
        tx_id,
        action: "create".to_string(),
        name: format!("file-{tx_id}"),
        ..Payload::default()
    }
}

#[test]
fn enqueue_up_to_capacity_succeeds() {
    let q = BoundedQueue::new(2);
    assert!(q.try_enqueue(sample(1)).is_ok());
    assert!(q.try_enqueue(sample(2)).is_ok());
    assert_eq!(q.len(), 2);
}

#[test]
fn enqueue_past_capacity_drops_and_counts() {
    let q = BoundedQueue::new(1);
    assert!(q.try_enqueue(sample(1)).is_ok());
    assert!(matches!(q.try_enqueue(sample(2)), Err(Error::QueueFull)));
    assert_eq!(q.dropped_events(), 1);
    assert_eq!(q.len(), 1);
}

#[test]
fn wait_and_drain_returns_all_queued_items() {
    let q = BoundedQueue::new(8);
    q.try_enqueue(sample(1)).unwrap();
    q.try_enqueue(sample(2)).unwrap();
    let drained = q.wait_and_drain(Duration::from_millis(10));
    assert_eq!(drained.len(), 2);
    assert!(q.is_empty());
}

#[test]
fn wait_and_drain_wakes_on_enqueue() {
    let q = Arc::new(BoundedQueue::new(8));
    let q2 = Arc::clone(&q);
    let handle = thread::spawn(move || q2.wait_and_drain(Duration::from_millis(50)));
    thread::sleep(Duration::from_millis(20));
    q.try_enqueue(sample(1)).unwrap();
    let drained = handle.join().unwrap();
    assert_eq!(drained.len(), 1);
}

#[test]
fn wait_and_drain_when_ready_parks_until_device_is_ready() {
    use std::sync::atomic::{AtomicBool, Ordering};

    let q = Arc::new(BoundedQueue::new(8));
    q.try_enqueue(sample(1)).unwrap();

    let ready = Arc::new(AtomicBool::new(false));
    let ready2 = Arc::clone(&ready);
    let q2 = Arc::clone(&q);
    let handle = thread::spawn(move || {
        q2.wait_and_drain_when_ready(Duration::from_millis(10), || ready2.load(Ordering::Relaxed))
    });

    // The item is queued but the device isn't ready yet: nothing should drain.
    thread::sleep(Duration::from_millis(50));
    assert_eq!(q.len(), 1);

    ready.store(true, Ordering::Relaxed);
    let drained = handle.join().unwrap();
    assert_eq!(drained.len(), 1);
}

#[test]
fn record_dropped_adds_to_the_overflow_counter() {
    let q = BoundedQueue::new(1);
    assert!(q.try_enqueue(sample(1)).is_ok());
    assert!(q.try_enqueue(sample(2)).is_err());
    assert_eq!(q.dropped_events(), 1);
    q.record_dropped(3);
    assert_eq!(q.dropped_events(), 4);
}

#[test]
fn shutdown_releases_waiting_flusher() {
    let q = Arc::new(BoundedQueue::new(8));
    let q2 = Arc::clone(&q);
    let handle = thread::spawn(move || q2.wait_and_drain(Duration::from_millis(500)));
    thread::sleep(Duration::from_millis(20));
    q.shutdown();
    let drained = handle.join().unwrap();
    assert!(drained.is_empty());
    assert!(q.is_shutdown());
}
