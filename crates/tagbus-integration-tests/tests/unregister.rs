//! Bulk cancellation by subscriber identity.

use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use tagbus::{EventType, SubscriberId, SubscriptionState};
use tagbus_test::{DEFAULT_WAIT, Recorder, settle, test_bus, wait_until};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_no_delivery_after_unregister() {
    let bus = test_bus();
    let recorder = Recorder::<u32>::new();
    let subscriber = SubscriberId::new();

    let subscription = bus
        .subscribe(subscriber, 1, EventType::<u32>::exact(), recorder.callback())
        .unwrap();
    bus.post_tagged(1, 1_u32);
    assert!(recorder.wait_for_len(1).await);

    assert_eq!(bus.unregister(subscriber), 1);
    assert_eq!(subscription.state(), SubscriptionState::Cancelled);
    assert!(!subscription.is_live());

    for i in 2..50_u32 {
        bus.post_tagged(1, i);
    }
    settle().await;
    assert_eq!(recorder.values(), vec![1]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unregister_is_idempotent() {
    let bus = test_bus();
    let subscriber = SubscriberId::new();

    assert_eq!(bus.unregister(subscriber), 0);
    bus.subscribe(subscriber, 1, EventType::<u32>::exact(), |_| {})
        .unwrap();
    assert_eq!(bus.unregister(subscriber), 1);
    assert_eq!(bus.unregister(subscriber), 0);
    assert!(!bus.has_subscriber(subscriber));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_subscriptions_accumulate_and_cancel_together() {
    let bus = test_bus();
    let subscriber = SubscriberId::new();

    for tag in 0..5 {
        bus.subscribe(subscriber, tag, EventType::<u32>::exact(), |_| {})
            .unwrap();
    }
    assert_eq!(bus.subscriber_count(), 1);
    assert_eq!(bus.subscription_count(), 5);

    let subscriptions = bus.subscriptions(subscriber);
    assert_eq!(bus.unregister(subscriber), 5);
    assert!(
        subscriptions
            .iter()
            .all(|s| s.state() == SubscriptionState::Cancelled)
    );
    assert_eq!(bus.subscription_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unregister_leaves_other_subscribers_alone() {
    let bus = test_bus();
    let leaving = SubscriberId::new();
    let staying = SubscriberId::new();
    let recorder = Recorder::<u32>::new();

    bus.subscribe(leaving, 1, EventType::<u32>::exact(), |_| {})
        .unwrap();
    bus.subscribe(staying, 1, EventType::<u32>::exact(), recorder.callback())
        .unwrap();

    bus.unregister(leaving);
    bus.post_tagged(1, 7_u32);

    assert!(recorder.wait_for_len(1).await);
    assert!(bus.has_subscriber(staying));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unregister_waits_for_running_callback() {
    let bus = test_bus();
    let subscriber = SubscriberId::new();
    let started = Arc::new(AtomicBool::new(false));
    let finished = Arc::new(AtomicBool::new(false));

    {
        let started = Arc::clone(&started);
        let finished = Arc::clone(&finished);
        bus.subscribe(subscriber, 1, EventType::<()>::exact(), move |_| {
            started.store(true, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(100));
            finished.store(true, Ordering::SeqCst);
        })
        .unwrap();
    }

    bus.post_tagged(1, ());
    assert!(wait_until(DEFAULT_WAIT, || started.load(Ordering::SeqCst)).await);

    bus.unregister(subscriber);
    assert!(finished.load(Ordering::SeqCst));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unregister_from_own_callback() {
    let bus = test_bus();
    let subscriber = SubscriberId::new();
    let recorder = Recorder::<u32>::new();

    {
        let weak = bus.downgrade();
        let recorder = recorder.clone();
        bus.subscribe(subscriber, 1, EventType::<u32>::exact(), move |value| {
            recorder.record(*value);
            if let Some(bus) = weak.upgrade() {
                bus.unregister(subscriber);
            }
        })
        .unwrap();
    }

    bus.post_tagged(1, 1_u32);
    bus.post_tagged(1, 2_u32);

    assert!(recorder.wait_for_len(1).await);
    settle().await;
    assert_eq!(recorder.values(), vec![1]);
    assert!(!bus.has_subscriber(subscriber));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_identity_of_shared_owner() {
    struct Screen;

    let bus = test_bus();
    let screen = Arc::new(Screen);
    let alias = Arc::clone(&screen);
    let other = Arc::new(Screen);

    bus.subscribe(SubscriberId::of(&screen), 1, EventType::<u32>::exact(), |_| {})
        .unwrap();

    assert_eq!(bus.unregister(SubscriberId::of(&other)), 0);
    assert_eq!(bus.unregister(SubscriberId::of(&alias)), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_subscribe_and_unregister() {
    let bus = test_bus();
    let subscriber = SubscriberId::new();

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let bus = bus.clone();
            thread::spawn(move || {
                for _ in 0..50 {
                    bus.subscribe(subscriber, 1, EventType::<u32>::exact(), |_| {})
                        .unwrap();
                    bus.unregister(subscriber);
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    bus.unregister(subscriber);
    assert_eq!(bus.subscription_count(), 0);
    assert!(!bus.has_subscriber(subscriber));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_second_unregister_while_first_waits() {
    let bus = test_bus();
    let subscriber = SubscriberId::new();
    let started = Arc::new(AtomicBool::new(false));
    let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
    let release_rx = Arc::new(Mutex::new(release_rx));
    let recorder = Recorder::<u32>::new();

    {
        let started = Arc::clone(&started);
        bus.subscribe(subscriber, 1, EventType::<()>::exact(), move |_| {
            started.store(true, Ordering::SeqCst);
            let _ = release_rx.lock().unwrap().recv_timeout(DEFAULT_WAIT);
        })
        .unwrap();
    }
    bus.subscribe(subscriber, 2, EventType::<u32>::exact(), recorder.callback())
        .unwrap();

    bus.post_tagged(1, ());
    assert!(wait_until(DEFAULT_WAIT, || started.load(Ordering::SeqCst)).await);

    // Blocks until the tag 1 callback returns.
    let first = {
        let bus = bus.clone();
        thread::spawn(move || bus.unregister(subscriber))
    };
    assert!(wait_until(DEFAULT_WAIT, || !bus.has_subscriber(subscriber)).await);

    assert_eq!(bus.unregister(subscriber), 0);
    bus.post_tagged(2, 99_u32);
    settle().await;
    assert!(recorder.is_empty());

    release_tx.send(()).unwrap();
    assert_eq!(first.join().unwrap(), 2);
}
