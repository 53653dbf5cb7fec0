//! # Concurrency Tests
//!
//! The bus is shared across threads and tasks; delivery runs on the caller.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::thread;

use nove_bus::{Bus, Declaration, Subscribe};
use parking_lot::Mutex;

#[derive(Default)]
struct Tally {
    total: AtomicUsize,
}

impl Subscribe for Tally {
    fn declare(d: &mut Declaration<Self>) {
        d.handle::<usize>(|s, n| {
            s.total.fetch_add(*n, Ordering::SeqCst);
        });
    }
}

struct Request(u32);
struct Reply(u32);

/// Answers every request by posting a reply on the same bus.
struct Responder {
    bus: Weak<Bus>,
}

impl Subscribe for Responder {
    fn declare(d: &mut Declaration<Self>) {
        d.try_handle::<Request>(|s, req| {
            if let Some(bus) = s.bus.upgrade() {
                bus.post(Reply(req.0 * 2))?;
            }
            Ok(())
        });
    }
}

#[derive(Default)]
struct Collector {
    replies: Mutex<Vec<u32>>,
}

impl Subscribe for Collector {
    fn declare(d: &mut Declaration<Self>) {
        d.handle::<Reply>(|s, r| s.replies.lock().push(r.0));
    }
}

/// Registers a fresh `Collector` the first time it hears a request.
struct LateJoiner {
    bus: Weak<Bus>,
    joined: Mutex<Option<Arc<Collector>>>,
}

impl Subscribe for LateJoiner {
    fn declare(d: &mut Declaration<Self>) {
        d.try_handle::<Request>(|s, _| {
            let Some(bus) = s.bus.upgrade() else {
                return Ok(());
            };
            let mut joined = s.joined.lock();
            if joined.is_none() {
                let collector = Arc::new(Collector::default());
                bus.register(&collector)?;
                *joined = Some(collector);
            }
            Ok(())
        });
    }
}

#[test]
fn test_callbacks_can_post_on_the_same_bus() {
    nove_telemetry::try_init_for_tests();
    let bus = Arc::new(Bus::new());
    let responder = Arc::new(Responder {
        bus: Arc::downgrade(&bus),
    });
    let collector = Arc::new(Collector::default());
    bus.register(&responder).expect("register responder");
    bus.register(&collector).expect("register collector");

    // One request callback plus the nested reply delivery.
    bus.post(Request(21)).expect("post");

    assert_eq!(*collector.replies.lock(), vec![42]);
}

#[test]
fn test_callbacks_can_register_on_the_same_bus() {
    nove_telemetry::try_init_for_tests();
    let bus = Arc::new(Bus::new());
    let joiner = Arc::new(LateJoiner {
        bus: Arc::downgrade(&bus),
        joined: Mutex::new(None),
    });
    bus.register(&joiner).expect("register");

    bus.post(Request(1)).expect("post");
    bus.post(Reply(5)).expect("post");

    let joined = joiner.joined.lock().clone().expect("collector registered");
    assert_eq!(*joined.replies.lock(), vec![5]);
}

#[test]
fn test_parallel_posts_deliver_exactly_once() {
    nove_telemetry::try_init_for_tests();
    let bus = Bus::new();
    let tally = Arc::new(Tally::default());
    bus.register(&tally).expect("register");

    thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                for _ in 0..100 {
                    bus.post(1usize).expect("post");
                }
            });
        }
    });

    assert_eq!(tally.total.load(Ordering::SeqCst), 800);
}

#[test]
fn test_register_while_posting() {
    nove_telemetry::try_init_for_tests();
    let bus = Bus::new();
    let first = Arc::new(Tally::default());
    bus.register(&first).expect("register");
    let others: Vec<Arc<Tally>> = (0..4).map(|_| Arc::new(Tally::default())).collect();

    thread::scope(|scope| {
        scope.spawn(|| {
            for _ in 0..200 {
                bus.post(1usize).expect("post");
            }
        });
        scope.spawn(|| {
            for tally in &others {
                bus.register(tally).expect("register");
            }
        });
    });

    assert_eq!(first.total.load(Ordering::SeqCst), 200);
    assert_eq!(bus.binding_count(), 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_shared_across_tasks() {
    nove_telemetry::try_init_for_tests();
    let bus = Arc::new(Bus::new());
    let tally = Arc::new(Tally::default());
    bus.register(&tally).expect("register");

    let handles: Vec<_> = (1..=10usize)
        .map(|n| {
            let bus = Arc::clone(&bus);
            tokio::spawn(async move { bus.post(n).expect("post") })
        })
        .collect();

    let mut delivered = 0;
    for handle in handles {
        delivered += handle.await.expect("task");
    }

    assert_eq!(delivered, 10);
    assert_eq!(tally.total.load(Ordering::SeqCst), 55);
}
