use crate::suite::support::FixedLimits;
use nova_gctuner::{
    CollectionCallback, CollectorRuntime, IntervalNotifier, MemoryLimitResolver,
    SharedGcPercentBounds, Tuner, TunerContext, MB,
};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Runtime without a collection hook; cycles are simulated by a timer.
struct PolledRuntime {
    heap: AtomicU64,
    gc_percent: AtomicU32,
    ticks: IntervalNotifier,
}

impl PolledRuntime {
    fn new(heap: u64) -> Self {
        Self {
            heap: AtomicU64::new(heap),
            gc_percent: AtomicU32::new(100),
            ticks: IntervalNotifier::spawn(Duration::from_millis(2)).unwrap(),
        }
    }
}

impl CollectorRuntime for PolledRuntime {
    fn live_heap_bytes(&self) -> u64 {
        self.heap.load(Ordering::SeqCst)
    }

    fn set_gc_percent(&self, percent: u32) -> u32 {
        self.gc_percent.swap(percent, Ordering::SeqCst)
    }

    fn on_next_collection(&self, callback: CollectionCallback) {
        self.ticks.register(callback);
    }
}

fn wait_for(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        std::thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn tuner_follows_heap_on_interval_ticks() {
    let runtime = Arc::new(PolledRuntime::new(256 * MB));
    let ctx = TunerContext {
        runtime: runtime.clone(),
        limits: Arc::new(MemoryLimitResolver::new(Arc::new(FixedLimits::default()))),
        bounds: Arc::new(SharedGcPercentBounds::default()),
    };
    let tuner = Tuner::new(1024 * MB, ctx);

    wait_for("first adjustment", || {
        runtime.gc_percent.load(Ordering::SeqCst) == 300
    });
    assert_eq!(tuner.gc_percent(), 300);

    runtime.heap.store(512 * MB, Ordering::SeqCst);
    wait_for("heap growth to be observed", || tuner.gc_percent() == 100);

    tuner.stop();
    assert!(!tuner.is_running());
    let beats = tuner.beats();

    runtime.heap.store(64 * MB, Ordering::SeqCst);
    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(tuner.beats(), beats);
    assert_eq!(runtime.gc_percent.load(Ordering::SeqCst), 100);
    assert_eq!(runtime.ticks.pending(), 0);
}
