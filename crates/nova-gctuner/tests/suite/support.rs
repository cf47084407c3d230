use nova_gctuner::{CollectionCallback, CollectorRuntime, CycleNotifier, MemoryLimitSource};
use parking_lot::{const_mutex, Mutex, MutexGuard};
use std::ffi::OsString;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

// Serializes tests that touch the environment, the captured default percent or
// the process-wide governor.
static SUITE_LOCK: Mutex<()> = const_mutex(());

pub fn suite_lock() -> MutexGuard<'static, ()> {
    SUITE_LOCK.lock()
}

pub struct EnvVarGuard {
    key: &'static str,
    prev: Option<OsString>,
}

impl EnvVarGuard {
    pub fn set(key: &'static str, value: &str) -> Self {
        let prev = std::env::var_os(key);
        std::env::set_var(key, value);
        Self { key, prev }
    }

    pub fn unset(key: &'static str) -> Self {
        let prev = std::env::var_os(key);
        std::env::remove_var(key);
        Self { key, prev }
    }
}

impl Drop for EnvVarGuard {
    fn drop(&mut self) {
        match &self.prev {
            Some(v) => std::env::set_var(self.key, v),
            None => std::env::remove_var(self.key),
        }
    }
}

/// Collector whose cycles are driven explicitly by the test.
pub struct FakeCollector {
    heap: AtomicU64,
    gc_percent: AtomicU32,
    memory_limit: AtomicU64,
    notifier: CycleNotifier,
}

impl FakeCollector {
    pub fn new(gc_percent: u32) -> Self {
        Self {
            heap: AtomicU64::new(0),
            gc_percent: AtomicU32::new(gc_percent),
            memory_limit: AtomicU64::new(0),
            notifier: CycleNotifier::new(),
        }
    }

    /// Finish a cycle that left `heap` bytes live.
    pub fn collect(&self, heap: u64) -> usize {
        self.heap.store(heap, Ordering::SeqCst);
        self.notifier.collection_completed()
    }

    pub fn applied_gc_percent(&self) -> u32 {
        self.gc_percent.load(Ordering::SeqCst)
    }

    pub fn applied_memory_limit(&self) -> u64 {
        self.memory_limit.load(Ordering::SeqCst)
    }

    pub fn armed(&self) -> usize {
        self.notifier.pending()
    }
}

impl CollectorRuntime for FakeCollector {
    fn live_heap_bytes(&self) -> u64 {
        self.heap.load(Ordering::SeqCst)
    }

    fn set_gc_percent(&self, percent: u32) -> u32 {
        self.gc_percent.swap(percent, Ordering::SeqCst)
    }

    fn set_memory_limit(&self, bytes: u64) -> u64 {
        self.memory_limit.swap(bytes, Ordering::SeqCst)
    }

    fn on_next_collection(&self, callback: CollectionCallback) {
        self.notifier.register(callback);
    }
}

#[derive(Debug, Default)]
pub struct FixedLimits {
    pub env: Option<u64>,
    pub host: Option<u64>,
}

impl MemoryLimitSource for FixedLimits {
    fn environment_limit(&self) -> Option<u64> {
        self.env
    }

    fn host_limit(&self) -> Option<u64> {
        self.host
    }
}
