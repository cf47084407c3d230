use parking_lot::Mutex;

/// One-shot callback run after the next completed collection cycle.
pub type CollectionCallback = Box<dyn FnOnce() + Send + 'static>;

/// The collector being tuned.
///
/// Implementations adapt whatever knobs the managed runtime exposes. All
/// methods may be called from the thread that delivers collection callbacks.
pub trait CollectorRuntime: Send + Sync {
    /// Bytes currently retained by the managed heap.
    fn live_heap_bytes(&self) -> u64;

    /// Set the collection-aggressiveness percent, returning the previous one.
    fn set_gc_percent(&self, percent: u32) -> u32;

    /// Set the hard memory ceiling, returning the previous one.
    ///
    /// Collectors without a ceiling keep the default no-op, which reports 0.
    fn set_memory_limit(&self, bytes: u64) -> u64 {
        let _ = bytes;
        0
    }

    /// Run `callback` once, after the next collection cycle completes.
    ///
    /// The callback must not be invoked from inside this call. Runtimes with a
    /// post-collection hook can delegate to a [`CycleNotifier`]; runtimes
    /// without one can use [`crate::IntervalNotifier`].
    fn on_next_collection(&self, callback: CollectionCallback);
}

/// Registry of one-shot collection callbacks.
///
/// The owning runtime calls [`CycleNotifier::collection_completed`] from its
/// post-collection hook.
#[derive(Default)]
pub struct CycleNotifier {
    pending: Mutex<Vec<CollectionCallback>>,
}

impl CycleNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, callback: CollectionCallback) {
        self.pending.lock().push(callback);
    }

    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }

    /// Run every callback registered before this call and return how many ran.
    ///
    /// Callbacks registered while these run belong to the next cycle.
    pub fn collection_completed(&self) -> usize {
        let callbacks = std::mem::take(&mut *self.pending.lock());
        let fired = callbacks.len();
        for callback in callbacks {
            callback();
        }
        fired
    }
}

impl std::fmt::Debug for CycleNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CycleNotifier")
            .field("pending", &self.pending())
            .finish()
    }
}
