use crate::runtime::CollectorRuntime;
use parking_lot::Mutex;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

type Step = Box<dyn Fn() -> ControlFlow<()> + Send + Sync>;

/// Runs a step once per collection cycle until stopped.
///
/// Each firing re-arms the runtime's one-shot notification unless the step
/// breaks. [`Heartbeat::stop`] is final: once it returns no step is running
/// and none will start, even if the runtime still holds a pending callback.
pub struct Heartbeat {
    shared: Arc<Shared>,
}

struct Shared {
    alive: AtomicBool,
    // Serializes firings and lets `stop` wait out an in-flight step.
    step_lock: Mutex<()>,
    beats: AtomicU64,
    runtime: Arc<dyn CollectorRuntime>,
    step: Step,
}

impl Heartbeat {
    /// Arm the first firing immediately.
    pub fn start<F>(runtime: Arc<dyn CollectorRuntime>, step: F) -> Self
    where
        F: Fn() -> ControlFlow<()> + Send + Sync + 'static,
    {
        let shared = Arc::new(Shared {
            alive: AtomicBool::new(true),
            step_lock: Mutex::new(()),
            beats: AtomicU64::new(0),
            runtime,
            step: Box::new(step),
        });
        arm(&shared);
        Self { shared }
    }

    pub fn is_alive(&self) -> bool {
        self.shared.alive.load(Ordering::Acquire)
    }

    /// Number of steps executed so far.
    pub fn beats(&self) -> u64 {
        self.shared.beats.load(Ordering::Relaxed)
    }

    /// Detach the step. Blocks while a step is running.
    ///
    /// Must not be called from inside the step itself.
    pub fn stop(&self) {
        self.shared.alive.store(false, Ordering::Release);
        // A concurrent `stop` may have flipped the flag first; wait regardless.
        drop(self.shared.step_lock.lock());
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Heartbeat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Heartbeat")
            .field("alive", &self.is_alive())
            .field("beats", &self.beats())
            .finish()
    }
}

fn arm(shared: &Arc<Shared>) {
    let next = shared.clone();
    shared
        .runtime
        .on_next_collection(Box::new(move || fire(&next)));
}

fn fire(shared: &Arc<Shared>) {
    let flow = {
        let _guard = shared.step_lock.lock();
        if !shared.alive.load(Ordering::Acquire) {
            return;
        }
        shared.beats.fetch_add(1, Ordering::Relaxed);
        (shared.step)()
    };

    if flow.is_continue() && shared.alive.load(Ordering::Acquire) {
        arm(shared);
    }
}
