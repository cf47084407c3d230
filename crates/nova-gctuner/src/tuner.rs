use crate::env::default_gc_percent;
use crate::heartbeat::Heartbeat;
use crate::limit::MemoryLimitResolver;
use crate::percent::{calc_gc_percent, SharedGcPercentBounds};
use crate::runtime::CollectorRuntime;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

/// Collaborators a [`Tuner`] steers with.
///
/// Cloning shares the limit resolver and bounds, so tuners created from the
/// same context observe the same override and `[min, max]` clamp.
#[derive(Clone)]
pub struct TunerContext {
    pub runtime: Arc<dyn CollectorRuntime>,
    pub limits: Arc<MemoryLimitResolver>,
    pub bounds: Arc<SharedGcPercentBounds>,
}

impl TunerContext {
    /// System limit detection and default bounds.
    pub fn new(runtime: Arc<dyn CollectorRuntime>) -> Self {
        Self {
            runtime,
            limits: Arc::new(MemoryLimitResolver::system()),
            bounds: Arc::new(SharedGcPercentBounds::default()),
        }
    }
}

impl std::fmt::Debug for TunerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TunerContext")
            .field("limits", &self.limits)
            .field("bounds", &self.bounds.load())
            .finish_non_exhaustive()
    }
}

/*
    The collector triggers a cycle once the live heap reaches

        gc_trigger = in_use + in_use * gc_percent / 100

    After every cycle the tuner re-solves gc_percent so that gc_trigger lands
    on the threshold: relaxed collection while far below it, `min` once the
    heap reaches it.
*/

/// Per-cycle GC percent controller.
///
/// Running from construction until [`Tuner::stop`] (or drop).
pub struct Tuner {
    state: Arc<TunerState>,
    heartbeat: Heartbeat,
}

struct TunerState {
    ctx: TunerContext,
    threshold: AtomicU64,
    gc_percent: Arc<AtomicU32>,
    previous_gc_percent: AtomicU32,
}

impl Tuner {
    pub fn new(threshold: u64, ctx: TunerContext) -> Self {
        Self::with_percent_cell(threshold, ctx, Arc::new(AtomicU32::new(0)))
    }

    /// Start a tuner publishing its percent through `gc_percent`, letting an
    /// owner read it without holding the tuner.
    pub(crate) fn with_percent_cell(
        threshold: u64,
        ctx: TunerContext,
        gc_percent: Arc<AtomicU32>,
    ) -> Self {
        let initial = default_gc_percent();
        gc_percent.store(initial, Ordering::Release);

        let state = Arc::new(TunerState {
            ctx,
            threshold: AtomicU64::new(threshold),
            gc_percent,
            previous_gc_percent: AtomicU32::new(initial),
        });

        let heartbeat = Heartbeat::start(state.ctx.runtime.clone(), {
            let state = state.clone();
            move || state.tune()
        });

        tracing::debug!(target = "nova.gctuner", threshold, "gc tuner started");

        Self { state, heartbeat }
    }

    pub fn threshold(&self) -> u64 {
        self.state.threshold()
    }

    /// Takes effect at the next tuning step.
    pub fn set_threshold(&self, threshold: u64) {
        let previous = self.state.threshold.swap(threshold, Ordering::AcqRel);
        tracing::debug!(
            target = "nova.gctuner",
            previous,
            threshold,
            "gc tuner threshold updated"
        );
    }

    /// Percent most recently applied to the collector.
    pub fn gc_percent(&self) -> u32 {
        self.state.gc_percent.load(Ordering::Acquire)
    }

    /// Percent the collector reported as replaced by the latest step.
    pub fn previous_gc_percent(&self) -> u32 {
        self.state.previous_gc_percent.load(Ordering::Acquire)
    }

    /// Completed tuning steps.
    pub fn beats(&self) -> u64 {
        self.heartbeat.beats()
    }

    pub fn is_running(&self) -> bool {
        self.heartbeat.is_alive()
    }

    pub fn context(&self) -> &TunerContext {
        &self.state.ctx
    }

    /// Once this returns, no tuning step touches the collector again.
    pub fn stop(&self) {
        let was_running = self.heartbeat.is_alive();
        self.heartbeat.stop();
        if was_running {
            tracing::debug!(target = "nova.gctuner", "gc tuner stopped");
        }
    }

    #[cfg(test)]
    fn apply_gc_percent(&self, percent: u32) -> u32 {
        self.state.apply_gc_percent(percent)
    }
}

impl Drop for Tuner {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Tuner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tuner")
            .field("threshold", &self.threshold())
            .field("gc_percent", &self.gc_percent())
            .field("running", &self.is_running())
            .finish()
    }
}

impl TunerState {
    fn threshold(&self) -> u64 {
        self.threshold.load(Ordering::Acquire)
    }

    // Invoked serially by the heartbeat.
    fn tune(&self) -> ControlFlow<()> {
        let in_use = self.ctx.runtime.live_heap_bytes();
        let threshold = self.threshold();
        if threshold == 0 {
            tracing::debug!(target = "nova.gctuner", "threshold is zero; tuning paused");
            return ControlFlow::Break(());
        }

        let ceiling = self.ctx.limits.ceiling_for(threshold);
        self.ctx.runtime.set_memory_limit(ceiling);

        let percent = calc_gc_percent(in_use, threshold, self.ctx.bounds.load());
        let previous = self.apply_gc_percent(percent);

        tracing::trace!(
            target = "nova.gctuner",
            in_use,
            threshold,
            ceiling,
            percent,
            previous,
            "tuned gc percent"
        );
        ControlFlow::Continue(())
    }

    fn apply_gc_percent(&self, percent: u32) -> u32 {
        self.gc_percent.store(percent, Ordering::Release);
        let previous = self.ctx.runtime.set_gc_percent(percent);
        self.previous_gc_percent.store(previous, Ordering::Release);
        previous
    }
}
