use crate::env::default_gc_percent;
use crate::error::{GcTunerError, GcTunerResult};
use crate::limit::{MemoryLimitResolver, MemoryLimitSource};
use crate::percent::{GcPercentBounds, SharedGcPercentBounds};
use crate::report::GcTunerReport;
use crate::runtime::CollectorRuntime;
use crate::tuner::{Tuner, TunerContext};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};

/// Option accepted by [`GcGovernor::enable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GcTunerOption {
    MinGcPercent(u32),
    MaxGcPercent(u32),
}

/// Lower clamp for the tuned percent. Zero is rejected by `enable`.
pub fn with_min_gc_percent(percent: u32) -> GcTunerOption {
    GcTunerOption::MinGcPercent(percent)
}

/// Upper clamp for the tuned percent. Zero is rejected by `enable`.
pub fn with_max_gc_percent(percent: u32) -> GcTunerOption {
    GcTunerOption::MaxGcPercent(percent)
}

fn fold_options(
    current: GcPercentBounds,
    options: impl IntoIterator<Item = GcTunerOption>,
) -> GcTunerResult<GcPercentBounds> {
    let (mut min, mut max) = (current.min(), current.max());
    for option in options {
        match option {
            GcTunerOption::MinGcPercent(percent) => min = percent,
            GcTunerOption::MaxGcPercent(percent) => max = percent,
        }
    }
    GcPercentBounds::new(min, max)
}

/// Owns the lifecycle of at most one [`Tuner`] for a collector.
///
/// `enable` calls are serialized; the tuning step never takes that lock, and
/// neither do the getters.
pub struct GcGovernor {
    ctx: TunerContext,
    gc_percent: Arc<AtomicU32>,
    live: AtomicBool,
    tuner: Mutex<Option<Tuner>>,
}

impl GcGovernor {
    /// Governor using system memory limit detection.
    pub fn new(runtime: Arc<dyn CollectorRuntime>) -> Self {
        Self::with_context(TunerContext::new(runtime))
    }

    pub fn with_limit_source(
        runtime: Arc<dyn CollectorRuntime>,
        source: Arc<dyn MemoryLimitSource>,
    ) -> Self {
        Self::with_context(TunerContext {
            runtime,
            limits: Arc::new(MemoryLimitResolver::new(source)),
            bounds: Arc::new(SharedGcPercentBounds::default()),
        })
    }

    pub fn with_context(ctx: TunerContext) -> Self {
        Self {
            ctx,
            gc_percent: Arc::new(AtomicU32::new(0)),
            live: AtomicBool::new(false),
            tuner: Mutex::new(None),
        }
    }

    /// Start, retarget or stop tuning.
    ///
    /// `threshold` semantics:
    /// - `0` stops the tuner (a no-op when none is running)
    /// - negative derives the threshold from the memory limit override, or
    ///   else the whole detected memory limit
    /// - positive is used as a byte count verbatim
    ///
    /// Fails without changing anything when the options produce invalid bounds
    /// or a derived threshold cannot be resolved.
    pub fn enable(
        &self,
        threshold: i64,
        options: impl IntoIterator<Item = GcTunerOption>,
    ) -> GcTunerResult<()> {
        let mut slot = self.tuner.lock();

        let bounds = fold_options(self.ctx.bounds.load(), options)?;
        let threshold = self.normalize_threshold(threshold)?;

        let previous = self.ctx.bounds.store(bounds);
        if previous != bounds {
            tracing::debug!(
                target = "nova.gctuner",
                min = bounds.min(),
                max = bounds.max(),
                "gc percent bounds updated"
            );
        }

        match (threshold, slot.as_ref()) {
            (None, Some(_)) => {
                self.live.store(false, Ordering::Release);
                if let Some(tuner) = slot.take() {
                    tuner.stop();
                }
            }
            (None, None) => {}
            (Some(threshold), None) => {
                *slot = Some(Tuner::with_percent_cell(
                    threshold,
                    self.ctx.clone(),
                    self.gc_percent.clone(),
                ));
                self.live.store(true, Ordering::Release);
            }
            (Some(threshold), Some(tuner)) => tuner.set_threshold(threshold),
        }

        Ok(())
    }

    /// [`GcGovernor::enable`] for call sites that treat misconfiguration as a bug.
    ///
    /// # Panics
    ///
    /// Panics when `enable` returns an error.
    pub fn must_enable(&self, threshold: i64, options: impl IntoIterator<Item = GcTunerOption>) {
        if let Err(err) = self.enable(threshold, options) {
            panic!("failed to enable gc tuner: {err}");
        }
    }

    /// `None` means "disable".
    fn normalize_threshold(&self, threshold: i64) -> GcTunerResult<Option<u64>> {
        if threshold == 0 {
            return Ok(None);
        }
        if threshold > 0 {
            return Ok(Some(threshold as u64));
        }

        if let Some(bytes) = self.ctx.limits.memory_limit_override() {
            return Ok(Some(bytes));
        }
        match self.ctx.limits.limit_percent(-1.0) {
            0 => Err(GcTunerError::UnresolvableThreshold),
            limit => Ok(Some(limit)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    /// Percent applied by the live tuner, or the process default.
    pub fn gc_percent(&self) -> u32 {
        if self.is_enabled() {
            self.gc_percent.load(Ordering::Acquire)
        } else {
            default_gc_percent()
        }
    }

    pub fn min_gc_percent(&self) -> u32 {
        self.ctx.bounds.load().min()
    }

    pub fn max_gc_percent(&self) -> u32 {
        self.ctx.bounds.load().max()
    }

    /// `percent` of the detected memory limit in bytes (see
    /// [`MemoryLimitResolver::limit_percent`]).
    pub fn mem_limit_percent(&self, percent: f64) -> u64 {
        self.ctx.limits.limit_percent(percent)
    }

    /// Pin the memory limit override to `percent` of the detected limit and
    /// push it to the collector. A percentage resolving to 0 clears the
    /// override.
    pub fn set_mem_limit_percent(&self, percent: f64) {
        match self.ctx.limits.set_limit_percent(percent) {
            Some(bytes) => {
                self.ctx.runtime.set_memory_limit(bytes);
                tracing::debug!(
                    target = "nova.gctuner",
                    percent,
                    bytes,
                    "memory limit override set"
                );
            }
            None => {
                tracing::debug!(target = "nova.gctuner", percent, "memory limit override cleared");
            }
        }
    }

    /// Threshold of the live tuner.
    pub fn threshold(&self) -> Option<u64> {
        self.tuner.lock().as_ref().map(Tuner::threshold)
    }

    pub fn limits(&self) -> &MemoryLimitResolver {
        &self.ctx.limits
    }

    pub fn report(&self) -> GcTunerReport {
        let bounds = self.ctx.bounds.load();
        let (threshold_bytes, previous_gc_percent, beats) = match self.tuner.lock().as_ref() {
            Some(tuner) => (
                Some(tuner.threshold()),
                Some(tuner.previous_gc_percent()),
                tuner.beats(),
            ),
            None => (None, None, 0),
        };

        GcTunerReport {
            enabled: threshold_bytes.is_some(),
            threshold_bytes,
            gc_percent: self.gc_percent(),
            previous_gc_percent,
            min_gc_percent: bounds.min(),
            max_gc_percent: bounds.max(),
            memory_limit_override_bytes: self.ctx.limits.memory_limit_override(),
            effective_memory_limit_bytes: self.ctx.limits.effective_limit(),
            beats,
        }
    }
}

impl Drop for GcGovernor {
    fn drop(&mut self) {
        if let Some(tuner) = self.tuner.get_mut().take() {
            tuner.stop();
        }
    }
}

impl std::fmt::Debug for GcGovernor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcGovernor")
            .field("enabled", &self.is_enabled())
            .field("gc_percent", &self.gc_percent())
            .field("ctx", &self.ctx)
            .finish()
    }
}

// Process-wide facade. Only one governor may steer a process' collector; the
// resolver and bounds exist before `install` so the getters work early.

static GLOBAL: OnceLock<GcGovernor> = OnceLock::new();

fn global_limits() -> &'static Arc<MemoryLimitResolver> {
    static LIMITS: OnceLock<Arc<MemoryLimitResolver>> = OnceLock::new();
    LIMITS.get_or_init(|| Arc::new(MemoryLimitResolver::system()))
}

fn global_bounds() -> &'static Arc<SharedGcPercentBounds> {
    static BOUNDS: OnceLock<Arc<SharedGcPercentBounds>> = OnceLock::new();
    BOUNDS.get_or_init(|| Arc::new(SharedGcPercentBounds::default()))
}

/// Bind the process-wide governor to `runtime`. Succeeds once per process.
pub fn install(runtime: Arc<dyn CollectorRuntime>) -> GcTunerResult<&'static GcGovernor> {
    let mut installed = false;
    let governor = GLOBAL.get_or_init(|| {
        installed = true;
        GcGovernor::with_context(TunerContext {
            runtime,
            limits: global_limits().clone(),
            bounds: global_bounds().clone(),
        })
    });

    if installed {
        tracing::debug!(target = "nova.gctuner", "collector runtime installed");
        Ok(governor)
    } else {
        Err(GcTunerError::AlreadyInstalled)
    }
}

/// The process-wide governor, once [`install`] has run.
pub fn global() -> Option<&'static GcGovernor> {
    GLOBAL.get()
}

/// [`GcGovernor::enable`] on the process-wide governor.
///
/// Disabling before [`install`] is a no-op; anything else returns
/// [`GcTunerError::NotInstalled`].
pub fn enable(threshold: i64, options: impl IntoIterator<Item = GcTunerOption>) -> GcTunerResult<()> {
    match global() {
        Some(governor) => governor.enable(threshold, options),
        None => {
            let bounds = fold_options(global_bounds().load(), options)?;
            if threshold != 0 {
                return Err(GcTunerError::NotInstalled);
            }
            global_bounds().store(bounds);
            Ok(())
        }
    }
}

/// # Panics
///
/// Panics when [`enable`] returns an error.
pub fn must_enable(threshold: i64, options: impl IntoIterator<Item = GcTunerOption>) {
    if let Err(err) = enable(threshold, options) {
        panic!("failed to enable gc tuner: {err}");
    }
}

pub fn gc_percent() -> u32 {
    global().map_or_else(default_gc_percent, GcGovernor::gc_percent)
}

pub fn min_gc_percent() -> u32 {
    global_bounds().load().min()
}

pub fn max_gc_percent() -> u32 {
    global_bounds().load().max()
}

pub fn mem_limit_percent(percent: f64) -> u64 {
    global_limits().limit_percent(percent)
}

pub fn set_mem_limit_percent(percent: f64) {
    match global() {
        Some(governor) => governor.set_mem_limit_percent(percent),
        None => {
            global_limits().set_limit_percent(percent);
        }
    }
}
