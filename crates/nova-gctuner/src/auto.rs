//! Opinionated defaults: tune toward 70% of the detected memory limit.
//!
//! The percentage is a caller-side convention layered on top of
//! `enable(-1)`, which on its own derives the threshold from the whole limit.

use crate::error::GcTunerResult;
use crate::governor::{
    install as install_runtime, with_max_gc_percent, with_min_gc_percent, GcGovernor,
};
use crate::percent::{DEFAULT_MAX_GC_PERCENT, DEFAULT_MIN_GC_PERCENT};
use crate::runtime::CollectorRuntime;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const DEFAULT_MEMORY_LIMIT_PERCENT: f64 = 70.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoConfig {
    /// Share of the detected memory limit used as both ceiling and threshold.
    pub memory_limit_percent: f64,
    pub min_gc_percent: u32,
    pub max_gc_percent: u32,
}

impl Default for AutoConfig {
    fn default() -> Self {
        Self {
            memory_limit_percent: DEFAULT_MEMORY_LIMIT_PERCENT,
            min_gc_percent: DEFAULT_MIN_GC_PERCENT,
            max_gc_percent: DEFAULT_MAX_GC_PERCENT,
        }
    }
}

impl AutoConfig {
    /// Pin the memory limit override, then derive the threshold from it.
    ///
    /// Fails when no memory limit can be detected or the bounds are invalid.
    pub fn apply(&self, governor: &GcGovernor) -> GcTunerResult<()> {
        governor.set_mem_limit_percent(self.memory_limit_percent);
        governor.enable(
            -1,
            [
                with_min_gc_percent(self.min_gc_percent),
                with_max_gc_percent(self.max_gc_percent),
            ],
        )
    }
}

/// Install the process-wide governor for `runtime` and apply [`AutoConfig::default`].
pub fn install(runtime: Arc<dyn CollectorRuntime>) -> GcTunerResult<&'static GcGovernor> {
    let governor = install_runtime(runtime)?;
    AutoConfig::default().apply(governor)?;
    Ok(governor)
}
