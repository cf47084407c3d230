use crate::env::default_gc_percent;
use crate::error::{GcTunerError, GcTunerResult};
use std::sync::atomic::{AtomicU64, Ordering};

pub const DEFAULT_MIN_GC_PERCENT: u32 = 50;
pub const DEFAULT_MAX_GC_PERCENT: u32 = 500;

/// Validated `[min, max]` clamp for the GC percent.
///
/// Both ends are at least 1 and `min <= max`; constructing a value any other
/// way is impossible, so [`GcPercentBounds::clamp`] never panics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GcPercentBounds {
    min: u32,
    max: u32,
}

impl GcPercentBounds {
    pub fn new(min: u32, max: u32) -> GcTunerResult<Self> {
        if min == 0 {
            return Err(GcTunerError::InvalidMinGcPercent(min));
        }
        if max == 0 {
            return Err(GcTunerError::InvalidMaxGcPercent(max));
        }
        if min > max {
            return Err(GcTunerError::MinAboveMax { min, max });
        }
        Ok(Self { min, max })
    }

    pub fn min(self) -> u32 {
        self.min
    }

    pub fn max(self) -> u32 {
        self.max
    }

    pub fn clamp(self, percent: u32) -> u32 {
        percent.clamp(self.min, self.max)
    }

    fn pack(self) -> u64 {
        (u64::from(self.min) << 32) | u64::from(self.max)
    }

    fn unpack(packed: u64) -> Self {
        Self {
            min: (packed >> 32) as u32,
            max: packed as u32,
        }
    }
}

impl Default for GcPercentBounds {
    fn default() -> Self {
        Self {
            min: DEFAULT_MIN_GC_PERCENT,
            max: DEFAULT_MAX_GC_PERCENT,
        }
    }
}

/// Bounds shared between a governor and its tuning step.
///
/// Both ends live in a single atomic word so a concurrent update is observed
/// either entirely or not at all.
#[derive(Debug)]
pub struct SharedGcPercentBounds {
    packed: AtomicU64,
}

impl SharedGcPercentBounds {
    pub fn new(bounds: GcPercentBounds) -> Self {
        Self {
            packed: AtomicU64::new(bounds.pack()),
        }
    }

    pub fn load(&self) -> GcPercentBounds {
        GcPercentBounds::unpack(self.packed.load(Ordering::Acquire))
    }

    /// Replace the bounds, returning the previous pair.
    pub fn store(&self, bounds: GcPercentBounds) -> GcPercentBounds {
        GcPercentBounds::unpack(self.packed.swap(bounds.pack(), Ordering::AcqRel))
    }
}

impl Default for SharedGcPercentBounds {
    fn default() -> Self {
        Self::new(GcPercentBounds::default())
    }
}

/*
          Heap
    _________________  => limit: hard memory ceiling (override / env / host)
    |               |
    |---------------|  => threshold: raise the percent while gc_trigger < threshold
    |               |
    |---------------|  => gc_trigger: in_use + in_use * percent / 100
    |               |
    |---------------|
    |    in_use     |
    |_______________|
*/

/// Solve `threshold = in_use + in_use * percent / 100` for `percent`.
///
/// Uses the process default percent when either input is zero.
pub fn calc_gc_percent(in_use: u64, threshold: u64, bounds: GcPercentBounds) -> u32 {
    calc_gc_percent_with_default(in_use, threshold, bounds, default_gc_percent())
}

/// [`calc_gc_percent`] with the fallback percent passed explicitly.
pub fn calc_gc_percent_with_default(
    in_use: u64,
    threshold: u64,
    bounds: GcPercentBounds,
    default_percent: u32,
) -> u32 {
    if in_use == 0 || threshold == 0 {
        return default_percent;
    }

    // The heap already sits at or past the envelope: collect as often as allowed.
    if threshold <= in_use {
        return bounds.min();
    }

    let diff = u128::from(threshold - in_use);
    let percent = diff * 100 / u128::from(in_use);
    bounds.clamp(u32::try_from(percent).unwrap_or(u32::MAX))
}
