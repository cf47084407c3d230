//! Heap-threshold driven GC percent tuning.
//!
//! A collector that triggers a cycle once its live heap grows by `gc_percent`
//! past the previous post-collection size can be steered toward a byte
//! threshold: after every cycle the [`Tuner`] solves
//!
//! ```text
//! threshold = in_use + in_use * gc_percent / 100
//! ```
//!
//! for `gc_percent`, clamped to `[min, max]`. Far below the threshold the
//! collector runs lazily; at or above it, as eagerly as `min` allows.
//!
//! The collector is reached through [`CollectorRuntime`]. Runtimes with a
//! post-collection hook report cycles through a [`CycleNotifier`]; runtimes
//! without one can approximate cycles with an [`IntervalNotifier`].
//!
//! Thresholds can be given in bytes or derived from the effective memory
//! limit, resolved in this order:
//!
//! 1. the override pinned with [`set_mem_limit_percent`]
//! 2. `NOVA_GC_MEMORY_LIMIT` (byte literal, see [`parse_byte_count`])
//! 3. the cgroup limit, clamped to physical memory
//!
//! Exactly one governor steers the process through the module-level functions
//! ([`install`], [`enable`], ...). Independent governors can be created with
//! [`GcGovernor`] directly.

pub mod auto;
mod byte_count;
mod cgroup;
pub mod env;
mod error;
mod governor;
mod heartbeat;
mod limit;
mod percent;
mod poller;
mod report;
mod runtime;
mod tuner;

pub use byte_count::{parse_byte_count, MAX_BYTE_COUNT};
pub use cgroup::{
    current_cgroup_memory_limit, parse_memory_limit_file, CgroupHierarchy, CgroupMembership,
    CgroupMounts,
};
pub use error::{GcTunerError, GcTunerResult};
pub use governor::{
    enable, gc_percent, global, install, max_gc_percent, mem_limit_percent, min_gc_percent,
    must_enable, set_mem_limit_percent, with_max_gc_percent, with_min_gc_percent, GcGovernor,
    GcTunerOption,
};
pub use heartbeat::Heartbeat;
pub use limit::{MemoryLimitResolver, MemoryLimitSource, SystemMemorySource};
pub use percent::{
    calc_gc_percent, calc_gc_percent_with_default, GcPercentBounds, SharedGcPercentBounds,
    DEFAULT_MAX_GC_PERCENT, DEFAULT_MIN_GC_PERCENT,
};
pub use poller::IntervalNotifier;
pub use report::GcTunerReport;
pub use runtime::{CollectionCallback, CollectorRuntime, CycleNotifier};
pub use tuner::{Tuner, TunerContext};

pub const KB: u64 = 1024;
pub const MB: u64 = 1024 * KB;
pub const GB: u64 = 1024 * MB;
