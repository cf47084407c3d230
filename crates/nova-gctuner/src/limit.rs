use crate::cgroup::current_cgroup_memory_limit;
use crate::env::environment_memory_limit;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

/// Where memory limits come from, lowest precedence tiers first.
///
/// Implementations report "unknown" as `None`; the resolver additionally
/// treats `Some(0)` as unknown.
pub trait MemoryLimitSource: Send + Sync {
    /// Limit configured through the process environment.
    fn environment_limit(&self) -> Option<u64>;

    /// Limit imposed by the host or container.
    fn host_limit(&self) -> Option<u64>;
}

/// Default source: [`crate::env::GC_MEMORY_LIMIT_ENV_VAR`], then the cgroup
/// limit clamped to physical memory.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemMemorySource;

impl MemoryLimitSource for SystemMemorySource {
    fn environment_limit(&self) -> Option<u64> {
        environment_memory_limit()
    }

    fn host_limit(&self) -> Option<u64> {
        match (current_cgroup_memory_limit(), physical_memory_bytes()) {
            (Some(cgroup), Some(total)) => Some(cgroup.min(total)),
            (cgroup, total) => cgroup.or(total),
        }
    }
}

fn physical_memory_bytes() -> Option<u64> {
    static TOTAL: OnceLock<Option<u64>> = OnceLock::new();
    *TOTAL.get_or_init(|| {
        let mut system = sysinfo::System::new();
        system.refresh_memory();
        Some(system.total_memory()).filter(|&total| total > 0)
    })
}

/// Resolves the effective memory ceiling and tracks the explicit override.
pub struct MemoryLimitResolver {
    source: Arc<dyn MemoryLimitSource>,
    // 0 means "no override"; a zero-byte ceiling is never meaningful.
    override_bytes: AtomicU64,
}

impl MemoryLimitResolver {
    pub fn new(source: Arc<dyn MemoryLimitSource>) -> Self {
        Self {
            source,
            override_bytes: AtomicU64::new(0),
        }
    }

    pub fn system() -> Self {
        Self::new(Arc::new(SystemMemorySource))
    }

    pub fn memory_limit_override(&self) -> Option<u64> {
        Some(self.override_bytes.load(Ordering::Acquire)).filter(|&bytes| bytes > 0)
    }

    pub fn set_memory_limit_override(&self, bytes: Option<u64>) {
        self.override_bytes.store(bytes.unwrap_or(0), Ordering::Release);
    }

    pub fn clear_memory_limit_override(&self) {
        self.set_memory_limit_override(None);
    }

    /// Environment limit, then host limit. Ignores the override.
    pub fn detected_limit(&self) -> Option<u64> {
        self.source
            .environment_limit()
            .filter(|&limit| limit > 0)
            .or_else(|| self.source.host_limit().filter(|&limit| limit > 0))
    }

    /// Override, then environment limit, then host limit.
    pub fn effective_limit(&self) -> Option<u64> {
        self.memory_limit_override().or_else(|| self.detected_limit())
    }

    /// `percent` of the detected limit, in bytes.
    ///
    /// Negative percentages select the whole limit, zero (or NaN) yields 0 and
    /// anything above 100 is treated as 100. Returns 0 when no limit is known.
    pub fn limit_percent(&self, percent: f64) -> u64 {
        match self.detected_limit() {
            Some(limit) => percent_of(limit, percent),
            None => 0,
        }
    }

    /// Pin the override to `percent` of the detected limit.
    ///
    /// When the percentage resolves to 0 the override is cleared instead.
    /// Returns the stored override.
    pub fn set_limit_percent(&self, percent: f64) -> Option<u64> {
        let bytes = Some(self.limit_percent(percent)).filter(|&bytes| bytes > 0);
        self.set_memory_limit_override(bytes);
        bytes
    }

    /// Ceiling pushed to the collector while tuning toward `threshold`:
    /// override, then environment limit, then the threshold itself.
    pub fn ceiling_for(&self, threshold: u64) -> u64 {
        self.memory_limit_override()
            .or_else(|| self.source.environment_limit().filter(|&limit| limit > 0))
            .unwrap_or(threshold)
    }
}

impl std::fmt::Debug for MemoryLimitResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryLimitResolver")
            .field("override_bytes", &self.memory_limit_override())
            .finish_non_exhaustive()
    }
}

fn percent_of(limit: u64, percent: f64) -> u64 {
    if percent.is_nan() || percent == 0.0 {
        return 0;
    }
    if percent < 0.0 || percent >= 100.0 {
        return limit;
    }

    let value = percent * limit as f64 / 100.0;
    if value >= u64::MAX as f64 {
        u64::MAX
    } else {
        value as u64
    }
}
