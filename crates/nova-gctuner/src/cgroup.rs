//! Best-effort container memory limit discovery (cgroup v1 and v2).

use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// A cgroup hierarchy able to carry a memory limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CgroupHierarchy {
    /// cgroup v2, listed as `0::/path`.
    Unified,
    /// cgroup v1 memory controller, listed as `5:memory:/path`.
    LegacyMemory,
}

impl CgroupHierarchy {
    /// Probe order. When a host mounts both, the unified limit wins.
    pub const PROBE_ORDER: [CgroupHierarchy; 2] = [Self::Unified, Self::LegacyMemory];

    pub fn limit_file(self) -> &'static str {
        match self {
            Self::Unified => "memory.max",
            Self::LegacyMemory => "memory.limit_in_bytes",
        }
    }

    fn default_mount(self) -> &'static str {
        match self {
            Self::Unified => "/sys/fs/cgroup",
            Self::LegacyMemory => "/sys/fs/cgroup/memory",
        }
    }

    fn owns_entry(self, hierarchy_id: &str, controllers: &str) -> bool {
        match self {
            Self::Unified => hierarchy_id == "0" && controllers.is_empty(),
            Self::LegacyMemory => controllers.split(',').any(|name| name.trim() == "memory"),
        }
    }
}

/// Which cgroup the process belongs to in each memory-relevant hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CgroupMembership {
    unified: Option<String>,
    legacy_memory: Option<String>,
}

impl CgroupMembership {
    /// Read membership from `/proc/self/cgroup` text. First entry per
    /// hierarchy wins; malformed lines are skipped.
    pub fn parse(contents: &str) -> Self {
        let mut membership = Self::default();
        for (hierarchy_id, controllers, path) in contents.lines().filter_map(split_entry) {
            for hierarchy in CgroupHierarchy::PROBE_ORDER {
                let slot = membership.slot_mut(hierarchy);
                if slot.is_none() && hierarchy.owns_entry(hierarchy_id, controllers) {
                    *slot = Some(path.to_string());
                }
            }
        }
        membership
    }

    pub fn with_path(mut self, hierarchy: CgroupHierarchy, path: impl Into<String>) -> Self {
        *self.slot_mut(hierarchy) = Some(path.into());
        self
    }

    pub fn path(&self, hierarchy: CgroupHierarchy) -> Option<&str> {
        match hierarchy {
            CgroupHierarchy::Unified => self.unified.as_deref(),
            CgroupHierarchy::LegacyMemory => self.legacy_memory.as_deref(),
        }
    }

    fn slot_mut(&mut self, hierarchy: CgroupHierarchy) -> &mut Option<String> {
        match hierarchy {
            CgroupHierarchy::Unified => &mut self.unified,
            CgroupHierarchy::LegacyMemory => &mut self.legacy_memory,
        }
    }
}

// `<hierarchy-id>:<controllers>:<path>`; the path itself may contain ':'.
fn split_entry(line: &str) -> Option<(&str, &str, &str)> {
    let (hierarchy_id, rest) = line.trim().split_once(':')?;
    let (controllers, path) = rest.split_once(':')?;
    let path = path.trim();
    (!path.is_empty()).then_some((hierarchy_id, controllers, path))
}

// At or above 1 EiB is how runtimes spell "no limit" on cgroup v1.
const UNLIMITED_THRESHOLD_BYTES: u64 = 1 << 60;

/// Parse the contents of `memory.max` (v2) or `memory.limit_in_bytes` (v1).
///
/// `max`, empty, zero, unparseable and effectively-unlimited values are `None`.
pub fn parse_memory_limit_file(raw: &str) -> Option<u64> {
    match raw.trim() {
        "" | "max" => None,
        value => match value.parse::<u64>() {
            Ok(bytes) => {
                Some(bytes).filter(|&bytes| bytes > 0 && bytes < UNLIMITED_THRESHOLD_BYTES)
            }
            Err(err) => {
                static REPORTED_LIMIT_PARSE_ERROR: OnceLock<()> = OnceLock::new();
                if REPORTED_LIMIT_PARSE_ERROR.set(()).is_ok() {
                    tracing::debug!(
                        target = "nova.gctuner",
                        value,
                        error = %err,
                        "unexpected cgroup memory limit value"
                    );
                }
                None
            }
        },
    }
}

/// Where each cgroup hierarchy is mounted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CgroupMounts {
    pub unified: PathBuf,
    pub legacy_memory: PathBuf,
}

impl Default for CgroupMounts {
    fn default() -> Self {
        Self {
            unified: PathBuf::from(CgroupHierarchy::Unified.default_mount()),
            legacy_memory: PathBuf::from(CgroupHierarchy::LegacyMemory.default_mount()),
        }
    }
}

impl CgroupMounts {
    pub fn mount(&self, hierarchy: CgroupHierarchy) -> &Path {
        match hierarchy {
            CgroupHierarchy::Unified => &self.unified,
            CgroupHierarchy::LegacyMemory => &self.legacy_memory,
        }
    }

    /// Memory limit of the first hierarchy in [`CgroupHierarchy::PROBE_ORDER`]
    /// that has one.
    pub fn memory_limit(&self, membership: &CgroupMembership) -> Option<u64> {
        CgroupHierarchy::PROBE_ORDER.into_iter().find_map(|hierarchy| {
            let path = membership.path(hierarchy)?;
            self.hierarchy_limit(hierarchy, path)
        })
    }

    /// Limits are inherited, so the tightest one among the cgroup and all of
    /// its ancestors applies.
    fn hierarchy_limit(&self, hierarchy: CgroupHierarchy, cgroup_path: &str) -> Option<u64> {
        let mount = self.mount(hierarchy);
        Path::new(cgroup_path.trim_start_matches('/'))
            .ancestors()
            .filter_map(|dir| read_limit_file(&mount.join(dir).join(hierarchy.limit_file())))
            .min()
    }
}

fn read_limit_file(path: &Path) -> Option<u64> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return None,
        Err(err) => {
            // Sandboxes commonly deny cgroup reads; report only the first one.
            static REPORTED_READ_ERROR: OnceLock<()> = OnceLock::new();
            if REPORTED_READ_ERROR.set(()).is_ok() {
                tracing::debug!(
                    target = "nova.gctuner",
                    path = %path.display(),
                    error = %err,
                    "failed to read cgroup memory limit"
                );
            }
            return None;
        }
    };
    parse_memory_limit_file(&raw)
}

/// Memory limit of the cgroup this process runs in, if any.
#[cfg(target_os = "linux")]
pub fn current_cgroup_memory_limit() -> Option<u64> {
    let contents = match std::fs::read_to_string("/proc/self/cgroup") {
        Ok(contents) => contents,
        Err(err) => {
            if err.kind() != io::ErrorKind::NotFound {
                tracing::debug!(
                    target = "nova.gctuner",
                    error = %err,
                    "failed to read /proc/self/cgroup while probing memory limit"
                );
            }
            return None;
        }
    };

    CgroupMounts::default().memory_limit(&CgroupMembership::parse(&contents))
}

#[cfg(not(target_os = "linux"))]
pub fn current_cgroup_memory_limit() -> Option<u64> {
    None
}
