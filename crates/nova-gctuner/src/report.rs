use serde::{Deserialize, Serialize};

/// Snapshot of governor state intended for telemetry and bug reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GcTunerReport {
    pub enabled: bool,
    pub threshold_bytes: Option<u64>,
    pub gc_percent: u32,
    pub previous_gc_percent: Option<u32>,
    pub min_gc_percent: u32,
    pub max_gc_percent: u32,
    pub memory_limit_override_bytes: Option<u64>,
    pub effective_memory_limit_bytes: Option<u64>,
    pub beats: u64,
}

impl GcTunerReport {
    /// Distance between the threshold and the effective limit, when both are known.
    pub fn headroom_bytes(&self) -> Option<u64> {
        let threshold = self.threshold_bytes?;
        let limit = self.effective_memory_limit_bytes?;
        Some(limit.saturating_sub(threshold))
    }
}
