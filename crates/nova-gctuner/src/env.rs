//! Process environment knobs.
//!
//! The static default GC percent is captured once, on first use, and behaves as
//! an immutable snapshot afterwards. The environment memory limit is re-read on
//! every call so operators can adjust it without restarting the tuner.

use crate::byte_count::parse_byte_count;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;

/// Integer GC percent the collector runs with when nothing is tuning it.
pub const GC_PERCENT_ENV_VAR: &str = "NOVA_GC_PERCENT";
/// Byte literal (see [`parse_byte_count`]) for the collector's memory limit.
pub const GC_MEMORY_LIMIT_ENV_VAR: &str = "NOVA_GC_MEMORY_LIMIT";
/// Percent used when [`GC_PERCENT_ENV_VAR`] is absent, negative or invalid.
pub const FALLBACK_GC_PERCENT: u32 = 100;

const UNSET: u32 = u32::MAX;

static DEFAULT_GC_PERCENT: AtomicU32 = AtomicU32::new(UNSET);

/// The GC percent used for "insufficient information" decisions and reported
/// while the tuner is disabled.
pub fn default_gc_percent() -> u32 {
    let cached = DEFAULT_GC_PERCENT.load(Ordering::Acquire);
    if cached != UNSET {
        return cached;
    }

    let value = parse_gc_percent(std::env::var(GC_PERCENT_ENV_VAR).ok().as_deref());
    match DEFAULT_GC_PERCENT.compare_exchange(UNSET, value, Ordering::AcqRel, Ordering::Acquire) {
        Ok(_) => value,
        // Another thread captured the snapshot first; keep theirs.
        Err(existing) => existing,
    }
}

/// Forget the captured default so the next [`default_gc_percent`] call reads
/// the environment again. Only meant for test isolation.
#[doc(hidden)]
pub fn reset_default_gc_percent() {
    DEFAULT_GC_PERCENT.store(UNSET, Ordering::Release);
}

fn parse_gc_percent(raw: Option<&str>) -> u32 {
    raw.and_then(|raw| raw.trim().parse::<i32>().ok())
        .and_then(|value| u32::try_from(value).ok())
        .unwrap_or(FALLBACK_GC_PERCENT)
}

/// Memory limit configured through [`GC_MEMORY_LIMIT_ENV_VAR`].
///
/// Returns `None` when the variable is unset, empty, `off`, zero or
/// unparseable. Parse failures fall through to the next precedence tier.
pub fn environment_memory_limit() -> Option<u64> {
    let raw = std::env::var(GC_MEMORY_LIMIT_ENV_VAR).ok()?;
    parse_memory_limit(&raw)
}

fn parse_memory_limit(raw: &str) -> Option<u64> {
    if raw.is_empty() || raw == "off" {
        return None;
    }

    match parse_byte_count(raw) {
        Some(0) => None,
        Some(limit) => Some(limit),
        None => {
            static REPORTED_MEMORY_LIMIT_PARSE_ERROR: OnceLock<()> = OnceLock::new();
            if REPORTED_MEMORY_LIMIT_PARSE_ERROR.set(()).is_ok() {
                tracing::debug!(
                    target = "nova.gctuner",
                    var = GC_MEMORY_LIMIT_ENV_VAR,
                    raw,
                    "ignoring unparseable memory limit"
                );
            }
            None
        }
    }
}
