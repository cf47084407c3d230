use crate::suite::support::{suite_lock, EnvVarGuard};
use nova_gctuner::env::{
    default_gc_percent, environment_memory_limit, reset_default_gc_percent,
    GC_MEMORY_LIMIT_ENV_VAR, GC_PERCENT_ENV_VAR,
};
use nova_gctuner::{MemoryLimitResolver, MB};

#[test]
fn default_gc_percent_is_captured_once_from_env() {
    let _lock = suite_lock();

    {
        let _env = EnvVarGuard::set(GC_PERCENT_ENV_VAR, "200");
        reset_default_gc_percent();
        assert_eq!(default_gc_percent(), 200);

        // Snapshot: later environment changes are not observed.
        let _env = EnvVarGuard::set(GC_PERCENT_ENV_VAR, "300");
        assert_eq!(default_gc_percent(), 200);
    }

    for raw in ["-1", "not-a-number"] {
        let _env = EnvVarGuard::set(GC_PERCENT_ENV_VAR, raw);
        reset_default_gc_percent();
        assert_eq!(default_gc_percent(), 100, "raw {raw:?}");
    }

    let _env = EnvVarGuard::unset(GC_PERCENT_ENV_VAR);
    reset_default_gc_percent();
    assert_eq!(default_gc_percent(), 100);
}

#[test]
fn environment_memory_limit_feeds_system_resolver() {
    let _lock = suite_lock();

    {
        let _env = EnvVarGuard::set(GC_MEMORY_LIMIT_ENV_VAR, "off");
        assert_eq!(environment_memory_limit(), None);
    }

    let _env = EnvVarGuard::set(GC_MEMORY_LIMIT_ENV_VAR, "128MiB");
    assert_eq!(environment_memory_limit(), Some(128 * MB));

    let limits = MemoryLimitResolver::system();
    assert_eq!(limits.detected_limit(), Some(128 * MB));
    assert_eq!(limits.limit_percent(50.0), 64 * MB);
    assert_eq!(limits.ceiling_for(MB), 128 * MB);

    limits.set_memory_limit_override(Some(4096));
    assert_eq!(limits.effective_limit(), Some(4096));
}
