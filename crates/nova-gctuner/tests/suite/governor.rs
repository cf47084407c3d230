use crate::suite::support::{suite_lock, FakeCollector, FixedLimits};
use nova_gctuner::env::default_gc_percent;
use nova_gctuner::{
    with_max_gc_percent, with_min_gc_percent, GcGovernor, GcTunerError, GcTunerReport, GB,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn governor(limits: FixedLimits) -> (Arc<FakeCollector>, GcGovernor) {
    let collector = Arc::new(FakeCollector::new(100));
    let governor = GcGovernor::with_limit_source(collector.clone(), Arc::new(limits));
    (collector, governor)
}

#[test]
fn disabling_always_succeeds_and_reports_default() {
    let _lock = suite_lock();
    let (collector, governor) = governor(FixedLimits::default());

    governor.enable(0, []).unwrap();
    assert_eq!(governor.gc_percent(), default_gc_percent());

    governor.enable(GB as i64, []).unwrap();
    collector.collect(GB / 4);
    assert_eq!(governor.gc_percent(), 300);

    governor.enable(0, []).unwrap();
    assert_eq!(governor.gc_percent(), default_gc_percent());
    assert_eq!(collector.armed(), 1, "stale callback is still registered");
    collector.collect(GB / 2);
    assert_eq!(collector.applied_gc_percent(), 300);
    assert_eq!(collector.armed(), 0);
}

#[test]
fn derived_threshold_prefers_override_over_detection() {
    let _lock = suite_lock();
    let (collector, governor) = governor(FixedLimits {
        env: None,
        host: Some(64 * GB),
    });
    governor.limits().set_memory_limit_override(Some(4096));

    governor.enable(-1, []).unwrap();
    assert_eq!(governor.threshold(), Some(4096));

    collector.collect(1024);
    assert_eq!(collector.applied_memory_limit(), 4096);
    assert_eq!(governor.gc_percent(), 300);
}

#[test]
fn derived_threshold_uses_whole_limit_without_override() {
    let _lock = suite_lock();
    let (_collector, governor) = governor(FixedLimits {
        env: Some(2 * GB),
        host: Some(64 * GB),
    });

    governor.enable(-1, []).unwrap();
    assert_eq!(governor.threshold(), Some(2 * GB));

    let (_collector, unknown) = self::governor(FixedLimits::default());
    assert_eq!(
        unknown.enable(-1, []),
        Err(GcTunerError::UnresolvableThreshold)
    );
    assert_eq!(unknown.threshold(), None);
}

#[test]
fn bounds_follow_options_and_shape_the_result() {
    let _lock = suite_lock();
    let (collector, governor) = governor(FixedLimits::default());

    governor
        .enable(
            (4 * GB) as i64,
            [with_min_gc_percent(20), with_max_gc_percent(200)],
        )
        .unwrap();
    assert_eq!((governor.min_gc_percent(), governor.max_gc_percent()), (20, 200));

    collector.collect(GB);
    assert_eq!(governor.gc_percent(), 200);
    collector.collect(3 * GB);
    assert_eq!(governor.gc_percent(), 33);
    collector.collect(5 * GB);
    assert_eq!(governor.gc_percent(), 20);

    // Bounds changes take effect on the next cycle of the live tuner.
    governor.enable((4 * GB) as i64, [with_min_gc_percent(50)]).unwrap();
    collector.collect(3 * GB);
    assert_eq!(governor.gc_percent(), 50);
}

#[test]
fn gc_percent_readers_never_observe_torn_values() {
    let _lock = suite_lock();
    let (collector, governor) = governor(FixedLimits::default());
    let governor = Arc::new(governor);
    governor.enable((4 * GB) as i64, []).unwrap();

    let valid = [default_gc_percent(), 500, 300, 100, 50];
    let done = Arc::new(AtomicBool::new(false));
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let governor = governor.clone();
            let done = done.clone();
            std::thread::spawn(move || {
                let mut observed = 0usize;
                loop {
                    let percent = governor.gc_percent();
                    assert!(valid.contains(&percent), "torn percent {percent}");
                    observed += 1;
                    if done.load(Ordering::SeqCst) {
                        return observed;
                    }
                }
            })
        })
        .collect();

    for round in 0..2_000u64 {
        let heap = match round % 4 {
            0 => GB / 2,
            1 => GB,
            2 => 2 * GB,
            _ => 3 * GB,
        };
        collector.collect(heap);
    }
    done.store(true, Ordering::SeqCst);

    for reader in readers {
        assert!(reader.join().unwrap() > 0);
    }
}

#[test]
fn report_round_trips_through_json() {
    let _lock = suite_lock();
    let (collector, governor) = governor(FixedLimits {
        env: None,
        host: Some(8 * GB),
    });
    governor.set_mem_limit_percent(50.0);
    governor.enable(-1, []).unwrap();
    collector.collect(GB);

    let report = governor.report();
    assert_eq!(report.threshold_bytes, Some(4 * GB));
    assert_eq!(report.memory_limit_override_bytes, Some(4 * GB));
    assert_eq!(report.effective_memory_limit_bytes, Some(4 * GB));
    assert_eq!(report.gc_percent, 300);
    assert_eq!(report.previous_gc_percent, Some(100));

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["threshold_bytes"], serde_json::json!(4 * GB));
    assert_eq!(json["beats"], serde_json::json!(1));
    let decoded: GcTunerReport = serde_json::from_value(json).unwrap();
    assert_eq!(decoded, report);
}
