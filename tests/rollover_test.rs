//! Rollover and Export Integration Tests
//!
//! Drives the counter and rollover manager with a manual clock:
//! - distinct counting within a window
//! - exactly one export per closed window
//! - ids tracked after a rollover belong to the new window
//! - tracking racing a rollover never loses or double-counts an id

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use verve_accept::counting::{Clock, ManualClock, UniqueCounter, WindowKey, WINDOW_MILLIS};
use verve_accept::export::{Exporter, InMemoryBus, DEFAULT_TOPIC};
use verve_accept::production::RolloverManager;

const T0: u64 = 28_333_333 * WINDOW_MILLIS;

fn setup() -> (ManualClock, InMemoryBus, Arc<UniqueCounter>, RolloverManager) {
    let clock = ManualClock::new(T0);
    let bus = InMemoryBus::new();
    let counter = Arc::new(UniqueCounter::new(T0));
    let exporter = Exporter::new(Arc::new(bus.clone()), DEFAULT_TOPIC);
    let manager = RolloverManager::new(counter.clone(), exporter, Arc::new(clock.clone()));
    (clock, bus, counter, manager)
}

// ============================================================================
// Scenario Tests
// ============================================================================

#[tokio::test]
async fn test_export_of_closed_window_then_new_window_counts() {
    let (clock, bus, counter, manager) = setup();
    let w = counter.current_key();

    for id in [1, 2, 1, 3] {
        counter.track(id);
    }
    assert_eq!(counter.current_count(), 3);

    clock.advance_ms(WINDOW_MILLIS);
    let export = manager.tick_and_export().await.expect("rollover expected");
    assert_eq!(export.key, w);
    assert_eq!(export.count, 3);

    counter.track(4);
    assert_eq!(counter.current_key(), w.next());
    assert_eq!(counter.current_count(), 1);

    let records = bus.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].topic, "verve-unique-counts");
    assert_eq!(records[0].key, w.to_string());
    assert_eq!(records[0].value, "3");
}

#[tokio::test]
async fn test_one_export_per_window_over_many_minutes() {
    let (clock, bus, counter, manager) = setup();

    for minute in 0..5u64 {
        for id in 0..(minute as i64 + 1) {
            counter.track(id);
            counter.track(id);
        }
        // Several ticks per minute; only the first after the boundary exports
        clock.advance_ms(WINDOW_MILLIS / 2);
        assert!(manager.tick_and_export().await.is_none());
        clock.advance_ms(WINDOW_MILLIS / 2);
        assert!(manager.tick_and_export().await.is_some());
        assert!(manager.tick_and_export().await.is_none());
    }

    let records = bus.records();
    let values: Vec<&str> = records.iter().map(|r| r.value.as_str()).collect();
    assert_eq!(values, vec!["1", "2", "3", "4", "5"]);

    let keys: Vec<u64> = records.iter().map(|r| r.key.parse().unwrap()).collect();
    for pair in keys.windows(2) {
        assert_eq!(pair[1], pair[0] + 1, "Adjacent exports must be adjacent windows");
    }
}

#[tokio::test]
async fn test_late_rollover_exports_outgoing_window_only() {
    let (clock, bus, counter, manager) = setup();
    let w = counter.current_key();
    counter.track(10);
    counter.track(11);

    clock.advance_ms(3 * WINDOW_MILLIS + 5);
    let export = manager.tick_and_export().await.unwrap();
    assert_eq!(export.key, w);
    assert_eq!(export.count, 2);
    assert_eq!(export.skipped_windows, 2);
    assert_eq!(counter.current_key(), WindowKey(w.0 + 3));
    assert_eq!(bus.len(), 1);
}

#[tokio::test]
async fn test_failed_export_does_not_affect_counting() {
    let (clock, bus, counter, manager) = setup();
    bus.set_failing(true);
    counter.track(1);

    clock.advance_ms(WINDOW_MILLIS);
    let export = manager.tick_and_export().await.unwrap();
    assert_eq!(export.count, 1);
    assert!(bus.is_empty());

    // Next window counts and exports normally once the bus recovers
    counter.track(2);
    counter.track(3);
    bus.set_failing(false);
    clock.advance_ms(WINDOW_MILLIS);
    manager.tick_and_export().await.unwrap();
    assert_eq!(bus.records()[0].value, "2");
}

// ============================================================================
// Boundary Race Test
// ============================================================================

#[test]
fn test_tracking_racing_rollover_is_linearizable() {
    let clock = ManualClock::new(T0);
    let counter = Arc::new(UniqueCounter::new(T0));
    let next_id = Arc::new(AtomicI64::new(0));
    let stop = Arc::new(AtomicBool::new(false));

    let writers: Vec<_> = (0..4)
        .map(|_| {
            let counter = counter.clone();
            let next_id = next_id.clone();
            let stop = stop.clone();
            std::thread::spawn(move || {
                let mut tracked = 0u64;
                while !stop.load(Ordering::Relaxed) {
                    // Every id is globally unique, so each must be counted exactly once
                    let id = next_id.fetch_add(1, Ordering::Relaxed);
                    assert!(counter.track(id));
                    tracked += 1;
                }
                tracked
            })
        })
        .collect();

    let mut exported = 0u64;
    let mut rollovers = 0;
    while rollovers < 200 {
        clock.advance_ms(WINDOW_MILLIS);
        if let Some(export) = counter.advance_window(clock.now_millis()) {
            exported += export.count;
            rollovers += 1;
        }
        std::thread::yield_now();
    }
    stop.store(true, Ordering::Relaxed);

    let tracked: u64 = writers.into_iter().map(|w| w.join().unwrap()).sum();
    let remaining = counter.current_count();

    assert_eq!(
        exported + remaining,
        tracked,
        "Every id must land in exactly one window"
    );
    counter.verify_invariants();
}
