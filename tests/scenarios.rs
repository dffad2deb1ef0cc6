//! End-to-end scenarios for the overlay and the scheduler.
//!
//! Each test walks one interaction from proposal or input to the value the
//! presentation layer ends up rendering.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use common::*;
use speculative_view::prelude::*;

// ============================================================================
// Mutation overlay
// ============================================================================

#[test]
fn single_mutation_confirmed() {
    init_test_logging();
    let mut overlay: MutationOverlay<&str, i64> = MutationOverlay::new();
    overlay.set_base("counter", 10);

    let a = overlay.propose("counter", |n| n + 1);
    assert_eq!(overlay.merged(&"counter"), Some(11));

    assert_eq!(overlay.reconcile(&a, 11), Resolution::Resolved);
    assert_eq!(overlay.merged(&"counter"), Some(11));
    assert!(!overlay.is_pending(&"counter"));
}

#[test]
fn confirmations_out_of_order() {
    init_test_logging();
    let mut overlay: MutationOverlay<&str, i64> = MutationOverlay::new();
    overlay.set_base("counter", 10);

    let a = overlay.propose("counter", |n| n + 1);
    let b = overlay.propose("counter", |n| n + 2);
    assert_eq!(overlay.merged(&"counter"), Some(13));

    // B's server applied +2 to 10 first; A is still replayed on top.
    overlay.reconcile(&b, 12);
    assert_eq!(overlay.merged(&"counter"), Some(13));

    overlay.reconcile(&a, 13);
    assert_eq!(overlay.merged(&"counter"), Some(13));
    assert_eq!(overlay.pending_count(&"counter"), 0);
}

#[test]
fn failed_write_reverts() {
    init_test_logging();
    let mut overlay: MutationOverlay<&str, i64> = MutationOverlay::new();
    overlay.set_base("counter", 10);

    let a = overlay.propose("counter", |n| n + 1);
    assert_eq!(overlay.revert(&a), Resolution::Resolved);
    assert_eq!(overlay.merged(&"counter"), Some(10));

    // A late confirmation for the reverted write changes nothing.
    assert_eq!(overlay.reconcile(&a, 99), Resolution::AlreadyResolved);
    assert_eq!(overlay.merged(&"counter"), Some(10));
}

#[test]
fn todo_list_with_refetch() {
    init_test_logging();
    let mut overlay: MutationOverlay<&str, Vec<String>> = MutationOverlay::new();
    overlay.set_base("todos", vec!["write docs".to_string()]);

    let add = overlay.propose_labeled("todos", "add", |mut todos: Vec<String>| {
        todos.push("ship it".to_string());
        todos
    });
    let names: Vec<_> = overlay.pending(&"todos").filter_map(|m| m.label).collect();
    assert_eq!(names, vec!["add"]);

    // A refetch started before the write lands loses to a newer one.
    let old_fetch = overlay.begin_epoch(&"todos");
    let new_fetch = overlay.begin_epoch(&"todos");
    let fresh = vec!["write docs".to_string(), "ship it".to_string()];
    assert!(overlay.refresh(&"todos", Stamped::new(new_fetch, fresh.clone())));
    assert!(!overlay.refresh(&"todos", Stamped::new(old_fetch, Vec::new())));

    // The add predates the latest fetch, whose result already contains it.
    assert_eq!(overlay.discard_stale(&"todos"), 1);
    assert!(!overlay.contains(&add));
    assert_eq!(overlay.merged(&"todos"), Some(fresh));
}

// ============================================================================
// Deferred scheduler
// ============================================================================

#[test]
fn typing_burst_computes_once() {
    init_test_logging();
    let runs = Arc::new(AtomicUsize::new(0));
    let mut scheduler: DeferredScheduler<&str, u64, u64> = DeferredScheduler::new();
    let window = Duration::from_millis(150);
    let start = Instant::now();

    for (i, value) in (1..=3).enumerate() {
        let now = at(start, i as u64 * 30);
        scheduler.set_live_at("query", value, now);
        let runs = Arc::clone(&runs);
        scheduler.settle_at(
            "query",
            move |v: &u64| {
                runs.fetch_add(1, Ordering::SeqCst);
                v * 2
            },
            window,
            now,
        );
        assert!(scheduler.is_catching_up(&"query"));
        assert_eq!(scheduler.run_due_at(now), 0);
    }

    assert_eq!(scheduler.run_due_at(at(start, 60 + 150)), 1);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(scheduler.settled(&"query"), Some(&6));
    assert!(!scheduler.is_catching_up(&"query"));
    assert_eq!(scheduler.stats().coalesced, 2);
}

#[test]
fn late_result_for_older_epoch_is_dropped() {
    init_test_logging();
    let mut scheduler: DeferredScheduler<&str, u64, u64> = DeferredScheduler::new();
    let start = Instant::now();

    for value in 1..=5 {
        scheduler.set_live_at("query", value, start);
    }
    scheduler.settle("query", |v: &u64| v * 10, Duration::ZERO);
    let fifth = scheduler.poll_at(start).pop().unwrap();
    assert_eq!(fifth.epoch(), Epoch::new(5));

    scheduler.set_live_at("query", 6, start);
    scheduler.settle("query", |v: &u64| v * 10, Duration::ZERO);
    let sixth = scheduler.poll_at(start).pop().unwrap();
    assert_eq!(sixth.epoch(), Epoch::new(6));

    assert!(scheduler.publish(sixth.run()).is_published());
    assert_eq!(
        scheduler.publish(fifth.run()),
        PublishOutcome::Stale {
            received: Epoch::new(5),
            current: Epoch::new(6),
        }
    );
    assert_eq!(scheduler.settled(&"query"), Some(&60));
    assert!(!scheduler.is_scheduled(&"query"));
}

// ============================================================================
// View façade
// ============================================================================

#[test]
fn facade_routes_by_semantics() {
    init_test_logging();
    let config = EngineConfigBuilder::new()
        .channel("likes", ChannelConfig::default().with_semantics(ChannelSemantics::Overlay))
        .channel("search", ChannelConfig::typing())
        .build()
        .unwrap();
    let mut engine: SpeculativeView<&str, u32> = SpeculativeView::new(config)
        .unwrap()
        .with_derivation(|n: &u32| n + 100);
    let start = Instant::now();

    engine.set_base("likes", 1).unwrap();
    engine.propose("likes", |n| n + 1).unwrap();
    engine.set_live_at("search", 7, start).unwrap();

    assert!(matches!(
        engine.set_live_at("likes", 3, start),
        Err(EngineError::SemanticsMismatch { .. })
    ));
    assert!(matches!(
        engine.propose("search", |n| n),
        Err(EngineError::SemanticsMismatch { .. })
    ));

    let likes = engine.snapshot(&"likes");
    assert_eq!(likes.view, Some(2));
    assert!(likes.is_pending());

    // The typing preset waits 300ms.
    assert_eq!(engine.run_due_at(at(start, 299)), 0);
    assert_eq!(engine.run_due_at(at(start, 300)), 1);
    let search = engine.snapshot(&"search");
    assert_eq!(search.settled.as_ref().map(|s| s.value), Some(107));
    assert!(search.is_quiescent());
}
