//! Concurrent Update Tests
//!
//! T1 and T2 both append their name to the same entity. T1 reads first and
//! writes after `T1_LONG` (last to write) or `T1_SHORT` (first to write).

use crate::common::*;
use retrytx::{LockMode, NonVersioned, Versioned, WorkerOutcome};

fn plus(suffix: &str) -> String {
    format!("{}{}", INITIAL_CONTENT, suffix)
}

fn assert_final(result: &RaceResult, suffix: &str, change_count: u32) {
    assert_eq!(result.content(), plus(suffix), "{:#?}", result);
    assert_eq!(result.change_count(), change_count, "{:#?}", result);
}

// ============================================================================
// No lock: last committer wins, versioned loser retries
// ============================================================================

#[test]
fn no_lock_non_versioned_last_committer_wins() {
    let result = race_updates::<NonVersioned>(LockMode::None, T1_LONG, LockMode::None, false);
    assert_final(&result, " plus T1", 1);
    assert!(!result.t1.failed());
    assert!(!result.t2.failed());

    let result = race_updates::<NonVersioned>(LockMode::None, T1_SHORT, LockMode::None, false);
    assert_final(&result, " plus T2", 1);
}

#[test]
fn no_lock_versioned_loser_retries() {
    let result = race_updates::<Versioned>(LockMode::None, T1_LONG, LockMode::None, false);
    assert_final(&result, " plus T2 plus T1", 2);
    assert_eq!(result.entity.as_ref().unwrap().version(), Some(2));

    let result = race_updates::<Versioned>(LockMode::None, T1_SHORT, LockMode::None, false);
    assert_final(&result, " plus T1 plus T2", 2);
}

// ============================================================================
// Optimistic
// ============================================================================

#[test]
fn optimistic_on_non_versioned_fails_both() {
    let result = race_updates::<NonVersioned>(LockMode::Optimistic, T1_LONG, LockMode::Optimistic, false);
    assert_final(&result, "", 0);
    assert!(result.t1.failed());
    assert!(result.t2.failed());
}

#[test]
fn optimistic_reader_against_unlocked_writer() {
    let result = race_updates::<Versioned>(LockMode::None, T1_LONG, LockMode::Optimistic, false);
    assert_final(&result, " plus T2 plus T1", 2);

    let result = race_updates::<Versioned>(LockMode::None, T1_SHORT, LockMode::Optimistic, false);
    assert_final(&result, " plus T1 plus T2", 2);
}

#[test]
fn optimistic_both_versioned() {
    let result = race_updates::<Versioned>(LockMode::Optimistic, T1_LONG, LockMode::Optimistic, false);
    assert_final(&result, " plus T2 plus T1", 2);
    assert!(!result.t1.failed());
}

// ============================================================================
// Exclusive: strict serialization
// ============================================================================

#[test]
fn exclusive_serializes_non_versioned() {
    for pause in [T1_LONG, T1_SHORT] {
        let result = race_updates::<NonVersioned>(LockMode::Exclusive, pause, LockMode::Exclusive, false);
        assert_final(&result, " plus T1 plus T2", 2);
    }
}

#[test]
fn exclusive_serializes_versioned() {
    for pause in [T1_LONG, T1_SHORT] {
        let result = race_updates::<Versioned>(LockMode::Exclusive, pause, LockMode::Exclusive, false);
        assert_final(&result, " plus T1 plus T2", 2);
    }
}

#[test]
fn exclusive_writer_against_unlocked_reader() {
    // The unlocked reader works on a stale copy and overwrites T1
    for pause in [T1_LONG, T1_SHORT] {
        let result = race_updates::<NonVersioned>(LockMode::Exclusive, pause, LockMode::None, false);
        assert_final(&result, " plus T2", 1);
    }
    // The version check forces the stale reader to retry
    for pause in [T1_LONG, T1_SHORT] {
        let result = race_updates::<Versioned>(LockMode::Exclusive, pause, LockMode::None, false);
        assert_final(&result, " plus T1 plus T2", 2);
    }
}

#[test]
fn exclusive_writer_against_shared_reader() {
    for pause in [T1_LONG, T1_SHORT] {
        let result = race_updates::<NonVersioned>(LockMode::Exclusive, pause, LockMode::Shared, false);
        assert_final(&result, " plus T1 plus T2", 2);
        let result = race_updates::<Versioned>(LockMode::Exclusive, pause, LockMode::Shared, false);
        assert_final(&result, " plus T1 plus T2", 2);
    }
}

#[test]
fn shared_readers_upgrade_deadlock_is_retried() {
    // Both hold shared locks; the second upgrade request is the deadlock
    // victim, rolls back, and retries after the other commits.
    let result = race_updates::<NonVersioned>(LockMode::Shared, T1_LONG, LockMode::Shared, false);
    assert_final(&result, " plus T2 plus T1", 2);
    assert!(!result.t1.failed());
    assert!(!result.t2.failed());

    let result = race_updates::<NonVersioned>(LockMode::Shared, T1_SHORT, LockMode::Shared, false);
    assert_final(&result, " plus T1 plus T2", 2);
}

// ============================================================================
// T1 fails after writing: only T2's update survives
// ============================================================================

#[test]
fn failing_writer_is_rolled_back_no_lock() {
    for pause in [T1_LONG, T1_SHORT] {
        let result = race_updates::<NonVersioned>(LockMode::None, pause, LockMode::None, true);
        assert_final(&result, " plus T2", 1);
        assert!(result.t1.failed());
        assert!(!result.t2.failed());

        let result = race_updates::<Versioned>(LockMode::None, pause, LockMode::None, true);
        assert_final(&result, " plus T2", 1);
        assert!(!result.t2.failed());
    }
}

#[test]
fn failing_writer_is_rolled_back_optimistic() {
    let result = race_updates::<NonVersioned>(LockMode::Optimistic, T1_LONG, LockMode::Optimistic, true);
    assert_final(&result, "", 0);

    let result = race_updates::<Versioned>(LockMode::Optimistic, T1_LONG, LockMode::Optimistic, true);
    assert_final(&result, " plus T2", 1);
    assert!(result.t1.failed());
    assert!(!result.t2.failed());
}

#[test]
fn failing_writer_is_rolled_back_exclusive() {
    for t2_mode in [LockMode::Exclusive, LockMode::None, LockMode::Shared] {
        for pause in [T1_LONG, T1_SHORT] {
            let result = race_updates::<NonVersioned>(LockMode::Exclusive, pause, t2_mode, true);
            assert_final(&result, " plus T2", 1);
            let result = race_updates::<Versioned>(LockMode::Exclusive, pause, t2_mode, true);
            assert_final(&result, " plus T2", 1);
            assert!(matches!(result.t2.outcome, WorkerOutcome::Updated(_)));
        }
    }
}
