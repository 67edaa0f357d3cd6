//! Concurrent Update/Delete Tests
//!
//! T1 deletes the entity after its pause; T2 appends its name. Deletes are
//! checked against the row that T1 read: a stale read is fatal for a
//! non-versioned updater and a retryable version conflict otherwise.

use crate::common::*;
use retrytx::{LockMode, NonVersioned, Versioned, WorkerOutcome};

fn assert_deleted(result: &RaceResult) {
    assert!(result.entity.is_none(), "{:#?}", result);
}

// ============================================================================
// No lock
// ============================================================================

#[test]
fn no_lock_non_versioned() {
    // T2 commits first, T1 deletes the updated row anyway
    let result = race_delete_update::<NonVersioned>(LockMode::None, T1_LONG, LockMode::None, false);
    assert_deleted(&result);
    assert!(!result.t1.failed());
    assert!(!result.t2.failed());

    // T1 deletes first, T2's update finds nothing to update
    let result = race_delete_update::<NonVersioned>(LockMode::None, T1_SHORT, LockMode::None, false);
    assert_deleted(&result);
    assert!(!result.t1.failed());
    assert!(result.t2.failed());
}

#[test]
fn no_lock_versioned_recovers() {
    // T1's delete hits the newer version, retries and deletes
    let result = race_delete_update::<Versioned>(LockMode::None, T1_LONG, LockMode::None, false);
    assert_deleted(&result);
    assert!(!result.t1.failed());
    assert!(!result.t2.failed());

    // T2's update conflicts, retries and observes the deletion
    let result = race_delete_update::<Versioned>(LockMode::None, T1_SHORT, LockMode::None, false);
    assert_deleted(&result);
    assert!(matches!(result.t1.outcome, WorkerOutcome::Deleted(_)));
    assert_eq!(result.t2.outcome, WorkerOutcome::Missing);
}

// ============================================================================
// Optimistic
// ============================================================================

#[test]
fn optimistic_on_non_versioned_fails_both() {
    let result =
        race_delete_update::<NonVersioned>(LockMode::Optimistic, T1_LONG, LockMode::Optimistic, false);
    let entity = result.entity.as_ref().expect("entity survives");
    assert_eq!(entity.content(), INITIAL_CONTENT);
    assert_eq!(entity.change_count(), 0);
    assert!(result.t1.failed());
    assert!(result.t2.failed());
}

#[test]
fn optimistic_updater_against_unlocked_deleter() {
    for pause in [T1_LONG, T1_SHORT] {
        let result = race_delete_update::<Versioned>(LockMode::None, pause, LockMode::Optimistic, false);
        assert_deleted(&result);
        assert!(!result.t1.failed());
        assert!(!result.t2.failed());
    }
}

// ============================================================================
// Exclusive
// ============================================================================

#[test]
fn exclusive_both_sees_deletion() {
    for pause in [T1_LONG, T1_SHORT] {
        let result =
            race_delete_update::<NonVersioned>(LockMode::Exclusive, pause, LockMode::Exclusive, false);
        assert_deleted(&result);
        assert_eq!(result.t2.outcome, WorkerOutcome::Missing);

        let result = race_delete_update::<Versioned>(LockMode::Exclusive, pause, LockMode::Exclusive, false);
        assert_deleted(&result);
        assert_eq!(result.t2.outcome, WorkerOutcome::Missing);
    }
}

#[test]
fn exclusive_deleter_against_unlocked_updater() {
    // The unlocked updater only notices the deletion when it writes
    for pause in [T1_LONG, T1_SHORT] {
        let result = race_delete_update::<NonVersioned>(LockMode::Exclusive, pause, LockMode::None, false);
        assert_deleted(&result);
        assert!(!result.t1.failed());
        assert!(result.t2.failed());

        let result = race_delete_update::<Versioned>(LockMode::Exclusive, pause, LockMode::None, false);
        assert_deleted(&result);
        assert!(!result.t1.failed());
        assert!(!result.t2.failed());
    }
}

#[test]
fn exclusive_deleter_against_shared_reader() {
    for pause in [T1_LONG, T1_SHORT] {
        let result =
            race_delete_update::<NonVersioned>(LockMode::Exclusive, pause, LockMode::Shared, false);
        assert_deleted(&result);
        assert!(!result.t2.failed());

        let result = race_delete_update::<Versioned>(LockMode::Exclusive, pause, LockMode::Shared, false);
        assert_deleted(&result);
        assert!(!result.t2.failed());
    }
}

// ============================================================================
// T1 fails after deleting: the entity survives with T2's update
// ============================================================================

#[test]
fn failing_deleter_is_rolled_back() {
    let cases = [
        (LockMode::None, LockMode::None),
        (LockMode::Exclusive, LockMode::Exclusive),
        (LockMode::Exclusive, LockMode::None),
        (LockMode::Exclusive, LockMode::Shared),
    ];
    for (t1_mode, t2_mode) in cases {
        for pause in [T1_LONG, T1_SHORT] {
            let result = race_delete_update::<NonVersioned>(t1_mode, pause, t2_mode, true);
            assert_eq!(result.content(), format!("{} plus T2", INITIAL_CONTENT));
            assert_eq!(result.change_count(), 1);
            assert!(!result.t2.failed());

            let result = race_delete_update::<Versioned>(t1_mode, pause, t2_mode, true);
            assert_eq!(result.content(), format!("{} plus T2", INITIAL_CONTENT));
            assert_eq!(result.change_count(), 1);
            assert!(!result.t2.failed());
        }
    }
}

#[test]
fn failing_optimistic_deleter() {
    let result = race_delete_update::<Versioned>(LockMode::Optimistic, T1_LONG, LockMode::Optimistic, true);
    assert_eq!(result.content(), format!("{} plus T2", INITIAL_CONTENT));
    assert!(result.t1.failed());
    assert!(!result.t2.failed());
}
