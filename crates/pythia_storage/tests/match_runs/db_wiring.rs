#![forbid(unsafe_code)]

use pythia_kernel_contracts::explain::ComponentScores;
use pythia_kernel_contracts::matchrun::{
    InvestorCandidate, MatchRunErrorCode, MatchRunStatus, WorkerId, MATCH_COUNT_CAP,
};
use pythia_kernel_contracts::{InvestorId, MonotonicTimeNs, StartupId};
use pythia_storage::repo::MatchRunQueueRepo;
use pythia_storage::{MatchRunCompletion, PythiaStore, StorageError};

fn startup(id: &str) -> StartupId {
    StartupId::new(id).unwrap()
}

fn worker(id: &str) -> WorkerId {
    WorkerId::new(id).unwrap()
}

#[test]
fn at_matchrun_db_01_claim_oldest_queued_first() {
    let mut s = PythiaStore::new_in_memory();
    let first = s.enqueue_match_run(startup("su_1"), MonotonicTimeNs(10)).unwrap();
    let second = s.enqueue_match_run(startup("su_2"), MonotonicTimeNs(20)).unwrap();
    assert!(first < second);

    let w = worker("worker_a");
    let claimed = s.claim_next_match_run(&w, MonotonicTimeNs(30)).unwrap().unwrap();
    assert_eq!(claimed.run_id, first);
    assert_eq!(claimed.status, MatchRunStatus::Claimed);
    assert_eq!(claimed.worker_id, Some(w.clone()));
    assert_eq!(claimed.claimed_at, Some(MonotonicTimeNs(30)));

    let next = s.claim_next_match_run(&w, MonotonicTimeNs(31)).unwrap().unwrap();
    assert_eq!(next.run_id, second);
    assert!(s.claim_next_match_run(&w, MonotonicTimeNs(32)).unwrap().is_none());
}

#[test]
fn at_matchrun_db_02_complete_ready_roundtrip() {
    let mut s = PythiaStore::new_in_memory();
    let run_id = s.enqueue_match_run(startup("su_1"), MonotonicTimeNs(10)).unwrap();
    s.claim_next_match_run(&worker("worker_a"), MonotonicTimeNs(20))
        .unwrap()
        .unwrap();

    let done = s
        .complete_match_run(
            run_id,
            MatchRunCompletion::Ready { match_count: 42 },
            MonotonicTimeNs(40),
        )
        .unwrap();
    assert_eq!(done.status, MatchRunStatus::Ready);
    assert_eq!(done.match_count, Some(42));
    assert_eq!(done.completed_at, Some(MonotonicTimeNs(40)));
}

#[test]
fn at_matchrun_db_03_identical_recompletion_is_noop() {
    let mut s = PythiaStore::new_in_memory();
    let run_id = s.enqueue_match_run(startup("su_1"), MonotonicTimeNs(10)).unwrap();
    s.claim_next_match_run(&worker("worker_a"), MonotonicTimeNs(20))
        .unwrap()
        .unwrap();
    s.complete_match_run(
        run_id,
        MatchRunCompletion::Ready { match_count: 42 },
        MonotonicTimeNs(40),
    )
    .unwrap();

    // Same payload again: no-op success, original completion time retained.
    let again = s
        .complete_match_run(
            run_id,
            MatchRunCompletion::Ready { match_count: 42 },
            MonotonicTimeNs(50),
        )
        .unwrap();
    assert_eq!(again.completed_at, Some(MonotonicTimeNs(40)));

    // Conflicting payload fails hard.
    let err = s
        .complete_match_run(
            run_id,
            MatchRunCompletion::Ready { match_count: 43 },
            MonotonicTimeNs(60),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        StorageError::ImmutableViolation {
            table: "match_runs",
            ..
        }
    ));
    let err = s
        .complete_match_run(
            run_id,
            MatchRunCompletion::Error {
                error_code: MatchRunErrorCode::Timeout,
                error_message: None,
            },
            MonotonicTimeNs(70),
        )
        .unwrap_err();
    assert!(matches!(err, StorageError::ImmutableViolation { .. }));
}

#[test]
fn at_matchrun_db_04_complete_requires_claimed_status() {
    let mut s = PythiaStore::new_in_memory();
    let run_id = s.enqueue_match_run(startup("su_1"), MonotonicTimeNs(10)).unwrap();

    let err = s
        .complete_match_run(
            run_id,
            MatchRunCompletion::Ready { match_count: 1 },
            MonotonicTimeNs(20),
        )
        .unwrap_err();
    assert!(matches!(err, StorageError::InvalidTransition { .. }));
}

#[test]
fn at_matchrun_db_05_match_count_capped() {
    let mut s = PythiaStore::new_in_memory();
    let run_id = s.enqueue_match_run(startup("su_1"), MonotonicTimeNs(10)).unwrap();
    s.claim_next_match_run(&worker("worker_a"), MonotonicTimeNs(20))
        .unwrap()
        .unwrap();

    let err = s
        .complete_match_run(
            run_id,
            MatchRunCompletion::Ready {
                match_count: MATCH_COUNT_CAP + 1,
            },
            MonotonicTimeNs(30),
        )
        .unwrap_err();
    assert!(matches!(err, StorageError::ContractViolation(_)));
    // The row stays claimed and can still complete at the cap.
    let done = s
        .complete_match_run(
            run_id,
            MatchRunCompletion::Ready {
                match_count: MATCH_COUNT_CAP,
            },
            MonotonicTimeNs(40),
        )
        .unwrap();
    assert_eq!(done.match_count, Some(MATCH_COUNT_CAP));
}

#[test]
fn at_matchrun_db_06_error_completion_records_code_and_message() {
    let mut s = PythiaStore::new_in_memory();
    let run_id = s.enqueue_match_run(startup("su_1"), MonotonicTimeNs(10)).unwrap();
    s.claim_next_match_run(&worker("worker_a"), MonotonicTimeNs(20))
        .unwrap()
        .unwrap();

    let done = s
        .complete_match_run(
            run_id,
            MatchRunCompletion::Error {
                error_code: MatchRunErrorCode::ConfigUnavailable,
                error_message: Some("runtime config row missing".to_string()),
            },
            MonotonicTimeNs(30),
        )
        .unwrap();
    assert_eq!(done.status, MatchRunStatus::Error);
    assert_eq!(done.error_code, Some(MatchRunErrorCode::ConfigUnavailable));
    assert_eq!(done.match_count, None);
}

#[test]
fn at_matchrun_db_07_stale_claims_reclaimed_to_queued() {
    let mut s = PythiaStore::new_in_memory();
    let stale = s.enqueue_match_run(startup("su_1"), MonotonicTimeNs(10)).unwrap();
    let fresh = s.enqueue_match_run(startup("su_2"), MonotonicTimeNs(11)).unwrap();
    s.claim_next_match_run(&worker("worker_a"), MonotonicTimeNs(100))
        .unwrap()
        .unwrap();
    s.claim_next_match_run(&worker("worker_b"), MonotonicTimeNs(900))
        .unwrap()
        .unwrap();

    let lease_ttl_ns = 500;
    assert_eq!(s.reclaim_expired_claims(MonotonicTimeNs(700), lease_ttl_ns), 1);

    let run = s.match_run(stale).unwrap();
    assert_eq!(run.status, MatchRunStatus::Queued);
    assert!(run.worker_id.is_none());
    assert!(run.claimed_at.is_none());
    assert_eq!(s.match_run(fresh).unwrap().status, MatchRunStatus::Claimed);
}

#[test]
fn at_matchrun_db_08_investor_candidates_roundtrip() {
    let mut s = PythiaStore::new_in_memory();
    let candidates = vec![
        InvestorCandidate {
            investor_id: InvestorId::new("inv_1").unwrap(),
            fit: ComponentScores::v1(80.0, 70.0, 60.0, 50.0, 40.0).unwrap(),
        },
        InvestorCandidate {
            investor_id: InvestorId::new("inv_2").unwrap(),
            fit: ComponentScores::v1(50.0, 50.0, 50.0, 50.0, 50.0).unwrap(),
        },
    ];
    s.put_investor_candidate_rows(startup("su_1"), candidates)
        .unwrap();

    assert_eq!(s.investor_candidates(&startup("su_1")).len(), 2);
    assert!(s.investor_candidates(&startup("su_2")).is_empty());
}
