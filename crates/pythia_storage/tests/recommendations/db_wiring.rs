#![forbid(unsafe_code)]

use pythia_kernel_contracts::mlgate::{
    CrossTimeStabilityGate, GateResult, PositiveRateGate, SampleSizeGate, MLGATE_CONTRACT_VERSION,
};
use pythia_kernel_contracts::recommendation::{
    RecommendationId, RecommendationRecord, RecommendationStatus, RecommendationType,
    PENDING_EXPIRY_NS,
};
use pythia_kernel_contracts::runtime::RuntimeConfigRecord;
use pythia_kernel_contracts::weights::{
    ComponentWeights, SignalMaxPoints, SignalsContractVersion, WeightSet, WeightVersionRecord,
    WeightVersionStatus, WeightsVersionId,
};
use pythia_kernel_contracts::MonotonicTimeNs;
use pythia_storage::repo::{RecommendationRepo, RuntimeConfigRepo, WeightVersionLedgerRepo};
use pythia_storage::{PythiaStore, StorageError};

const HASH_FIXTURE: &str = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

fn passing_gate() -> GateResult {
    GateResult {
        schema_version: MLGATE_CONTRACT_VERSION,
        passed: true,
        sample_size: SampleSizeGate {
            passed: true,
            success_count: 240,
            fail_count: 960,
            min_success_count: 200,
            min_fail_count: 200,
        },
        positive_rate: PositiveRateGate {
            passed: true,
            positive_rate: 0.2,
            rate_min: 0.02,
            rate_max: 0.50,
        },
        stability: CrossTimeStabilityGate {
            passed: true,
            qualifying_buckets: 4,
            min_buckets: 2,
            required_agreement_ratio: 0.75,
            dimensions: vec![],
        },
    }
}

fn weight_set() -> WeightSet {
    WeightSet::v1(
        ComponentWeights::v1(0.30, 0.25, 0.20, 0.15, 0.10).unwrap(),
        SignalMaxPoints::v1(2.5, 2.5, 2.0, 1.5, 1.5).unwrap(),
        10.0,
        35.0,
        5.0,
        1.0,
        SignalsContractVersion(1),
    )
    .unwrap()
}

fn rebalanced_weight_set() -> WeightSet {
    WeightSet::v1(
        ComponentWeights::v1(0.25, 0.30, 0.20, 0.15, 0.10).unwrap(),
        SignalMaxPoints::v1(2.5, 2.5, 2.0, 1.5, 1.5).unwrap(),
        10.0,
        35.0,
        5.0,
        1.0,
        SignalsContractVersion(1),
    )
    .unwrap()
}

fn version_record(id: &str, weights: WeightSet, t: u64) -> WeightVersionRecord {
    WeightVersionRecord::v1(
        WeightsVersionId::new(id).unwrap(),
        WeightVersionStatus::Active,
        weights,
        HASH_FIXTURE.to_string(),
        "ops_admin".to_string(),
        MonotonicTimeNs(t),
        "seed version".to_string(),
    )
    .unwrap()
}

fn pending(id: &str, source: &str, proposed_at: u64) -> RecommendationRecord {
    RecommendationRecord::v1_pending(
        RecommendationId::new(id).unwrap(),
        WeightsVersionId::new(source).unwrap(),
        rebalanced_weight_set(),
        RecommendationType::ComponentWeightRebalance,
        0.8,
        "traction underweighted vs outcome data".to_string(),
        0.05,
        passing_gate(),
        true,
        MonotonicTimeNs(proposed_at),
    )
    .unwrap()
}

fn store_with_active_version(id: &str) -> PythiaStore {
    let mut s = PythiaStore::new_in_memory();
    s.insert_weight_version(version_record(id, weight_set(), 1))
        .unwrap();
    s.put_runtime_config(
        RuntimeConfigRecord::v1(
            WeightsVersionId::new(id).unwrap(),
            None,
            false,
            MonotonicTimeNs(1),
        )
        .unwrap(),
    )
    .unwrap();
    s
}

#[test]
fn at_recommend_db_01_source_version_must_exist() {
    let mut s = PythiaStore::new_in_memory();
    let err = s
        .insert_recommendation(pending("rec_001", "v_missing", 100))
        .unwrap_err();
    assert!(matches!(
        err,
        StorageError::ForeignKeyViolation {
            table: "recommendations",
            ..
        }
    ));
}

#[test]
fn at_recommend_db_02_duplicate_id_rejected() {
    let mut s = store_with_active_version("v1");
    s.insert_recommendation(pending("rec_001", "v1", 100))
        .unwrap();
    let err = s
        .insert_recommendation(pending("rec_001", "v1", 200))
        .unwrap_err();
    assert!(matches!(
        err,
        StorageError::DuplicateKey {
            table: "recommendations",
            ..
        }
    ));
}

#[test]
fn at_recommend_db_03_reject_is_pending_only() {
    let mut s = store_with_active_version("v1");
    s.insert_recommendation(pending("rec_001", "v1", 100))
        .unwrap();
    let id = RecommendationId::new("rec_001").unwrap();

    let rejected = s
        .reject_recommendation(
            &id,
            "reviewer_a".to_string(),
            "delta within noise band".to_string(),
            MonotonicTimeNs(500),
        )
        .unwrap();
    assert_eq!(rejected.status, RecommendationStatus::Rejected);
    assert_eq!(rejected.decided_by.as_deref(), Some("reviewer_a"));

    let err = s
        .reject_recommendation(
            &id,
            "reviewer_b".to_string(),
            "second look".to_string(),
            MonotonicTimeNs(600),
        )
        .unwrap_err();
    assert!(matches!(err, StorageError::InvalidTransition { .. }));
}

#[test]
fn at_recommend_db_04_sweep_expires_only_stale_pending() {
    let mut s = store_with_active_version("v1");
    s.insert_recommendation(pending("rec_old", "v1", 100))
        .unwrap();
    s.insert_recommendation(pending("rec_new", "v1", 5_000))
        .unwrap();

    let now = MonotonicTimeNs(101 + PENDING_EXPIRY_NS);
    assert_eq!(s.sweep_expired_recommendations(now), 1);

    let old = s
        .recommendation(&RecommendationId::new("rec_old").unwrap())
        .unwrap();
    assert_eq!(old.status, RecommendationStatus::Expired);
    assert_eq!(old.decided_at, Some(now));
    assert!(old.decided_by.is_none());
    let fresh = s
        .recommendation(&RecommendationId::new("rec_new").unwrap())
        .unwrap();
    assert_eq!(fresh.status, RecommendationStatus::Pending);

    // Idempotent: a second sweep finds nothing.
    assert_eq!(s.sweep_expired_recommendations(now), 0);
}

#[test]
fn at_recommend_db_05_approval_commits_version_runtime_and_status_together() {
    let mut s = store_with_active_version("v1");
    s.insert_recommendation(pending("rec_001", "v1", 100))
        .unwrap();
    let id = RecommendationId::new("rec_001").unwrap();

    let approved = s
        .commit_recommendation_approval(
            &id,
            version_record("v2", rebalanced_weight_set(), 900),
            "reviewer_a".to_string(),
            MonotonicTimeNs(900),
        )
        .unwrap();
    assert_eq!(approved.status, RecommendationStatus::Approved);

    let v2 = WeightsVersionId::new("v2").unwrap();
    assert!(s.weight_version(&v2).is_some());
    let config = s.runtime_config().unwrap();
    assert_eq!(config.active_version.as_str(), "v2");
    assert_eq!(config.updated_at, MonotonicTimeNs(900));
}

#[test]
fn at_recommend_db_06_failed_approval_leaves_no_partial_write() {
    let mut s = store_with_active_version("v1");
    s.insert_recommendation(pending("rec_001", "v1", 100))
        .unwrap();
    let id = RecommendationId::new("rec_001").unwrap();

    // Version id collides with the existing ledger row.
    let err = s
        .commit_recommendation_approval(
            &id,
            version_record("v1", rebalanced_weight_set(), 900),
            "reviewer_a".to_string(),
            MonotonicTimeNs(900),
        )
        .unwrap_err();
    assert!(matches!(err, StorageError::DuplicateKey { .. }));

    let rec = s.recommendation(&id).unwrap();
    assert_eq!(rec.status, RecommendationStatus::Pending);
    assert!(rec.decided_at.is_none());
    assert_eq!(s.runtime_config().unwrap().active_version.as_str(), "v1");
}

#[test]
fn at_recommend_db_07_approval_requires_pending_status() {
    let mut s = store_with_active_version("v1");
    s.insert_recommendation(pending("rec_001", "v1", 100))
        .unwrap();
    let id = RecommendationId::new("rec_001").unwrap();
    s.reject_recommendation(
        &id,
        "reviewer_a".to_string(),
        "delta within noise band".to_string(),
        MonotonicTimeNs(500),
    )
    .unwrap();

    let err = s
        .commit_recommendation_approval(
            &id,
            version_record("v2", rebalanced_weight_set(), 900),
            "reviewer_b".to_string(),
            MonotonicTimeNs(900),
        )
        .unwrap_err();
    assert!(matches!(err, StorageError::InvalidTransition { .. }));
    assert!(s
        .weight_version(&WeightsVersionId::new("v2").unwrap())
        .is_none());
}
