#![forbid(unsafe_code)]

use pythia_kernel_contracts::explain::{ComponentScores, ScoreExplanationRecord};
use pythia_kernel_contracts::weights::{
    ComponentWeights, SignalMaxPoints, SignalsContractVersion, WeightSet, WeightVersionRecord,
    WeightVersionStatus, WeightsVersionId,
};
use pythia_kernel_contracts::{MonotonicTimeNs, StartupId};
use pythia_storage::repo::{ScoreExplanationRepo, WeightVersionLedgerRepo};
use pythia_storage::{PythiaStore, StorageError};

const HASH_FIXTURE: &str = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

fn store_with_version(id: &str) -> PythiaStore {
    let mut s = PythiaStore::new_in_memory();
    s.insert_weight_version(
        WeightVersionRecord::v1(
            WeightsVersionId::new(id).unwrap(),
            WeightVersionStatus::Active,
            WeightSet::v1(
                ComponentWeights::v1(0.30, 0.25, 0.20, 0.15, 0.10).unwrap(),
                SignalMaxPoints::v1(2.5, 2.5, 2.0, 1.5, 1.5).unwrap(),
                10.0,
                35.0,
                5.0,
                1.0,
                SignalsContractVersion(1),
            )
            .unwrap(),
            HASH_FIXTURE.to_string(),
            "ops_admin".to_string(),
            MonotonicTimeNs(1),
            "seed version".to_string(),
        )
        .unwrap(),
    )
    .unwrap();
    s
}

fn explanation(startup: &str, version: &str, total: f64, t: u64) -> ScoreExplanationRecord {
    ScoreExplanationRecord::v1(
        StartupId::new(startup).unwrap(),
        WeightsVersionId::new(version).unwrap(),
        62.5,
        total - 62.5,
        total,
        ComponentScores::v1(70.0, 55.0, 65.0, 60.0, 58.0).unwrap(),
        vec![],
        vec![],
        MonotonicTimeNs(t),
    )
    .unwrap()
}

#[test]
fn at_explain_db_01_weights_version_must_exist() {
    let mut s = PythiaStore::new_in_memory();
    let err = s
        .upsert_score_explanation(explanation("su_1", "v_missing", 65.0, 10))
        .unwrap_err();
    assert!(matches!(
        err,
        StorageError::ForeignKeyViolation {
            table: "score_explanations",
            ..
        }
    ));
}

#[test]
fn at_explain_db_02_upsert_replaces_per_startup_version_pair() {
    let mut s = store_with_version("v1");
    s.upsert_score_explanation(explanation("su_1", "v1", 65.0, 10))
        .unwrap();
    s.upsert_score_explanation(explanation("su_1", "v1", 68.0, 20))
        .unwrap();

    let startup = StartupId::new("su_1").unwrap();
    let version = WeightsVersionId::new("v1").unwrap();
    let got = s.score_explanation(&startup, &version).unwrap();
    assert_eq!(got.total_score, 68.0);
    assert_eq!(got.computed_at, MonotonicTimeNs(20));
    assert_eq!(s.score_explanation_rows().len(), 1);
}

#[test]
fn at_explain_db_03_missing_pair_reads_none() {
    let mut s = store_with_version("v1");
    s.upsert_score_explanation(explanation("su_1", "v1", 65.0, 10))
        .unwrap();

    let other = StartupId::new("su_2").unwrap();
    let version = WeightsVersionId::new("v1").unwrap();
    assert!(s.score_explanation(&other, &version).is_none());
}

#[test]
fn at_explain_db_04_arithmetic_invariant_enforced_at_write() {
    let mut s = store_with_version("v1");
    let mut record = explanation("su_1", "v1", 65.0, 10);
    // total - base exceeds the bonus cap plus rounding tolerance.
    record.total_score = 80.0;

    let err = s.upsert_score_explanation(record).unwrap_err();
    assert!(matches!(err, StorageError::ContractViolation(_)));
    let startup = StartupId::new("su_1").unwrap();
    let version = WeightsVersionId::new("v1").unwrap();
    assert!(s.score_explanation(&startup, &version).is_none());
}
