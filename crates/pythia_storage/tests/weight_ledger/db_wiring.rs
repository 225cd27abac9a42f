#![forbid(unsafe_code)]

use pythia_kernel_contracts::weights::{
    ComponentWeights, SignalMaxPoints, SignalsContractVersion, WeightSet, WeightVersionRecord,
    WeightVersionStatus, WeightsVersionId,
};
use pythia_kernel_contracts::MonotonicTimeNs;
use pythia_storage::repo::WeightVersionLedgerRepo;
use pythia_storage::{PythiaStore, StorageError};

const HASH_FIXTURE: &str = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

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

fn version_record(id: &str, t: u64) -> WeightVersionRecord {
    WeightVersionRecord::v1(
        WeightsVersionId::new(id).unwrap(),
        WeightVersionStatus::Active,
        weight_set(),
        HASH_FIXTURE.to_string(),
        "ops_admin".to_string(),
        MonotonicTimeNs(t),
        "seed version".to_string(),
    )
    .unwrap()
}

#[test]
fn at_weight_ledger_db_01_insert_and_fetch_roundtrip() {
    let mut s = PythiaStore::new_in_memory();
    let record = version_record("v1", 10);
    s.insert_weight_version(record.clone()).unwrap();

    let id = WeightsVersionId::new("v1").unwrap();
    let got = s.weight_version(&id).unwrap();
    assert_eq!(got, &record);
    assert!(s
        .weight_version(&WeightsVersionId::new("v2").unwrap())
        .is_none());
}

#[test]
fn at_weight_ledger_db_02_duplicate_version_id_rejected() {
    let mut s = PythiaStore::new_in_memory();
    s.insert_weight_version(version_record("v1", 10)).unwrap();

    let err = s
        .insert_weight_version(version_record("v1", 20))
        .unwrap_err();
    assert!(matches!(
        err,
        StorageError::DuplicateKey {
            table: "weight_versions",
            ..
        }
    ));
    // The surviving row is the original.
    let id = WeightsVersionId::new("v1").unwrap();
    assert_eq!(s.weight_version(&id).unwrap().created_at, MonotonicTimeNs(10));
}

#[test]
fn at_weight_ledger_db_03_overwrite_and_delete_fail_unconditionally() {
    let mut s = PythiaStore::new_in_memory();
    s.insert_weight_version(version_record("v1", 10)).unwrap();

    let id = WeightsVersionId::new("v1").unwrap();
    assert!(matches!(
        s.attempt_overwrite_weight_version(&id).unwrap_err(),
        StorageError::ImmutableViolation {
            table: "weight_versions",
            ..
        }
    ));
    assert!(matches!(
        s.attempt_delete_weight_version(&id).unwrap_err(),
        StorageError::ImmutableViolation {
            table: "weight_versions",
            ..
        }
    ));
    // Also for ids that were never inserted.
    let absent = WeightsVersionId::new("v99").unwrap();
    assert!(s.attempt_delete_weight_version(&absent).is_err());
    assert!(s.weight_version(&id).is_some());
}

#[test]
fn at_weight_ledger_db_04_contract_violation_rejected_at_write() {
    let mut s = PythiaStore::new_in_memory();
    let mut record = version_record("v1", 10);
    record.content_hash_sha256 = "not_a_hash".to_string();

    let err = s.insert_weight_version(record).unwrap_err();
    assert!(matches!(err, StorageError::ContractViolation(_)));
    assert!(s
        .weight_version(&WeightsVersionId::new("v1").unwrap())
        .is_none());
}
