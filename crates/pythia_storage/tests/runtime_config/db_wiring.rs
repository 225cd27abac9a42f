#![forbid(unsafe_code)]

use pythia_kernel_contracts::runtime::RuntimeConfigRecord;
use pythia_kernel_contracts::weights::{
    ComponentWeights, SignalMaxPoints, SignalsContractVersion, WeightSet, WeightVersionRecord,
    WeightVersionStatus, WeightsVersionId,
};
use pythia_kernel_contracts::MonotonicTimeNs;
use pythia_storage::repo::{RuntimeConfigRepo, WeightVersionLedgerRepo};
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

fn store_with_versions(ids: &[&str]) -> PythiaStore {
    let mut s = PythiaStore::new_in_memory();
    for (i, id) in ids.iter().enumerate() {
        s.insert_weight_version(
            WeightVersionRecord::v1(
                WeightsVersionId::new(*id).unwrap(),
                WeightVersionStatus::Active,
                weight_set(),
                HASH_FIXTURE.to_string(),
                "ops_admin".to_string(),
                MonotonicTimeNs(i as u64 + 1),
                "seed version".to_string(),
            )
            .unwrap(),
        )
        .unwrap();
    }
    s
}

#[test]
fn at_runtime_db_01_active_version_must_exist() {
    let mut s = store_with_versions(&["v1"]);
    let record = RuntimeConfigRecord::v1(
        WeightsVersionId::new("v_missing").unwrap(),
        None,
        false,
        MonotonicTimeNs(5),
    )
    .unwrap();

    let err = s.put_runtime_config(record).unwrap_err();
    assert!(matches!(
        err,
        StorageError::ForeignKeyViolation {
            table: "runtime_config",
            ..
        }
    ));
    assert!(s.runtime_config().is_none());
}

#[test]
fn at_runtime_db_02_override_version_must_exist() {
    let mut s = store_with_versions(&["v1"]);
    let record = RuntimeConfigRecord::v1(
        WeightsVersionId::new("v1").unwrap(),
        Some(WeightsVersionId::new("v_missing").unwrap()),
        false,
        MonotonicTimeNs(5),
    )
    .unwrap();

    assert!(s.put_runtime_config(record).is_err());
    assert!(s.runtime_config().is_none());
}

#[test]
fn at_runtime_db_03_override_takes_precedence_over_active() {
    let mut s = store_with_versions(&["v1", "v2"]);
    s.put_runtime_config(
        RuntimeConfigRecord::v1(
            WeightsVersionId::new("v1").unwrap(),
            Some(WeightsVersionId::new("v2").unwrap()),
            false,
            MonotonicTimeNs(5),
        )
        .unwrap(),
    )
    .unwrap();

    let config = s.runtime_config().unwrap();
    assert_eq!(config.effective_version().as_str(), "v2");
}

#[test]
fn at_runtime_db_04_singleton_row_replaced_on_put() {
    let mut s = store_with_versions(&["v1", "v2"]);
    s.put_runtime_config(
        RuntimeConfigRecord::v1(
            WeightsVersionId::new("v1").unwrap(),
            None,
            false,
            MonotonicTimeNs(5),
        )
        .unwrap(),
    )
    .unwrap();
    s.put_runtime_config(
        RuntimeConfigRecord::v1(
            WeightsVersionId::new("v2").unwrap(),
            None,
            true,
            MonotonicTimeNs(9),
        )
        .unwrap(),
    )
    .unwrap();

    let config = s.runtime_config().unwrap();
    assert_eq!(config.active_version.as_str(), "v2");
    assert!(config.freeze);
    assert_eq!(config.updated_at, MonotonicTimeNs(9));
}
