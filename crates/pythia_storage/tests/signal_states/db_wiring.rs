#![forbid(unsafe_code)]

use pythia_kernel_contracts::signals::{SignalDimensions, SignalStateRecord};
use pythia_kernel_contracts::{MonotonicTimeNs, StartupId};
use pythia_storage::repo::SignalStateRepo;
use pythia_storage::{PythiaStore, StorageError};

fn state(startup: &str, bonus: f64, t: u64) -> SignalStateRecord {
    SignalStateRecord::v1(
        StartupId::new(startup).unwrap(),
        SignalDimensions::v1(0.8, 0.6, 0.5, 0.4, 0.7).unwrap(),
        bonus,
        MonotonicTimeNs(t),
    )
    .unwrap()
}

#[test]
fn at_signal_db_01_upsert_and_read_per_startup() {
    let mut s = PythiaStore::new_in_memory();
    s.upsert_signal_state(state("su_1", 6.2, 10)).unwrap();
    s.upsert_signal_state(state("su_2", 3.1, 12)).unwrap();

    let got = s.signal_state(&StartupId::new("su_1").unwrap()).unwrap();
    assert_eq!(got.signals_bonus, 6.2);
    assert!(s.signal_state(&StartupId::new("su_3").unwrap()).is_none());
}

#[test]
fn at_signal_db_02_upsert_replaces_previous_state() {
    let mut s = PythiaStore::new_in_memory();
    s.upsert_signal_state(state("su_1", 6.2, 10)).unwrap();
    s.upsert_signal_state(state("su_1", 7.0, 30)).unwrap();

    let got = s.signal_state(&StartupId::new("su_1").unwrap()).unwrap();
    assert_eq!(got.signals_bonus, 7.0);
    assert_eq!(got.last_significant_change_at, MonotonicTimeNs(30));
}

#[test]
fn at_signal_db_03_bonus_above_cap_rejected_at_write() {
    let mut s = PythiaStore::new_in_memory();
    let mut record = state("su_1", 9.9, 10);
    record.signals_bonus = 10.5;

    let err = s.upsert_signal_state(record).unwrap_err();
    assert!(matches!(err, StorageError::ContractViolation(_)));
    assert!(s.signal_state(&StartupId::new("su_1").unwrap()).is_none());
}
