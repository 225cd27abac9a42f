#![forbid(unsafe_code)]

//! Single-row runtime pointer: which ledger version scoring actually uses.
//! All writes are read-modify-write against the singleton; referenced
//! versions must already exist in the ledger.

use pythia_kernel_contracts::runtime::RuntimeConfigRecord;
use pythia_kernel_contracts::weights::WeightsVersionId;
use pythia_kernel_contracts::MonotonicTimeNs;
use pythia_storage::{PythiaStore, StorageError};

fn missing_singleton() -> StorageError {
    StorageError::ForeignKeyViolation {
        table: "runtime_config",
        key: "singleton".to_string(),
    }
}

pub fn get_config(store: &PythiaStore) -> Option<&RuntimeConfigRecord> {
    store.runtime_config_row()
}

/// Resolve the version scoring must use right now: override wins over active.
pub fn effective_version(store: &PythiaStore) -> Option<&WeightsVersionId> {
    store.runtime_config_row().map(|c| c.effective_version())
}

/// Point `active` at a ledger version. Bootstraps the singleton when no row
/// exists yet.
pub fn set_active(
    store: &mut PythiaStore,
    version_id: WeightsVersionId,
    now: MonotonicTimeNs,
) -> Result<RuntimeConfigRecord, StorageError> {
    let (override_version, freeze) = match store.runtime_config_row() {
        Some(config) => (config.override_version.clone(), config.freeze),
        None => (None, false),
    };
    let record = RuntimeConfigRecord::v1(version_id, override_version, freeze, now)?;
    store.put_runtime_config_row(record.clone())?;
    Ok(record)
}

pub fn set_override(
    store: &mut PythiaStore,
    version_id: WeightsVersionId,
    now: MonotonicTimeNs,
) -> Result<RuntimeConfigRecord, StorageError> {
    let config = store.runtime_config_row().ok_or_else(missing_singleton)?;
    let record = RuntimeConfigRecord::v1(
        config.active_version.clone(),
        Some(version_id),
        config.freeze,
        now,
    )?;
    store.put_runtime_config_row(record.clone())?;
    Ok(record)
}

pub fn clear_override(
    store: &mut PythiaStore,
    now: MonotonicTimeNs,
) -> Result<RuntimeConfigRecord, StorageError> {
    let config = store.runtime_config_row().ok_or_else(missing_singleton)?;
    let record = RuntimeConfigRecord::v1(config.active_version.clone(), None, config.freeze, now)?;
    store.put_runtime_config_row(record.clone())?;
    Ok(record)
}

/// Freeze halts recommendation approvals only. Admin pointer changes stay
/// available so an operator can always steer out of a bad state.
pub fn set_freeze(
    store: &mut PythiaStore,
    freeze: bool,
    now: MonotonicTimeNs,
) -> Result<RuntimeConfigRecord, StorageError> {
    let config = store.runtime_config_row().ok_or_else(missing_singleton)?;
    let record = RuntimeConfigRecord::v1(
        config.active_version.clone(),
        config.override_version.clone(),
        freeze,
        now,
    )?;
    store.put_runtime_config_row(record.clone())?;
    Ok(record)
}
