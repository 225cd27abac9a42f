#![forbid(unsafe_code)]

//! Single write path for the append-only weight-version ledger. Every version
//! enters the system through `create_version`; the content hash is computed
//! here, never accepted from the caller.

use sha2::{Digest, Sha256};

use pythia_kernel_contracts::weights::{
    WeightSet, WeightVersionRecord, WeightVersionStatus, WeightsVersionId,
};
use pythia_kernel_contracts::MonotonicTimeNs;
use pythia_storage::{PythiaStore, StorageError};

/// SHA-256 over the canonical fixed-order rendering of the weight set. The
/// hash pins the exact numeric content of a version forever.
pub fn content_hash(weights: &WeightSet) -> String {
    Sha256::digest(weights.canonical_string().as_bytes())
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

/// Validate, hash, and append one ledger row. Weight-sum and cap invariants
/// are enforced by the record constructor before anything is persisted.
pub fn create_version(
    store: &mut PythiaStore,
    version_id: WeightsVersionId,
    weights: WeightSet,
    created_by: String,
    comment: String,
    now: MonotonicTimeNs,
) -> Result<WeightVersionRecord, StorageError> {
    let record = WeightVersionRecord::v1(
        version_id,
        WeightVersionStatus::Active,
        weights.clone(),
        content_hash(&weights),
        created_by,
        now,
        comment,
    )?;
    store.insert_weight_version_row(record.clone())?;
    Ok(record)
}

/// Independent recomputation of the stored hash. A mismatch means the row was
/// tampered with outside the write path.
pub fn verify_content_hash(record: &WeightVersionRecord) -> bool {
    content_hash(&record.weights) == record.content_hash_sha256
}

pub fn get_version<'a>(
    store: &'a PythiaStore,
    version_id: &WeightsVersionId,
) -> Option<&'a WeightVersionRecord> {
    store.weight_version_row(version_id)
}

/// Ledger listing in version-id order, optionally filtered by status.
pub fn list_versions(
    store: &PythiaStore,
    status: Option<WeightVersionStatus>,
) -> Vec<&WeightVersionRecord> {
    store
        .weight_version_rows()
        .values()
        .filter(|record| status.map_or(true, |s| record.status == s))
        .collect()
}
