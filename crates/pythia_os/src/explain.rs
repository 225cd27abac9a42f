#![forbid(unsafe_code)]

//! Score-explanation recorder and reader. Every recompute writes a full
//! auditable breakdown; readers treat absence as an outcome, not an error.

use pythia_kernel_contracts::explain::{
    ComponentScores, ExplainDebugEntry, ScoreExplanationRecord, SignalContribution,
};
use pythia_kernel_contracts::weights::WeightsVersionId;
use pythia_kernel_contracts::{MonotonicTimeNs, StartupId};
use pythia_storage::{PythiaStore, StorageError};

#[derive(Debug, Clone, PartialEq)]
pub enum ExplainOutcome {
    Found(ScoreExplanationRecord),
    /// No explanation recorded for this (startup, version) pair.
    NotFound { weights_version: WeightsVersionId },
}

/// Derive the total, enforce the arithmetic invariants, and upsert. The total
/// is always `clamp(base + bonus, 0, 100)`; callers never supply it.
#[allow(clippy::too_many_arguments)]
pub fn record_explanation(
    store: &mut PythiaStore,
    startup_id: StartupId,
    weights_version: WeightsVersionId,
    base_total_score: f64,
    signals_bonus: f64,
    component_scores: ComponentScores,
    top_signal_contributions: Vec<SignalContribution>,
    debug: Vec<ExplainDebugEntry>,
    now: MonotonicTimeNs,
) -> Result<ScoreExplanationRecord, StorageError> {
    let total_score = (base_total_score + signals_bonus).clamp(0.0, 100.0);
    let record = ScoreExplanationRecord::v1(
        startup_id,
        weights_version,
        base_total_score,
        signals_bonus,
        total_score,
        component_scores,
        top_signal_contributions,
        debug,
        now,
    )?;
    store.upsert_score_explanation_row(record.clone())?;
    Ok(record)
}

/// Look up the explanation for a startup. With no explicit version the
/// runtime-effective version is resolved first; a missing runtime config is a
/// hard error because the resolver must fail closed.
pub fn explain(
    store: &PythiaStore,
    startup_id: &StartupId,
    weights_version: Option<&WeightsVersionId>,
) -> Result<ExplainOutcome, StorageError> {
    let version = match weights_version {
        Some(version) => version.clone(),
        None => store
            .runtime_config_row()
            .map(|config| config.effective_version().clone())
            .ok_or(StorageError::ForeignKeyViolation {
                table: "runtime_config",
                key: "singleton".to_string(),
            })?,
    };
    match store.score_explanation_row(startup_id, &version) {
        Some(record) => Ok(ExplainOutcome::Found(record.clone())),
        None => Ok(ExplainOutcome::NotFound {
            weights_version: version,
        }),
    }
}
