#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use pythia_kernel_contracts::explain::ScoreExplanationRecord;
use pythia_kernel_contracts::matchrun::{
    InvestorCandidate, MatchRunErrorCode, MatchRunId, MatchRunRecord, MatchRunStatus, WorkerId,
    MATCH_COUNT_CAP,
};
use pythia_kernel_contracts::recommendation::{
    RecommendationId, RecommendationRecord, RecommendationStatus,
};
use pythia_kernel_contracts::runtime::RuntimeConfigRecord;
use pythia_kernel_contracts::signals::SignalStateRecord;
use pythia_kernel_contracts::weights::{WeightVersionRecord, WeightsVersionId};
use pythia_kernel_contracts::{ContractViolation, MonotonicTimeNs, StartupId, Validate};

#[derive(Debug, Clone, PartialEq)]
pub enum StorageError {
    DuplicateKey {
        table: &'static str,
        key: String,
    },
    ForeignKeyViolation {
        table: &'static str,
        key: String,
    },
    /// Hard failure on any attempt to mutate or delete a finalized row.
    ImmutableViolation {
        table: &'static str,
        key: String,
    },
    /// State-machine transition not allowed from the row's current status.
    InvalidTransition {
        table: &'static str,
        key: String,
    },
    ContractViolation(ContractViolation),
}

impl From<ContractViolation> for StorageError {
    fn from(v: ContractViolation) -> Self {
        StorageError::ContractViolation(v)
    }
}

/// Completion payload for a claimed match run. Identical re-completion is a
/// no-op success; conflicting re-completion is an immutable violation.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchRunCompletion {
    Ready {
        match_count: u16,
    },
    Error {
        error_code: MatchRunErrorCode,
        error_message: Option<String>,
    },
}

/// Authoritative in-memory tables for the score-governance core.
#[derive(Debug, Default)]
pub struct PythiaStore {
    // Append-only configuration ledger. No update/delete path exists.
    weight_versions: BTreeMap<WeightsVersionId, WeightVersionRecord>,
    // Singleton runtime pointer row.
    runtime_config: Option<RuntimeConfigRecord>,
    // Upsert-on-recompute per (startup, weights version); never deleted.
    score_explanations: BTreeMap<(StartupId, WeightsVersionId), ScoreExplanationRecord>,
    signal_states: BTreeMap<StartupId, SignalStateRecord>,
    recommendations: BTreeMap<RecommendationId, RecommendationRecord>,
    match_runs: BTreeMap<MatchRunId, MatchRunRecord>,
    next_match_run_seq: u64,
    investor_candidates: BTreeMap<StartupId, Vec<InvestorCandidate>>,
}

impl PythiaStore {
    pub fn new_in_memory() -> Self {
        Self::default()
    }

    // ------------------------
    // weight_versions (append-only ledger)
    // ------------------------

    pub fn insert_weight_version_row(
        &mut self,
        record: WeightVersionRecord,
    ) -> Result<(), StorageError> {
        record.validate()?;
        if self.weight_versions.contains_key(&record.version_id) {
            return Err(StorageError::DuplicateKey {
                table: "weight_versions",
                key: record.version_id.as_str().to_string(),
            });
        }
        self.weight_versions.insert(record.version_id.clone(), record);
        Ok(())
    }

    pub fn weight_version_row(&self, version_id: &WeightsVersionId) -> Option<&WeightVersionRecord> {
        self.weight_versions.get(version_id)
    }

    pub fn weight_version_rows(&self) -> &BTreeMap<WeightsVersionId, WeightVersionRecord> {
        &self.weight_versions
    }

    /// Defense-in-depth probe: the ledger exposes no mutation path, and even a
    /// direct attempt fails unconditionally.
    pub fn attempt_overwrite_weight_version(
        &mut self,
        version_id: &WeightsVersionId,
    ) -> Result<(), StorageError> {
        Err(StorageError::ImmutableViolation {
            table: "weight_versions",
            key: version_id.as_str().to_string(),
        })
    }

    pub fn attempt_delete_weight_version(
        &mut self,
        version_id: &WeightsVersionId,
    ) -> Result<(), StorageError> {
        Err(StorageError::ImmutableViolation {
            table: "weight_versions",
            key: version_id.as_str().to_string(),
        })
    }

    // ------------------------
    // runtime_config (singleton row)
    // ------------------------

    pub fn runtime_config_row(&self) -> Option<&RuntimeConfigRecord> {
        self.runtime_config.as_ref()
    }

    /// Single write entry for the singleton row. Referenced versions must
    /// exist in the ledger.
    pub fn put_runtime_config_row(
        &mut self,
        record: RuntimeConfigRecord,
    ) -> Result<(), StorageError> {
        record.validate()?;
        if !self.weight_versions.contains_key(&record.active_version) {
            return Err(StorageError::ForeignKeyViolation {
                table: "runtime_config",
                key: record.active_version.as_str().to_string(),
            });
        }
        if let Some(override_version) = &record.override_version {
            if !self.weight_versions.contains_key(override_version) {
                return Err(StorageError::ForeignKeyViolation {
                    table: "runtime_config",
                    key: override_version.as_str().to_string(),
                });
            }
        }
        self.runtime_config = Some(record);
        Ok(())
    }

    // ------------------------
    // score_explanations
    // ------------------------

    pub fn upsert_score_explanation_row(
        &mut self,
        record: ScoreExplanationRecord,
    ) -> Result<(), StorageError> {
        record.validate()?;
        if !self.weight_versions.contains_key(&record.weights_version) {
            return Err(StorageError::ForeignKeyViolation {
                table: "score_explanations",
                key: record.weights_version.as_str().to_string(),
            });
        }
        let key = (record.startup_id.clone(), record.weights_version.clone());
        self.score_explanations.insert(key, record);
        Ok(())
    }

    pub fn score_explanation_row(
        &self,
        startup_id: &StartupId,
        weights_version: &WeightsVersionId,
    ) -> Option<&ScoreExplanationRecord> {
        self.score_explanations
            .get(&(startup_id.clone(), weights_version.clone()))
    }

    pub fn score_explanation_rows(
        &self,
    ) -> &BTreeMap<(StartupId, WeightsVersionId), ScoreExplanationRecord> {
        &self.score_explanations
    }

    // ------------------------
    // signal_states
    // ------------------------

    pub fn signal_state_row(&self, startup_id: &StartupId) -> Option<&SignalStateRecord> {
        self.signal_states.get(startup_id)
    }

    pub fn upsert_signal_state_row(
        &mut self,
        record: SignalStateRecord,
    ) -> Result<(), StorageError> {
        record.validate()?;
        self.signal_states.insert(record.startup_id.clone(), record);
        Ok(())
    }

    // ------------------------
    // recommendations
    // ------------------------

    pub fn insert_recommendation_row(
        &mut self,
        record: RecommendationRecord,
    ) -> Result<(), StorageError> {
        record.validate()?;
        if self.recommendations.contains_key(&record.recommendation_id) {
            return Err(StorageError::DuplicateKey {
                table: "recommendations",
                key: record.recommendation_id.as_str().to_string(),
            });
        }
        if !self.weight_versions.contains_key(&record.source_version) {
            return Err(StorageError::ForeignKeyViolation {
                table: "recommendations",
                key: record.source_version.as_str().to_string(),
            });
        }
        self.recommendations
            .insert(record.recommendation_id.clone(), record);
        Ok(())
    }

    pub fn recommendation_row(
        &self,
        recommendation_id: &RecommendationId,
    ) -> Option<&RecommendationRecord> {
        self.recommendations.get(recommendation_id)
    }

    pub fn recommendation_rows(&self) -> &BTreeMap<RecommendationId, RecommendationRecord> {
        &self.recommendations
    }

    /// pending -> rejected with reviewer and reason.
    pub fn reject_recommendation_row(
        &mut self,
        recommendation_id: &RecommendationId,
        decided_by: String,
        rejection_reason: String,
        now: MonotonicTimeNs,
    ) -> Result<RecommendationRecord, StorageError> {
        let record = self.recommendations.get(recommendation_id).ok_or_else(|| {
            StorageError::ForeignKeyViolation {
                table: "recommendations",
                key: recommendation_id.as_str().to_string(),
            }
        })?;
        if record.status != RecommendationStatus::Pending {
            return Err(StorageError::InvalidTransition {
                table: "recommendations",
                key: recommendation_id.as_str().to_string(),
            });
        }
        let mut updated = record.clone();
        updated.status = RecommendationStatus::Rejected;
        updated.decided_at = Some(now);
        updated.decided_by = Some(decided_by);
        updated.rejection_reason = Some(rejection_reason);
        updated.validate()?;
        self.recommendations
            .insert(recommendation_id.clone(), updated.clone());
        Ok(updated)
    }

    /// Conditional update: every stale pending row flips to expired. Safe to
    /// run from multiple callers; a second sweep finds nothing to flip.
    pub fn sweep_expired_recommendation_rows(&mut self, now: MonotonicTimeNs) -> u32 {
        let mut expired = 0u32;
        for record in self.recommendations.values_mut() {
            if record.is_expired_at(now) {
                record.status = RecommendationStatus::Expired;
                record.decided_at = Some(now);
                expired += 1;
            }
        }
        expired
    }

    /// The approval triple-write: new ledger version, runtime activation, and
    /// the recommendation's approved stamp, committed together or not at all.
    /// Every check runs before the first mutation so a failure is never
    /// partially applied.
    pub fn commit_recommendation_approval(
        &mut self,
        recommendation_id: &RecommendationId,
        version_record: WeightVersionRecord,
        decided_by: String,
        now: MonotonicTimeNs,
    ) -> Result<RecommendationRecord, StorageError> {
        version_record.validate()?;
        let record = self.recommendations.get(recommendation_id).ok_or_else(|| {
            StorageError::ForeignKeyViolation {
                table: "recommendations",
                key: recommendation_id.as_str().to_string(),
            }
        })?;
        if record.status != RecommendationStatus::Pending {
            return Err(StorageError::InvalidTransition {
                table: "recommendations",
                key: recommendation_id.as_str().to_string(),
            });
        }
        if self.weight_versions.contains_key(&version_record.version_id) {
            return Err(StorageError::DuplicateKey {
                table: "weight_versions",
                key: version_record.version_id.as_str().to_string(),
            });
        }
        let runtime = self
            .runtime_config
            .as_ref()
            .ok_or(StorageError::ForeignKeyViolation {
                table: "runtime_config",
                key: "singleton".to_string(),
            })?;

        let mut approved = record.clone();
        approved.status = RecommendationStatus::Approved;
        approved.decided_at = Some(now);
        approved.decided_by = Some(decided_by);
        approved.validate()?;

        let updated_runtime = RuntimeConfigRecord::v1(
            version_record.version_id.clone(),
            runtime.override_version.clone(),
            runtime.freeze,
            now,
        )?;

        // All checks passed; apply the three writes.
        self.weight_versions
            .insert(version_record.version_id.clone(), version_record);
        self.runtime_config = Some(updated_runtime);
        self.recommendations
            .insert(recommendation_id.clone(), approved.clone());
        Ok(approved)
    }

    // ------------------------
    // match_runs (job queue with leases)
    // ------------------------

    pub fn enqueue_match_run_row(
        &mut self,
        startup_id: StartupId,
        requested_at: MonotonicTimeNs,
    ) -> Result<MatchRunId, StorageError> {
        self.next_match_run_seq += 1;
        let run_id = MatchRunId(self.next_match_run_seq);
        let record = MatchRunRecord::v1_queued(run_id, startup_id, requested_at)?;
        self.match_runs.insert(run_id, record);
        Ok(run_id)
    }

    pub fn match_run_row(&self, run_id: MatchRunId) -> Option<&MatchRunRecord> {
        self.match_runs.get(&run_id)
    }

    pub fn match_run_rows(&self) -> &BTreeMap<MatchRunId, MatchRunRecord> {
        &self.match_runs
    }

    /// Atomically select the oldest queued run and stamp the lease. Returns
    /// None when nothing is queued (a benign outcome, not an error).
    pub fn claim_next_match_run_row(
        &mut self,
        worker_id: &WorkerId,
        now: MonotonicTimeNs,
    ) -> Result<Option<MatchRunRecord>, StorageError> {
        worker_id.validate()?;
        let Some(record) = self
            .match_runs
            .values_mut()
            .find(|record| record.status == MatchRunStatus::Queued)
        else {
            return Ok(None);
        };
        record.status = MatchRunStatus::Claimed;
        record.worker_id = Some(worker_id.clone());
        record.claimed_at = Some(now);
        record.validate()?;
        Ok(Some(record.clone()))
    }

    /// claimed -> ready|error. Idempotent: re-completion with identical
    /// arguments is a no-op success; conflicting re-completion fails hard.
    pub fn complete_match_run_row(
        &mut self,
        run_id: MatchRunId,
        completion: MatchRunCompletion,
        now: MonotonicTimeNs,
    ) -> Result<MatchRunRecord, StorageError> {
        let record = self.match_runs.get_mut(&run_id).ok_or_else(|| {
            StorageError::ForeignKeyViolation {
                table: "match_runs",
                key: run_id.0.to_string(),
            }
        })?;

        match record.status {
            MatchRunStatus::Ready | MatchRunStatus::Error => {
                let identical = match (&completion, record.status) {
                    (MatchRunCompletion::Ready { match_count }, MatchRunStatus::Ready) => {
                        record.match_count == Some(*match_count)
                    }
                    (
                        MatchRunCompletion::Error {
                            error_code,
                            error_message,
                        },
                        MatchRunStatus::Error,
                    ) => {
                        record.error_code == Some(*error_code)
                            && record.error_message == *error_message
                    }
                    _ => false,
                };
                if identical {
                    return Ok(record.clone());
                }
                return Err(StorageError::ImmutableViolation {
                    table: "match_runs",
                    key: run_id.0.to_string(),
                });
            }
            MatchRunStatus::Queued => {
                return Err(StorageError::InvalidTransition {
                    table: "match_runs",
                    key: run_id.0.to_string(),
                });
            }
            MatchRunStatus::Claimed => {}
        }

        if let MatchRunCompletion::Ready { match_count } = &completion {
            if *match_count > MATCH_COUNT_CAP {
                return Err(StorageError::ContractViolation(
                    ContractViolation::InvalidValue {
                        field: "match_run_record.match_count",
                        reason: "must be <= MATCH_COUNT_CAP",
                    },
                ));
            }
        }

        record.completed_at = Some(now);
        match completion {
            MatchRunCompletion::Ready { match_count } => {
                record.status = MatchRunStatus::Ready;
                record.match_count = Some(match_count);
            }
            MatchRunCompletion::Error {
                error_code,
                error_message,
            } => {
                record.status = MatchRunStatus::Error;
                record.error_code = Some(error_code);
                record.error_message = error_message;
            }
        }
        record.validate()?;
        Ok(record.clone())
    }

    /// Lease reclaim: claimed rows whose lease started more than `lease_ttl_ns`
    /// ago return to queued. Returns the number of reclaimed rows.
    pub fn reclaim_expired_claim_rows(
        &mut self,
        now: MonotonicTimeNs,
        lease_ttl_ns: u64,
    ) -> u32 {
        let mut reclaimed = 0u32;
        for record in self.match_runs.values_mut() {
            if record.status != MatchRunStatus::Claimed {
                continue;
            }
            let claimed_at = record.claimed_at.map(|t| t.0).unwrap_or(0);
            if now.0.saturating_sub(claimed_at) > lease_ttl_ns {
                record.status = MatchRunStatus::Queued;
                record.worker_id = None;
                record.claimed_at = None;
                reclaimed += 1;
            }
        }
        reclaimed
    }

    // ------------------------
    // investor_candidates
    // ------------------------

    pub fn put_investor_candidate_rows(
        &mut self,
        startup_id: StartupId,
        candidates: Vec<InvestorCandidate>,
    ) -> Result<(), StorageError> {
        for candidate in &candidates {
            candidate.validate()?;
        }
        self.investor_candidates.insert(startup_id, candidates);
        Ok(())
    }

    pub fn investor_candidate_rows(&self, startup_id: &StartupId) -> &[InvestorCandidate] {
        self.investor_candidates
            .get(startup_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// In-memory advisory lock table. Mirrors the named-lock interface of a real
/// datastore so mutual exclusion stays unit-testable.
#[derive(Debug, Default)]
pub struct InMemoryAdvisoryLock {
    held: BTreeMap<String, WorkerId>,
}

impl InMemoryAdvisoryLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn holder(&self, key: &str) -> Option<&WorkerId> {
        self.held.get(key)
    }

    pub(crate) fn insert_holder(&mut self, key: String, worker_id: WorkerId) {
        self.held.insert(key, worker_id);
    }

    pub(crate) fn remove_holder(&mut self, key: &str, worker_id: &WorkerId) -> bool {
        if self.held.get(key) == Some(worker_id) {
            self.held.remove(key);
            return true;
        }
        false
    }
}
