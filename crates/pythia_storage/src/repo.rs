#![forbid(unsafe_code)]

//! Repository seams over the authoritative store. Orchestration code in
//! `pythia_os` depends on these traits, not on `PythiaStore` directly.

use pythia_kernel_contracts::explain::ScoreExplanationRecord;
use pythia_kernel_contracts::matchrun::{InvestorCandidate, MatchRunId, MatchRunRecord, WorkerId};
use pythia_kernel_contracts::recommendation::{RecommendationId, RecommendationRecord};
use pythia_kernel_contracts::runtime::RuntimeConfigRecord;
use pythia_kernel_contracts::signals::SignalStateRecord;
use pythia_kernel_contracts::weights::{WeightVersionRecord, WeightsVersionId};
use pythia_kernel_contracts::{MonotonicTimeNs, StartupId};

use crate::store::{InMemoryAdvisoryLock, MatchRunCompletion, PythiaStore, StorageError};

pub trait WeightVersionLedgerRepo {
    fn insert_weight_version(&mut self, record: WeightVersionRecord) -> Result<(), StorageError>;
    fn weight_version(&self, version_id: &WeightsVersionId) -> Option<&WeightVersionRecord>;
}

pub trait RuntimeConfigRepo {
    fn runtime_config(&self) -> Option<&RuntimeConfigRecord>;
    fn put_runtime_config(&mut self, record: RuntimeConfigRecord) -> Result<(), StorageError>;
}

pub trait ScoreExplanationRepo {
    fn upsert_score_explanation(
        &mut self,
        record: ScoreExplanationRecord,
    ) -> Result<(), StorageError>;
    fn score_explanation(
        &self,
        startup_id: &StartupId,
        weights_version: &WeightsVersionId,
    ) -> Option<&ScoreExplanationRecord>;
}

pub trait SignalStateRepo {
    fn signal_state(&self, startup_id: &StartupId) -> Option<&SignalStateRecord>;
    fn upsert_signal_state(&mut self, record: SignalStateRecord) -> Result<(), StorageError>;
}

pub trait RecommendationRepo {
    fn insert_recommendation(&mut self, record: RecommendationRecord) -> Result<(), StorageError>;
    fn recommendation(&self, recommendation_id: &RecommendationId)
        -> Option<&RecommendationRecord>;
    fn reject_recommendation(
        &mut self,
        recommendation_id: &RecommendationId,
        decided_by: String,
        rejection_reason: String,
        now: MonotonicTimeNs,
    ) -> Result<RecommendationRecord, StorageError>;
    fn sweep_expired_recommendations(&mut self, now: MonotonicTimeNs) -> u32;
    fn commit_recommendation_approval(
        &mut self,
        recommendation_id: &RecommendationId,
        version_record: WeightVersionRecord,
        decided_by: String,
        now: MonotonicTimeNs,
    ) -> Result<RecommendationRecord, StorageError>;
}

pub trait MatchRunQueueRepo {
    fn enqueue_match_run(
        &mut self,
        startup_id: StartupId,
        requested_at: MonotonicTimeNs,
    ) -> Result<MatchRunId, StorageError>;
    fn match_run(&self, run_id: MatchRunId) -> Option<&MatchRunRecord>;
    fn claim_next_match_run(
        &mut self,
        worker_id: &WorkerId,
        now: MonotonicTimeNs,
    ) -> Result<Option<MatchRunRecord>, StorageError>;
    fn complete_match_run(
        &mut self,
        run_id: MatchRunId,
        completion: MatchRunCompletion,
        now: MonotonicTimeNs,
    ) -> Result<MatchRunRecord, StorageError>;
    fn reclaim_expired_claims(&mut self, now: MonotonicTimeNs, lease_ttl_ns: u64) -> u32;
    fn investor_candidates(&self, startup_id: &StartupId) -> &[InvestorCandidate];
}

/// Named exclusive lock. `try_acquire` never blocks; a busy lock is a benign
/// skip for the caller, not an error.
pub trait AdvisoryLock {
    fn try_acquire(&mut self, key: &str, worker_id: &WorkerId) -> bool;
    fn release(&mut self, key: &str, worker_id: &WorkerId) -> bool;
}

impl WeightVersionLedgerRepo for PythiaStore {
    fn insert_weight_version(&mut self, record: WeightVersionRecord) -> Result<(), StorageError> {
        self.insert_weight_version_row(record)
    }

    fn weight_version(&self, version_id: &WeightsVersionId) -> Option<&WeightVersionRecord> {
        self.weight_version_row(version_id)
    }
}

impl RuntimeConfigRepo for PythiaStore {
    fn runtime_config(&self) -> Option<&RuntimeConfigRecord> {
        self.runtime_config_row()
    }

    fn put_runtime_config(&mut self, record: RuntimeConfigRecord) -> Result<(), StorageError> {
        self.put_runtime_config_row(record)
    }
}

impl ScoreExplanationRepo for PythiaStore {
    fn upsert_score_explanation(
        &mut self,
        record: ScoreExplanationRecord,
    ) -> Result<(), StorageError> {
        self.upsert_score_explanation_row(record)
    }

    fn score_explanation(
        &self,
        startup_id: &StartupId,
        weights_version: &WeightsVersionId,
    ) -> Option<&ScoreExplanationRecord> {
        self.score_explanation_row(startup_id, weights_version)
    }
}

impl SignalStateRepo for PythiaStore {
    fn signal_state(&self, startup_id: &StartupId) -> Option<&SignalStateRecord> {
        self.signal_state_row(startup_id)
    }

    fn upsert_signal_state(&mut self, record: SignalStateRecord) -> Result<(), StorageError> {
        self.upsert_signal_state_row(record)
    }
}

impl RecommendationRepo for PythiaStore {
    fn insert_recommendation(&mut self, record: RecommendationRecord) -> Result<(), StorageError> {
        self.insert_recommendation_row(record)
    }

    fn recommendation(
        &self,
        recommendation_id: &RecommendationId,
    ) -> Option<&RecommendationRecord> {
        self.recommendation_row(recommendation_id)
    }

    fn reject_recommendation(
        &mut self,
        recommendation_id: &RecommendationId,
        decided_by: String,
        rejection_reason: String,
        now: MonotonicTimeNs,
    ) -> Result<RecommendationRecord, StorageError> {
        self.reject_recommendation_row(recommendation_id, decided_by, rejection_reason, now)
    }

    fn sweep_expired_recommendations(&mut self, now: MonotonicTimeNs) -> u32 {
        self.sweep_expired_recommendation_rows(now)
    }

    fn commit_recommendation_approval(
        &mut self,
        recommendation_id: &RecommendationId,
        version_record: WeightVersionRecord,
        decided_by: String,
        now: MonotonicTimeNs,
    ) -> Result<RecommendationRecord, StorageError> {
        PythiaStore::commit_recommendation_approval(
            self,
            recommendation_id,
            version_record,
            decided_by,
            now,
        )
    }
}

impl MatchRunQueueRepo for PythiaStore {
    fn enqueue_match_run(
        &mut self,
        startup_id: StartupId,
        requested_at: MonotonicTimeNs,
    ) -> Result<MatchRunId, StorageError> {
        self.enqueue_match_run_row(startup_id, requested_at)
    }

    fn match_run(&self, run_id: MatchRunId) -> Option<&MatchRunRecord> {
        self.match_run_row(run_id)
    }

    fn claim_next_match_run(
        &mut self,
        worker_id: &WorkerId,
        now: MonotonicTimeNs,
    ) -> Result<Option<MatchRunRecord>, StorageError> {
        self.claim_next_match_run_row(worker_id, now)
    }

    fn complete_match_run(
        &mut self,
        run_id: MatchRunId,
        completion: MatchRunCompletion,
        now: MonotonicTimeNs,
    ) -> Result<MatchRunRecord, StorageError> {
        self.complete_match_run_row(run_id, completion, now)
    }

    fn reclaim_expired_claims(&mut self, now: MonotonicTimeNs, lease_ttl_ns: u64) -> u32 {
        self.reclaim_expired_claim_rows(now, lease_ttl_ns)
    }

    fn investor_candidates(&self, startup_id: &StartupId) -> &[InvestorCandidate] {
        self.investor_candidate_rows(startup_id)
    }
}

impl AdvisoryLock for InMemoryAdvisoryLock {
    fn try_acquire(&mut self, key: &str, worker_id: &WorkerId) -> bool {
        match self.holder(key) {
            Some(holder) => holder == worker_id,
            None => {
                self.insert_holder(key.to_string(), worker_id.clone());
                true
            }
        }
    }

    fn release(&mut self, key: &str, worker_id: &WorkerId) -> bool {
        self.remove_holder(key, worker_id)
    }
}
