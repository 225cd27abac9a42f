#![forbid(unsafe_code)]

//! Short-lived batch worker for match runs. A pass claims queued jobs under a
//! named advisory lock, ranks investor candidates with the runtime-effective
//! weights, and completes each job `ready` or `error`. Passes are bounded by a
//! run count and a wall-clock budget; the budget only prevents starting new
//! work, in-flight work always finishes.

use pythia_engines::matchrank::rank_candidates;
use pythia_kernel_contracts::matchrun::{
    MatchRow, MatchRunErrorCode, MatchRunId, MatchRunRecord, MatchRunStatus, WorkerId,
    MATCH_COUNT_CAP,
};
use pythia_kernel_contracts::weights::WeightsVersionId;
use pythia_kernel_contracts::{ContractViolation, InvestorId, MonotonicTimeNs, StartupId, Validate};
use pythia_storage::repo::AdvisoryLock;
use pythia_storage::{MatchRunCompletion, PythiaStore, StorageError};

pub const MATCH_WORKER_LOCK_KEY: &str = "pythia:match_worker";

/// Injectable time source so pass budgets are testable without sleeping.
pub trait WorkerClock {
    fn now(&self) -> MonotonicTimeNs;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl WorkerClock for SystemClock {
    fn now(&self) -> MonotonicTimeNs {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        MonotonicTimeNs(nanos)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchWorkerConfig {
    pub max_runs: u32,
    pub max_time_ms: u64,
    pub step_timeout_ms: u64,
    pub claim_lease_ttl_ms: u64,
    pub advisory_lock_enabled: bool,
}

impl MatchWorkerConfig {
    pub fn mvp_v1() -> Self {
        Self {
            max_runs: 2,
            max_time_ms: 8_000,
            step_timeout_ms: 4_000,
            claim_lease_ttl_ms: 60_000,
            advisory_lock_enabled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub run_id: MatchRunId,
    pub startup_id: StartupId,
    pub status: MatchRunStatus,
    pub match_count: Option<u16>,
    pub error_code: Option<MatchRunErrorCode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PassReport {
    pub reclaimed: u32,
    pub runs: Vec<RunReport>,
    pub stopped_by_time_budget: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PassOutcome {
    /// Another worker holds the lock. Nothing was claimed; the next scheduled
    /// pass will try again.
    LockBusy,
    Completed(PassReport),
}

fn ms_to_ns(ms: u64) -> u64 {
    ms.saturating_mul(1_000_000)
}

/// One batch pass. The lock is released on every exit path, including errors.
pub fn run_pass(
    store: &mut PythiaStore,
    lock: &mut dyn AdvisoryLock,
    clock: &dyn WorkerClock,
    worker_id: &WorkerId,
    config: &MatchWorkerConfig,
) -> Result<PassOutcome, StorageError> {
    if config.advisory_lock_enabled && !lock.try_acquire(MATCH_WORKER_LOCK_KEY, worker_id) {
        return Ok(PassOutcome::LockBusy);
    }
    let result = pass_locked(store, clock, worker_id, config);
    if config.advisory_lock_enabled {
        lock.release(MATCH_WORKER_LOCK_KEY, worker_id);
    }
    result.map(PassOutcome::Completed)
}

fn pass_locked(
    store: &mut PythiaStore,
    clock: &dyn WorkerClock,
    worker_id: &WorkerId,
    config: &MatchWorkerConfig,
) -> Result<PassReport, StorageError> {
    let started = clock.now();
    let reclaimed = store.reclaim_expired_claim_rows(started, ms_to_ns(config.claim_lease_ttl_ms));

    let mut runs = Vec::new();
    let mut stopped_by_time_budget = false;
    while (runs.len() as u32) < config.max_runs {
        let now = clock.now();
        if now.0.saturating_sub(started.0) > ms_to_ns(config.max_time_ms) {
            stopped_by_time_budget = true;
            break;
        }
        let Some(claimed) = store.claim_next_match_run_row(worker_id, now)? else {
            break;
        };
        runs.push(execute_run(store, clock, &claimed, config)?);
    }
    Ok(PassReport {
        reclaimed,
        runs,
        stopped_by_time_budget,
    })
}

fn execute_run(
    store: &mut PythiaStore,
    clock: &dyn WorkerClock,
    claimed: &MatchRunRecord,
    config: &MatchWorkerConfig,
) -> Result<RunReport, StorageError> {
    let step_started = clock.now();
    let completion = match rank_for_startup(store, &claimed.startup_id) {
        Ok(rows) => {
            let elapsed = clock.now().0.saturating_sub(step_started.0);
            if elapsed > ms_to_ns(config.step_timeout_ms) {
                MatchRunCompletion::Error {
                    error_code: MatchRunErrorCode::Timeout,
                    error_message: Some("step exceeded its time budget".to_string()),
                }
            } else {
                MatchRunCompletion::Ready {
                    match_count: rows.len() as u16,
                }
            }
        }
        Err(rank_error) => rank_error.into_completion(),
    };
    let done = store.complete_match_run_row(claimed.run_id, completion, clock.now())?;
    Ok(RunReport {
        run_id: done.run_id,
        startup_id: done.startup_id.clone(),
        status: done.status,
        match_count: done.match_count,
        error_code: done.error_code,
    })
}

/// Why a ranking attempt could not produce rows. The worker turns this into a
/// run completion; the read-side query turns it into a storage error that
/// still names the failing table or contract.
#[derive(Debug, Clone, PartialEq)]
enum RankError {
    ConfigMissing,
    VersionMissing(WeightsVersionId),
    CandidateInvalid(InvestorId, ContractViolation),
}

impl RankError {
    fn into_completion(self) -> MatchRunCompletion {
        match self {
            RankError::ConfigMissing => MatchRunCompletion::Error {
                error_code: MatchRunErrorCode::ConfigUnavailable,
                error_message: Some("runtime config row missing".to_string()),
            },
            RankError::VersionMissing(version) => MatchRunCompletion::Error {
                error_code: MatchRunErrorCode::ConfigUnavailable,
                error_message: Some(format!(
                    "effective version {} not in ledger",
                    version.as_str()
                )),
            },
            RankError::CandidateInvalid(investor_id, _) => MatchRunCompletion::Error {
                error_code: MatchRunErrorCode::ScoringFailed,
                error_message: Some(format!(
                    "candidate {} failed validation",
                    investor_id.as_str()
                )),
            },
        }
    }

    fn into_storage_error(self) -> StorageError {
        match self {
            RankError::ConfigMissing => StorageError::ForeignKeyViolation {
                table: "runtime_config",
                key: "singleton".to_string(),
            },
            RankError::VersionMissing(version) => StorageError::ForeignKeyViolation {
                table: "weight_versions",
                key: version.as_str().to_string(),
            },
            RankError::CandidateInvalid(_, violation) => {
                StorageError::ContractViolation(violation)
            }
        }
    }
}

/// Rank all candidates for a startup with the runtime-effective weights,
/// truncated at the reporting cap. A count equal to the cap reads as "cap or
/// more".
fn rank_for_startup(
    store: &PythiaStore,
    startup_id: &StartupId,
) -> Result<Vec<MatchRow>, RankError> {
    let Some(config_row) = store.runtime_config_row() else {
        return Err(RankError::ConfigMissing);
    };
    let effective = config_row.effective_version().clone();
    let Some(version) = store.weight_version_row(&effective) else {
        return Err(RankError::VersionMissing(effective));
    };
    let candidates = store.investor_candidate_rows(startup_id);
    for candidate in candidates {
        if let Err(violation) = candidate.validate() {
            return Err(RankError::CandidateInvalid(
                candidate.investor_id.clone(),
                violation,
            ));
        }
    }
    Ok(rank_candidates(
        &version.weights,
        candidates,
        MATCH_COUNT_CAP as usize,
    ))
}

/// Read-side ranking for the top-matches query. Same scoring path as the
/// worker, caller-bounded limit under the cap.
pub fn top_matches(
    store: &PythiaStore,
    startup_id: &StartupId,
    limit: usize,
) -> Result<Vec<MatchRow>, StorageError> {
    match rank_for_startup(store, startup_id) {
        Ok(mut rows) => {
            rows.truncate(limit.min(MATCH_COUNT_CAP as usize));
            Ok(rows)
        }
        Err(rank_error) => Err(rank_error.into_storage_error()),
    }
}
