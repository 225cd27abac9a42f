#![forbid(unsafe_code)]

//! HTTP boundary for the score-governance core. Flat serde DTOs in and out;
//! all domain validation happens behind the typed contracts, and every
//! refusal surfaces as a string reason on the response.

use std::env;
use std::time::{SystemTime, UNIX_EPOCH};

use pythia_engines::mlgate;
use pythia_kernel_contracts::explain::ComponentScores;
use pythia_kernel_contracts::matchrun::{MatchRunErrorCode, MatchRunId, WorkerId};
use pythia_kernel_contracts::mlgate::{GateThresholds, TrainingSample, TrainingSnapshot};
use pythia_kernel_contracts::weights::{
    ComponentWeights, SignalMaxPoints, SignalsContractVersion, WeightSet, WeightsVersionId,
};
use pythia_kernel_contracts::{MonotonicTimeNs, StartupId};
use pythia_os::match_worker::{
    self, MatchWorkerConfig, PassOutcome, SystemClock, WorkerClock,
};
use pythia_os::{runtime_config, version_store};
use pythia_storage::{InMemoryAdvisoryLock, MatchRunCompletion, PythiaStore, StorageError};

fn storage_reason(err: StorageError) -> String {
    format!("{err:?}")
}

fn now_or_system(now_ns: Option<u64>) -> MonotonicTimeNs {
    match now_ns {
        Some(ns) => MonotonicTimeNs(ns),
        None => SystemClock.now(),
    }
}

// ------------------------
// DTOs
// ------------------------

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ComponentWeightsDto {
    pub team: f64,
    pub traction: f64,
    pub market: f64,
    pub product: f64,
    pub moat: f64,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SignalMaxPointsDto {
    pub founder_momentum: f64,
    pub market_psychology: f64,
    pub narrative_fit: f64,
    pub capital_convergence: f64,
    pub timing: f64,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CreateVersionAdapterRequest {
    pub version_id: String,
    pub component_weights: ComponentWeightsDto,
    pub signal_max_points: SignalMaxPointsDto,
    pub normalization_divisor: f64,
    pub base_boost_minimum: f64,
    pub vibe_bonus_cap: f64,
    pub final_score_multiplier: f64,
    pub signals_contract_version: u32,
    pub created_by: String,
    pub comment: String,
    pub now_ns: Option<u64>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CreateVersionAdapterResponse {
    pub status: String,
    pub version_id: Option<String>,
    pub content_hash_sha256: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RuntimeConfigAdapterResponse {
    pub status: String,
    pub active_weights_version: Option<String>,
    pub override_weights_version: Option<String>,
    pub effective_weights_version: Option<String>,
    pub freeze: Option<bool>,
    pub updated_at_ns: Option<u64>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ComponentScoresDto {
    pub team: f64,
    pub traction: f64,
    pub market: f64,
    pub product: f64,
    pub moat: f64,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SignalContributionDto {
    pub dimension: String,
    pub points: f64,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ExplainBodyDto {
    pub base_total_score: f64,
    pub signals_bonus: f64,
    pub total_score: f64,
    pub component_scores: ComponentScoresDto,
    pub top_signal_contributions: Vec<SignalContributionDto>,
    pub computed_at_ns: u64,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ExplainAdapterResponse {
    pub status: String,
    pub found: bool,
    pub weights_version: Option<String>,
    pub explain: Option<ExplainBodyDto>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TrainingSampleDto {
    pub startup_id: String,
    pub score_date_ns: u64,
    pub fundamentals: ComponentScoresDto,
    pub is_successful: bool,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct GateCheckAdapterRequest {
    pub window_days: u16,
    pub samples: Vec<TrainingSampleDto>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct GateCheckSubGateDto {
    pub passed: bool,
    pub detail: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct GateCheckGatesDto {
    pub sample_size: GateCheckSubGateDto,
    pub positive_rate: GateCheckSubGateDto,
    pub cross_time_stability: GateCheckSubGateDto,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct GateCheckAdapterResponse {
    pub status: String,
    pub passed: Option<bool>,
    pub gates: Option<GateCheckGatesDto>,
    pub summary: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EnqueueMatchRunAdapterRequest {
    pub startup_id: String,
    pub now_ns: Option<u64>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ClaimMatchRunAdapterRequest {
    pub worker_id: String,
    pub now_ns: Option<u64>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ClaimMatchRunAdapterResponse {
    pub status: String,
    pub claimed: bool,
    pub run_id: Option<u64>,
    pub startup_id: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CompleteMatchRunAdapterRequest {
    pub run_id: u64,
    pub outcome: String,
    pub match_count: Option<u16>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub now_ns: Option<u64>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MatchRunStatusAdapterResponse {
    pub status: String,
    pub run_id: Option<u64>,
    pub run_status: Option<String>,
    pub match_count: Option<u16>,
    pub error_code: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TopMatchRowDto {
    pub investor_id: String,
    pub score: f64,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TopMatchesAdapterResponse {
    pub status: String,
    pub rows: Vec<TopMatchRowDto>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct WorkerRunDto {
    pub run_id: u64,
    pub startup_id: String,
    pub status: String,
    pub match_count: Option<u16>,
    pub error_code: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct WorkerPassAdapterResponse {
    pub status: String,
    pub outcome: String,
    pub reclaimed: u32,
    pub runs: Vec<WorkerRunDto>,
    pub reason: Option<String>,
}

// ------------------------
// Runtime
// ------------------------

/// One in-process instance of the governance core plus worker plumbing.
pub struct AdapterRuntime {
    store: PythiaStore,
    lock: InMemoryAdvisoryLock,
    worker_config: MatchWorkerConfig,
    worker_id: WorkerId,
}

impl AdapterRuntime {
    /// Worker tunables come from env vars; defaults match `mvp_v1`.
    pub fn default_from_env() -> Result<Self, String> {
        let mut worker_config = MatchWorkerConfig::mvp_v1();
        worker_config.max_runs = parse_env_u64("PYTHIA_WORKER_MAX_RUNS", 1, 64)
            .unwrap_or(worker_config.max_runs as u64) as u32;
        worker_config.max_time_ms = parse_env_u64("PYTHIA_WORKER_MAX_TIME_MS", 100, 60_000)
            .unwrap_or(worker_config.max_time_ms);
        worker_config.step_timeout_ms = parse_env_u64("PYTHIA_WORKER_STEP_TIMEOUT_MS", 100, 60_000)
            .unwrap_or(worker_config.step_timeout_ms);
        worker_config.advisory_lock_enabled =
            parse_env_flag("PYTHIA_WORKER_ADVISORY_LOCK_ENABLED", true);

        let worker_name = env::var("PYTHIA_WORKER_ID").unwrap_or_else(|_| {
            let nanos = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or(0);
            format!("pythia_worker_{nanos}")
        });
        let worker_id = WorkerId::new(worker_name).map_err(|v| format!("{v:?}"))?;

        Ok(Self {
            store: PythiaStore::new_in_memory(),
            lock: InMemoryAdvisoryLock::new(),
            worker_config,
            worker_id,
        })
    }

    pub fn create_version(
        &mut self,
        request: CreateVersionAdapterRequest,
    ) -> Result<CreateVersionAdapterResponse, String> {
        let build = || -> Result<(WeightsVersionId, WeightSet), String> {
            let version_id =
                WeightsVersionId::new(request.version_id.clone()).map_err(|v| format!("{v:?}"))?;
            let c = &request.component_weights;
            let s = &request.signal_max_points;
            let weights = WeightSet::v1(
                ComponentWeights::v1(c.team, c.traction, c.market, c.product, c.moat)
                    .map_err(|v| format!("{v:?}"))?,
                SignalMaxPoints::v1(
                    s.founder_momentum,
                    s.market_psychology,
                    s.narrative_fit,
                    s.capital_convergence,
                    s.timing,
                )
                .map_err(|v| format!("{v:?}"))?,
                request.normalization_divisor,
                request.base_boost_minimum,
                request.vibe_bonus_cap,
                request.final_score_multiplier,
                SignalsContractVersion(request.signals_contract_version),
            )
            .map_err(|v| format!("{v:?}"))?;
            Ok((version_id, weights))
        };

        let (version_id, weights) = match build() {
            Ok(parts) => parts,
            Err(reason) => {
                return Ok(CreateVersionAdapterResponse {
                    status: "error".to_string(),
                    version_id: None,
                    content_hash_sha256: None,
                    reason: Some(reason),
                })
            }
        };
        match version_store::create_version(
            &mut self.store,
            version_id,
            weights,
            request.created_by,
            request.comment,
            now_or_system(request.now_ns),
        ) {
            Ok(record) => Ok(CreateVersionAdapterResponse {
                status: "ok".to_string(),
                version_id: Some(record.version_id.as_str().to_string()),
                content_hash_sha256: Some(record.content_hash_sha256),
                reason: None,
            }),
            Err(err) => Ok(CreateVersionAdapterResponse {
                status: "error".to_string(),
                version_id: None,
                content_hash_sha256: None,
                reason: Some(storage_reason(err)),
            }),
        }
    }

    pub fn runtime_config_report(&self) -> RuntimeConfigAdapterResponse {
        match runtime_config::get_config(&self.store) {
            Some(config) => RuntimeConfigAdapterResponse {
                status: "ok".to_string(),
                active_weights_version: Some(config.active_version.as_str().to_string()),
                override_weights_version: config
                    .override_version
                    .as_ref()
                    .map(|v| v.as_str().to_string()),
                effective_weights_version: Some(config.effective_version().as_str().to_string()),
                freeze: Some(config.freeze),
                updated_at_ns: Some(config.updated_at.0),
                reason: None,
            },
            None => RuntimeConfigAdapterResponse {
                status: "error".to_string(),
                active_weights_version: None,
                override_weights_version: None,
                effective_weights_version: None,
                freeze: None,
                updated_at_ns: None,
                reason: Some("runtime config not bootstrapped".to_string()),
            },
        }
    }

    pub fn explain_report(
        &self,
        startup_id: &str,
        weights_version: Option<&str>,
    ) -> Result<ExplainAdapterResponse, String> {
        let startup = StartupId::new(startup_id).map_err(|v| format!("{v:?}"))?;
        let version = match weights_version {
            Some(raw) => Some(WeightsVersionId::new(raw).map_err(|v| format!("{v:?}"))?),
            None => None,
        };
        match pythia_os::explain::explain(&self.store, &startup, version.as_ref()) {
            Ok(pythia_os::explain::ExplainOutcome::Found(record)) => Ok(ExplainAdapterResponse {
                status: "ok".to_string(),
                found: true,
                weights_version: Some(record.weights_version.as_str().to_string()),
                explain: Some(ExplainBodyDto {
                    base_total_score: record.base_total_score,
                    signals_bonus: record.signals_bonus,
                    total_score: record.total_score,
                    component_scores: ComponentScoresDto {
                        team: record.component_scores.team,
                        traction: record.component_scores.traction,
                        market: record.component_scores.market,
                        product: record.component_scores.product,
                        moat: record.component_scores.moat,
                    },
                    top_signal_contributions: record
                        .top_signal_contributions
                        .iter()
                        .map(|c| SignalContributionDto {
                            dimension: c.dimension.as_str().to_string(),
                            points: c.points,
                        })
                        .collect(),
                    computed_at_ns: record.computed_at.0,
                }),
                reason: None,
            }),
            Ok(pythia_os::explain::ExplainOutcome::NotFound { weights_version }) => {
                Ok(ExplainAdapterResponse {
                    status: "ok".to_string(),
                    found: false,
                    weights_version: Some(weights_version.as_str().to_string()),
                    explain: None,
                    reason: None,
                })
            }
            Err(err) => Err(storage_reason(err)),
        }
    }

    pub fn gate_check(
        &self,
        request: GateCheckAdapterRequest,
    ) -> Result<GateCheckAdapterResponse, String> {
        let build = || -> Result<TrainingSnapshot, String> {
            let samples = request
                .samples
                .iter()
                .map(|dto| {
                    let f = &dto.fundamentals;
                    Ok(TrainingSample {
                        startup_id: StartupId::new(dto.startup_id.clone())
                            .map_err(|v| format!("{v:?}"))?,
                        score_date: MonotonicTimeNs(dto.score_date_ns),
                        fundamentals: ComponentScores::v1(
                            f.team, f.traction, f.market, f.product, f.moat,
                        )
                        .map_err(|v| format!("{v:?}"))?,
                        is_successful: dto.is_successful,
                    })
                })
                .collect::<Result<Vec<_>, String>>()?;
            TrainingSnapshot::v1(request.window_days, samples).map_err(|v| format!("{v:?}"))
        };
        let snapshot = match build() {
            Ok(snapshot) => snapshot,
            Err(reason) => {
                return Ok(GateCheckAdapterResponse {
                    status: "error".to_string(),
                    passed: None,
                    gates: None,
                    summary: None,
                    reason: Some(reason),
                })
            }
        };
        let result = mlgate::evaluate(&snapshot, &GateThresholds::mvp_v1())
            .map_err(|v| format!("{v:?}"))?;

        let summary = match result.first_failing_check() {
            None => "all gate checks passed".to_string(),
            Some(check) => format!("gate refused at {check}"),
        };
        Ok(GateCheckAdapterResponse {
            status: "ok".to_string(),
            passed: Some(result.passed),
            gates: Some(GateCheckGatesDto {
                sample_size: GateCheckSubGateDto {
                    passed: result.sample_size.passed,
                    detail: format!(
                        "success {}/{} fail {}/{}",
                        result.sample_size.success_count,
                        result.sample_size.min_success_count,
                        result.sample_size.fail_count,
                        result.sample_size.min_fail_count,
                    ),
                },
                positive_rate: GateCheckSubGateDto {
                    passed: result.positive_rate.passed,
                    detail: format!(
                        "{:.4} in [{:.4}, {:.4}]",
                        result.positive_rate.positive_rate,
                        result.positive_rate.rate_min,
                        result.positive_rate.rate_max,
                    ),
                },
                cross_time_stability: GateCheckSubGateDto {
                    passed: result.stability.passed,
                    detail: format!(
                        "{} qualifying buckets (need {})",
                        result.stability.qualifying_buckets, result.stability.min_buckets,
                    ),
                },
            }),
            summary: Some(summary),
            reason: None,
        })
    }

    pub fn enqueue_match_run(
        &mut self,
        request: EnqueueMatchRunAdapterRequest,
    ) -> Result<MatchRunStatusAdapterResponse, String> {
        let startup = StartupId::new(request.startup_id).map_err(|v| format!("{v:?}"))?;
        match self
            .store
            .enqueue_match_run_row(startup, now_or_system(request.now_ns))
        {
            Ok(run_id) => Ok(MatchRunStatusAdapterResponse {
                status: "ok".to_string(),
                run_id: Some(run_id.0),
                run_status: Some("QUEUED".to_string()),
                match_count: None,
                error_code: None,
                reason: None,
            }),
            Err(err) => Err(storage_reason(err)),
        }
    }

    pub fn claim_match_run(
        &mut self,
        request: ClaimMatchRunAdapterRequest,
    ) -> Result<ClaimMatchRunAdapterResponse, String> {
        let worker = WorkerId::new(request.worker_id).map_err(|v| format!("{v:?}"))?;
        match self
            .store
            .claim_next_match_run_row(&worker, now_or_system(request.now_ns))
        {
            Ok(Some(record)) => Ok(ClaimMatchRunAdapterResponse {
                status: "ok".to_string(),
                claimed: true,
                run_id: Some(record.run_id.0),
                startup_id: Some(record.startup_id.as_str().to_string()),
                reason: None,
            }),
            Ok(None) => Ok(ClaimMatchRunAdapterResponse {
                status: "ok".to_string(),
                claimed: false,
                run_id: None,
                startup_id: None,
                reason: None,
            }),
            Err(err) => Err(storage_reason(err)),
        }
    }

    pub fn complete_match_run(
        &mut self,
        request: CompleteMatchRunAdapterRequest,
    ) -> Result<MatchRunStatusAdapterResponse, String> {
        let completion = match request.outcome.as_str() {
            "ready" => MatchRunCompletion::Ready {
                match_count: request
                    .match_count
                    .ok_or_else(|| "ready completion requires match_count".to_string())?,
            },
            "error" => MatchRunCompletion::Error {
                error_code: match request.error_code.as_deref() {
                    Some("TIMEOUT") => MatchRunErrorCode::Timeout,
                    Some("CONFIG_UNAVAILABLE") => MatchRunErrorCode::ConfigUnavailable,
                    Some("SCORING_FAILED") => MatchRunErrorCode::ScoringFailed,
                    other => return Err(format!("unknown error_code {other:?}")),
                },
                error_message: request.error_message,
            },
            other => return Err(format!("unknown outcome {other:?}")),
        };
        match self.store.complete_match_run_row(
            MatchRunId(request.run_id),
            completion,
            now_or_system(request.now_ns),
        ) {
            Ok(record) => Ok(MatchRunStatusAdapterResponse {
                status: "ok".to_string(),
                run_id: Some(record.run_id.0),
                run_status: Some(record.status.as_str().to_string()),
                match_count: record.match_count,
                error_code: record.error_code.map(|c| c.as_str().to_string()),
                reason: None,
            }),
            Err(err) => Err(storage_reason(err)),
        }
    }

    pub fn top_matches(
        &self,
        startup_id: &str,
        limit: Option<usize>,
    ) -> Result<TopMatchesAdapterResponse, String> {
        let startup = StartupId::new(startup_id).map_err(|v| format!("{v:?}"))?;
        let rows = match_worker::top_matches(&self.store, &startup, limit.unwrap_or(20))
            .map_err(storage_reason)?;
        Ok(TopMatchesAdapterResponse {
            status: "ok".to_string(),
            rows: rows
                .into_iter()
                .map(|row| TopMatchRowDto {
                    investor_id: row.investor_id.as_str().to_string(),
                    score: row.score,
                })
                .collect(),
            reason: None,
        })
    }

    /// One worker batch pass; this is what the external scheduler hits.
    pub fn run_worker_pass(&mut self) -> Result<WorkerPassAdapterResponse, String> {
        let outcome = match_worker::run_pass(
            &mut self.store,
            &mut self.lock,
            &SystemClock,
            &self.worker_id,
            &self.worker_config,
        )
        .map_err(storage_reason)?;
        Ok(match outcome {
            PassOutcome::LockBusy => WorkerPassAdapterResponse {
                status: "ok".to_string(),
                outcome: "LOCK_BUSY".to_string(),
                reclaimed: 0,
                runs: vec![],
                reason: None,
            },
            PassOutcome::Completed(report) => WorkerPassAdapterResponse {
                status: "ok".to_string(),
                outcome: "COMPLETED".to_string(),
                reclaimed: report.reclaimed,
                runs: report
                    .runs
                    .into_iter()
                    .map(|run| WorkerRunDto {
                        run_id: run.run_id.0,
                        startup_id: run.startup_id.as_str().to_string(),
                        status: run.status.as_str().to_string(),
                        match_count: run.match_count,
                        error_code: run.error_code.map(|c| c.as_str().to_string()),
                    })
                    .collect(),
                reason: None,
            },
        })
    }

    pub fn store_mut(&mut self) -> &mut PythiaStore {
        &mut self.store
    }

    pub fn store(&self) -> &PythiaStore {
        &self.store
    }
}

fn parse_env_flag(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(v) => !matches!(
            v.trim().to_ascii_lowercase().as_str(),
            "0" | "false" | "off" | "no"
        ),
        Err(_) => default,
    }
}

fn parse_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|v| (min..=max).contains(v))
}
