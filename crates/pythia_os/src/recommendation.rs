#![forbid(unsafe_code)]

//! Recommendation workflow: propose / approve / reject / sweep. Proposals are
//! advisory only; nothing reaches the runtime without a human approval, and
//! every refusal carries a reason code plus the observed value that tripped it.

use pythia_kernel_contracts::mlgate::GateResult;
use pythia_kernel_contracts::recommendation::{
    RecommendationId, RecommendationRecord, RecommendationStatus, RecommendationType,
    MIN_EXPECTED_IMPROVEMENT,
};
use pythia_kernel_contracts::weights::{
    WeightSet, WeightVersionRecord, WeightVersionStatus, WeightsVersionId,
};
use pythia_kernel_contracts::{MonotonicTimeNs, ReasonCodeId};
use pythia_storage::{PythiaStore, StorageError};

use crate::version_store;

pub mod reason_codes {
    use pythia_kernel_contracts::ReasonCodeId;

    // Recommendation workflow reason-code namespace.
    pub const RECOMMEND_SOURCE_VERSION_UNKNOWN: ReasonCodeId = ReasonCodeId(0x5243_0101);
    pub const RECOMMEND_SIGNALS_IMMUTABLE_VIOLATION: ReasonCodeId = ReasonCodeId(0x5243_0102);
    pub const RECOMMEND_GATE_NOT_PASSED: ReasonCodeId = ReasonCodeId(0x5243_0103);
    pub const RECOMMEND_GOLDEN_TESTS_NOT_PASSED: ReasonCodeId = ReasonCodeId(0x5243_0104);
    pub const RECOMMEND_IMPROVEMENT_BELOW_FLOOR: ReasonCodeId = ReasonCodeId(0x5243_0105);
    pub const RECOMMEND_FREEZE_ACTIVE: ReasonCodeId = ReasonCodeId(0x5243_0106);
    pub const RECOMMEND_NOT_PENDING: ReasonCodeId = ReasonCodeId(0x5243_0107);
    pub const RECOMMEND_PENDING_EXPIRED: ReasonCodeId = ReasonCodeId(0x5243_0108);
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecommendationRefusal {
    pub reason_code: ReasonCodeId,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProposeOutcome {
    Proposed(RecommendationRecord),
    Refused(RecommendationRefusal),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApproveOutcome {
    Approved {
        recommendation: RecommendationRecord,
        new_version: WeightVersionRecord,
    },
    Refused(RecommendationRefusal),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProposeRequest {
    pub recommendation_id: RecommendationId,
    pub source_version: WeightsVersionId,
    pub candidate_weights: WeightSet,
    pub confidence: f64,
    pub reasoning: String,
    pub expected_improvement: f64,
    pub gate_result: GateResult,
    pub golden_tests_passed: bool,
    pub proposed_at: MonotonicTimeNs,
}

fn gate_refusal_detail(gate: &GateResult, failing: &'static str) -> String {
    match failing {
        "sample_size" => format!(
            "sample_size: success {}/{} fail {}/{}",
            gate.sample_size.success_count,
            gate.sample_size.min_success_count,
            gate.sample_size.fail_count,
            gate.sample_size.min_fail_count,
        ),
        "positive_rate" => format!(
            "positive_rate: {:.4} outside [{:.4}, {:.4}]",
            gate.positive_rate.positive_rate,
            gate.positive_rate.rate_min,
            gate.positive_rate.rate_max,
        ),
        _ => format!(
            "cross_time_stability: {} qualifying buckets (need {}), agreement threshold {:.2}",
            gate.stability.qualifying_buckets,
            gate.stability.min_buckets,
            gate.stability.required_agreement_ratio,
        ),
    }
}

/// Propose a component-weight rebalance. Refusals, in check order: unknown
/// source version; any byte-level drift of the signal caps or their contract
/// version (the safety contract behind the whole workflow); gate not passed;
/// golden tests not passed; expected improvement below the floor.
pub fn propose(
    store: &mut PythiaStore,
    request: ProposeRequest,
) -> Result<ProposeOutcome, StorageError> {
    let Some(source) = store.weight_version_row(&request.source_version) else {
        return Ok(ProposeOutcome::Refused(RecommendationRefusal {
            reason_code: reason_codes::RECOMMEND_SOURCE_VERSION_UNKNOWN,
            detail: format!("source version {} not in ledger", request.source_version.as_str()),
        }));
    };

    let source_weights = &source.weights;
    let caps_identical = request
        .candidate_weights
        .signal_max_points
        .bytes_identical(&source_weights.signal_max_points);
    let contract_identical = request.candidate_weights.signals_contract_version
        == source_weights.signals_contract_version;
    if !caps_identical || !contract_identical {
        return Ok(ProposeOutcome::Refused(RecommendationRefusal {
            reason_code: reason_codes::RECOMMEND_SIGNALS_IMMUTABLE_VIOLATION,
            detail: "candidate alters signal_max_points or signals_contract_version".to_string(),
        }));
    }

    if !request.gate_result.passed {
        let failing = request
            .gate_result
            .first_failing_check()
            .unwrap_or("unknown");
        return Ok(ProposeOutcome::Refused(RecommendationRefusal {
            reason_code: reason_codes::RECOMMEND_GATE_NOT_PASSED,
            detail: gate_refusal_detail(&request.gate_result, failing),
        }));
    }

    if !request.golden_tests_passed {
        return Ok(ProposeOutcome::Refused(RecommendationRefusal {
            reason_code: reason_codes::RECOMMEND_GOLDEN_TESTS_NOT_PASSED,
            detail: "golden regression suite did not pass for candidate weights".to_string(),
        }));
    }

    if request.expected_improvement < MIN_EXPECTED_IMPROVEMENT {
        return Ok(ProposeOutcome::Refused(RecommendationRefusal {
            reason_code: reason_codes::RECOMMEND_IMPROVEMENT_BELOW_FLOOR,
            detail: format!(
                "expected improvement {:.4} below floor {:.4}",
                request.expected_improvement, MIN_EXPECTED_IMPROVEMENT,
            ),
        }));
    }

    let record = RecommendationRecord::v1_pending(
        request.recommendation_id,
        request.source_version,
        request.candidate_weights,
        RecommendationType::ComponentWeightRebalance,
        request.confidence,
        request.reasoning,
        request.expected_improvement,
        request.gate_result,
        request.golden_tests_passed,
        request.proposed_at,
    )?;
    store.insert_recommendation_row(record.clone())?;
    Ok(ProposeOutcome::Proposed(record))
}

/// Human approval. Refused while the runtime is frozen, for non-pending rows,
/// and for stale pendings past the expiry window. On success the new ledger
/// version, the runtime activation, and the approved stamp commit together.
pub fn approve(
    store: &mut PythiaStore,
    recommendation_id: &RecommendationId,
    new_version_id: WeightsVersionId,
    decided_by: String,
    now: MonotonicTimeNs,
) -> Result<ApproveOutcome, StorageError> {
    let config = store
        .runtime_config_row()
        .ok_or(StorageError::ForeignKeyViolation {
            table: "runtime_config",
            key: "singleton".to_string(),
        })?;
    if config.freeze {
        return Ok(ApproveOutcome::Refused(RecommendationRefusal {
            reason_code: reason_codes::RECOMMEND_FREEZE_ACTIVE,
            detail: "runtime freeze is on; approvals are halted".to_string(),
        }));
    }

    let record = store.recommendation_row(recommendation_id).ok_or_else(|| {
        StorageError::ForeignKeyViolation {
            table: "recommendations",
            key: recommendation_id.as_str().to_string(),
        }
    })?;
    if record.status != RecommendationStatus::Pending {
        return Ok(ApproveOutcome::Refused(RecommendationRefusal {
            reason_code: reason_codes::RECOMMEND_NOT_PENDING,
            detail: format!("recommendation is {}", record.status.as_str()),
        }));
    }
    if record.is_expired_at(now) {
        return Ok(ApproveOutcome::Refused(RecommendationRefusal {
            reason_code: reason_codes::RECOMMEND_PENDING_EXPIRED,
            detail: "pending recommendation is past the expiry window".to_string(),
        }));
    }

    let candidate_weights = record.candidate_weights.clone();
    let version_record = WeightVersionRecord::v1(
        new_version_id,
        WeightVersionStatus::Active,
        candidate_weights.clone(),
        version_store::content_hash(&candidate_weights),
        decided_by.clone(),
        now,
        format!("approved from recommendation {}", recommendation_id.as_str()),
    )?;
    let approved = store.commit_recommendation_approval(
        recommendation_id,
        version_record.clone(),
        decided_by,
        now,
    )?;
    Ok(ApproveOutcome::Approved {
        recommendation: approved,
        new_version: version_record,
    })
}

/// pending -> rejected with reviewer and reason.
pub fn reject(
    store: &mut PythiaStore,
    recommendation_id: &RecommendationId,
    decided_by: String,
    rejection_reason: String,
    now: MonotonicTimeNs,
) -> Result<RecommendationRecord, StorageError> {
    store.reject_recommendation_row(recommendation_id, decided_by, rejection_reason, now)
}

/// Expire stale pendings. Idempotent; safe as a scheduled sweep.
pub fn sweep(store: &mut PythiaStore, now: MonotonicTimeNs) -> u32 {
    store.sweep_expired_recommendation_rows(now)
}
