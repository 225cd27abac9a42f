#![forbid(unsafe_code)]

use crate::common::{validate_text_ascii, validate_token, validate_unit_interval};
use crate::mlgate::GateResult;
use crate::weights::{WeightSet, WeightsVersionId};
use crate::{ContractViolation, MonotonicTimeNs, SchemaVersion, Validate};

pub const RECOMMENDATION_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

/// A candidate must promise at least this much expected improvement before it
/// is worth a reviewer's attention.
pub const MIN_EXPECTED_IMPROVEMENT: f64 = 0.02;

/// Pending recommendations auto-expire after 7 days. Enforced by `sweep`, not
/// transactionally.
pub const PENDING_EXPIRY_NS: u64 = 7 * 24 * 60 * 60 * 1_000_000_000;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecommendationId(String);

impl RecommendationId {
    pub fn new(id: impl Into<String>) -> Result<Self, ContractViolation> {
        let v = Self(id.into());
        v.validate()?;
        Ok(v)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for RecommendationId {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_token("recommendation_id", &self.0, 64)
    }
}

/// Tagged so future variants are compile-time exhaustive instead of
/// string-typed. v1 has exactly one mutation type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecommendationType {
    ComponentWeightRebalance,
}

impl RecommendationType {
    pub fn as_str(self) -> &'static str {
        match self {
            RecommendationType::ComponentWeightRebalance => "COMPONENT_WEIGHT_REBALANCE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecommendationStatus {
    Pending,
    Approved,
    Rejected,
    Expired,
}

impl RecommendationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RecommendationStatus::Pending => "PENDING",
            RecommendationStatus::Approved => "APPROVED",
            RecommendationStatus::Rejected => "REJECTED",
            RecommendationStatus::Expired => "EXPIRED",
        }
    }
}

/// A constrained weight-change proposal. The candidate may reweight
/// fundamentals only; its signals sub-contract must be byte-identical to the
/// source version's.
#[derive(Debug, Clone, PartialEq)]
pub struct RecommendationRecord {
    pub schema_version: SchemaVersion,
    pub recommendation_id: RecommendationId,
    pub source_version: WeightsVersionId,
    pub candidate_weights: WeightSet,
    pub recommendation_type: RecommendationType,
    pub confidence: f64,
    pub reasoning: String,
    pub expected_improvement: f64,
    pub gate_result: GateResult,
    pub golden_tests_passed: bool,
    pub status: RecommendationStatus,
    pub proposed_at: MonotonicTimeNs,
    pub decided_at: Option<MonotonicTimeNs>,
    pub decided_by: Option<String>,
    pub rejection_reason: Option<String>,
}

impl RecommendationRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn v1_pending(
        recommendation_id: RecommendationId,
        source_version: WeightsVersionId,
        candidate_weights: WeightSet,
        recommendation_type: RecommendationType,
        confidence: f64,
        reasoning: String,
        expected_improvement: f64,
        gate_result: GateResult,
        golden_tests_passed: bool,
        proposed_at: MonotonicTimeNs,
    ) -> Result<Self, ContractViolation> {
        let r = Self {
            schema_version: RECOMMENDATION_CONTRACT_VERSION,
            recommendation_id,
            source_version,
            candidate_weights,
            recommendation_type,
            confidence,
            reasoning,
            expected_improvement,
            gate_result,
            golden_tests_passed,
            status: RecommendationStatus::Pending,
            proposed_at,
            decided_at: None,
            decided_by: None,
            rejection_reason: None,
        };
        r.validate()?;
        Ok(r)
    }

    pub fn is_expired_at(&self, now: MonotonicTimeNs) -> bool {
        self.status == RecommendationStatus::Pending
            && now.0.saturating_sub(self.proposed_at.0) > PENDING_EXPIRY_NS
    }
}

impl Validate for RecommendationRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != RECOMMENDATION_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "recommendation_record.schema_version",
                reason: "must match RECOMMENDATION_CONTRACT_VERSION",
            });
        }
        self.recommendation_id.validate()?;
        self.source_version.validate()?;
        self.candidate_weights.validate()?;
        validate_unit_interval("recommendation_record.confidence", self.confidence)?;
        validate_text_ascii("recommendation_record.reasoning", &self.reasoning, 1024)?;
        if !self.expected_improvement.is_finite() {
            return Err(ContractViolation::NotFinite {
                field: "recommendation_record.expected_improvement",
            });
        }
        if self.expected_improvement < MIN_EXPECTED_IMPROVEMENT {
            return Err(ContractViolation::InvalidRange {
                field: "recommendation_record.expected_improvement",
                min: MIN_EXPECTED_IMPROVEMENT,
                max: f64::INFINITY,
                got: self.expected_improvement,
            });
        }
        self.gate_result.validate()?;
        if self.proposed_at.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "recommendation_record.proposed_at",
                reason: "must be > 0",
            });
        }
        match self.status {
            RecommendationStatus::Pending => {
                if self.decided_at.is_some() || self.decided_by.is_some() {
                    return Err(ContractViolation::InvalidValue {
                        field: "recommendation_record.decided_at",
                        reason: "must be absent while pending",
                    });
                }
            }
            RecommendationStatus::Approved | RecommendationStatus::Rejected => {
                if self.decided_at.is_none() || self.decided_by.is_none() {
                    return Err(ContractViolation::InvalidValue {
                        field: "recommendation_record.decided_at",
                        reason: "approved/rejected require decided_at and decided_by",
                    });
                }
                if self.status == RecommendationStatus::Rejected
                    && self.rejection_reason.is_none()
                {
                    return Err(ContractViolation::InvalidValue {
                        field: "recommendation_record.rejection_reason",
                        reason: "must be present when rejected",
                    });
                }
            }
            RecommendationStatus::Expired => {
                if self.decided_by.is_some() {
                    return Err(ContractViolation::InvalidValue {
                        field: "recommendation_record.decided_by",
                        reason: "expiry is mechanical, not a reviewer decision",
                    });
                }
            }
        }
        if let Some(decided_by) = &self.decided_by {
            validate_token("recommendation_record.decided_by", decided_by, 96)?;
        }
        if let Some(reason) = &self.rejection_reason {
            validate_text_ascii("recommendation_record.rejection_reason", reason, 512)?;
        }
        Ok(())
    }
}
