#![forbid(unsafe_code)]

use crate::common::validate_unit_interval;
use crate::explain::ComponentScores;
use crate::{ContractViolation, MonotonicTimeNs, SchemaVersion, StartupId, Validate};

pub const MLGATE_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

/// Fundamentals dimensions tracked by the cross-time stability gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FundamentalDimension {
    Team,
    Traction,
    Market,
    Product,
    Moat,
}

impl FundamentalDimension {
    pub const ALL: [FundamentalDimension; 5] = [
        FundamentalDimension::Team,
        FundamentalDimension::Traction,
        FundamentalDimension::Market,
        FundamentalDimension::Product,
        FundamentalDimension::Moat,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FundamentalDimension::Team => "TEAM",
            FundamentalDimension::Traction => "TRACTION",
            FundamentalDimension::Market => "MARKET",
            FundamentalDimension::Product => "PRODUCT",
            FundamentalDimension::Moat => "MOAT",
        }
    }

    pub fn score_of(self, scores: &ComponentScores) -> f64 {
        match self {
            FundamentalDimension::Team => scores.team,
            FundamentalDimension::Traction => scores.traction,
            FundamentalDimension::Market => scores.market,
            FundamentalDimension::Product => scores.product,
            FundamentalDimension::Moat => scores.moat,
        }
    }
}

/// One startup's row in the derived training view. `is_successful` is a pure
/// disjunction of dated outcome events strictly after `score_date` within the
/// window; it must never be derived from the score or the signals bonus
/// (anti-leakage invariant, enforced by the upstream view, asserted here only
/// as documentation of the contract).
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSample {
    pub startup_id: StartupId,
    pub score_date: MonotonicTimeNs,
    pub fundamentals: ComponentScores,
    pub is_successful: bool,
}

impl Validate for TrainingSample {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.startup_id.validate()?;
        if self.score_date.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "training_sample.score_date",
                reason: "must be > 0",
            });
        }
        self.fundamentals.validate()?;
        Ok(())
    }
}

/// Read-only snapshot handed to the gate validator.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSnapshot {
    pub schema_version: SchemaVersion,
    pub window_days: u16,
    pub samples: Vec<TrainingSample>,
}

impl TrainingSnapshot {
    pub fn v1(window_days: u16, samples: Vec<TrainingSample>) -> Result<Self, ContractViolation> {
        let s = Self {
            schema_version: MLGATE_CONTRACT_VERSION,
            window_days,
            samples,
        };
        s.validate()?;
        Ok(s)
    }
}

impl Validate for TrainingSnapshot {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != MLGATE_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "training_snapshot.schema_version",
                reason: "must match MLGATE_CONTRACT_VERSION",
            });
        }
        if self.window_days == 0 || self.window_days > 730 {
            return Err(ContractViolation::InvalidValue {
                field: "training_snapshot.window_days",
                reason: "must be within 1..=730",
            });
        }
        for sample in &self.samples {
            sample.validate()?;
        }
        Ok(())
    }
}

/// Statistical preconditions a snapshot must satisfy before a learned weight
/// change may even be proposed. Every threshold is an explicit tunable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateThresholds {
    pub min_success_count: u32,
    pub min_fail_count: u32,
    pub positive_rate_min: f64,
    pub positive_rate_max: f64,
    pub min_bucket_samples: u32,
    pub min_buckets: u32,
    pub sign_agreement_ratio: f64,
}

impl GateThresholds {
    pub fn mvp_v1() -> Self {
        Self {
            min_success_count: 200,
            min_fail_count: 200,
            positive_rate_min: 0.02,
            positive_rate_max: 0.50,
            min_bucket_samples: 20,
            min_buckets: 2,
            sign_agreement_ratio: 0.75,
        }
    }
}

impl Validate for GateThresholds {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.min_success_count == 0 || self.min_fail_count == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "gate_thresholds.min_success_count",
                reason: "sample-size minimums must be >= 1",
            });
        }
        validate_unit_interval("gate_thresholds.positive_rate_min", self.positive_rate_min)?;
        validate_unit_interval("gate_thresholds.positive_rate_max", self.positive_rate_max)?;
        if self.positive_rate_min >= self.positive_rate_max {
            return Err(ContractViolation::InvalidValue {
                field: "gate_thresholds.positive_rate_min",
                reason: "must be < positive_rate_max",
            });
        }
        if self.min_bucket_samples == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "gate_thresholds.min_bucket_samples",
                reason: "must be >= 1",
            });
        }
        if self.min_buckets < 2 {
            return Err(ContractViolation::InvalidValue {
                field: "gate_thresholds.min_buckets",
                reason: "must be >= 2",
            });
        }
        validate_unit_interval(
            "gate_thresholds.sign_agreement_ratio",
            self.sign_agreement_ratio,
        )?;
        Ok(())
    }
}

/// Sample-size check: enough successes and enough failures, independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleSizeGate {
    pub passed: bool,
    pub success_count: u32,
    pub fail_count: u32,
    pub min_success_count: u32,
    pub min_fail_count: u32,
}

/// Positive-rate bounds check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositiveRateGate {
    pub passed: bool,
    pub positive_rate: f64,
    pub rate_min: f64,
    pub rate_max: f64,
}

/// Per-dimension verdict of the cross-time stability vote.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DimensionStability {
    pub dimension: FundamentalDimension,
    pub agreement_ratio: f64,
    pub stable: bool,
}

/// Cross-time stability check: the success-vs-fail delta of each tracked
/// dimension must keep one sign across enough time buckets.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossTimeStabilityGate {
    pub passed: bool,
    pub qualifying_buckets: u32,
    pub min_buckets: u32,
    pub required_agreement_ratio: f64,
    pub dimensions: Vec<DimensionStability>,
}

/// Full gate verdict. Never a bare boolean: each failing check carries its
/// threshold and the actual value observed.
#[derive(Debug, Clone, PartialEq)]
pub struct GateResult {
    pub schema_version: SchemaVersion,
    pub passed: bool,
    pub sample_size: SampleSizeGate,
    pub positive_rate: PositiveRateGate,
    pub stability: CrossTimeStabilityGate,
}

impl GateResult {
    /// Name of the first failing check, for refusal messages.
    pub fn first_failing_check(&self) -> Option<&'static str> {
        if !self.sample_size.passed {
            return Some("sample_size");
        }
        if !self.positive_rate.passed {
            return Some("positive_rate");
        }
        if !self.stability.passed {
            return Some("cross_time_stability");
        }
        None
    }
}

impl Validate for GateResult {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != MLGATE_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "gate_result.schema_version",
                reason: "must match MLGATE_CONTRACT_VERSION",
            });
        }
        let all = self.sample_size.passed && self.positive_rate.passed && self.stability.passed;
        if self.passed != all {
            return Err(ContractViolation::InvalidValue {
                field: "gate_result.passed",
                reason: "must equal the AND of the three sub-gates",
            });
        }
        validate_unit_interval("gate_result.positive_rate", self.positive_rate.positive_rate)?;
        for dimension in &self.stability.dimensions {
            validate_unit_interval(
                "gate_result.stability.agreement_ratio",
                dimension.agreement_ratio,
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_mlgate_contract_01_result_passed_must_match_subgates() {
        let result = GateResult {
            schema_version: MLGATE_CONTRACT_VERSION,
            passed: true,
            sample_size: SampleSizeGate {
                passed: false,
                success_count: 150,
                fail_count: 300,
                min_success_count: 200,
                min_fail_count: 200,
            },
            positive_rate: PositiveRateGate {
                passed: true,
                positive_rate: 0.33,
                rate_min: 0.02,
                rate_max: 0.50,
            },
            stability: CrossTimeStabilityGate {
                passed: true,
                qualifying_buckets: 4,
                min_buckets: 2,
                required_agreement_ratio: 0.75,
                dimensions: vec![],
            },
        };
        assert!(result.validate().is_err());
    }

    #[test]
    fn at_mlgate_contract_02_thresholds_are_explicit_tunables() {
        let mut t = GateThresholds::mvp_v1();
        assert!(t.validate().is_ok());
        t.min_buckets = 1;
        assert!(t.validate().is_err());
        t.min_buckets = 3;
        t.min_bucket_samples = 40;
        assert!(t.validate().is_ok());
    }
}
