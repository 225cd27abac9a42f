#![forbid(unsafe_code)]

use crate::common::{validate_range, validate_text_ascii, validate_token, validate_unit_interval};
use crate::{ContractViolation, MonotonicTimeNs, SchemaVersion, Validate};

pub const WEIGHTS_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

/// Tolerance for the component-weight sum (floating point round-off only).
pub const COMPONENT_WEIGHT_SUM_TOLERANCE: f64 = 1e-6;
/// The signal budget is an exact contract value; only representation noise is allowed.
pub const SIGNAL_MAX_POINTS_SUM: f64 = 10.0;
pub const SIGNAL_MAX_POINTS_SUM_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WeightsVersionId(String);

impl WeightsVersionId {
    pub fn new(id: impl Into<String>) -> Result<Self, ContractViolation> {
        let v = Self(id.into());
        v.validate()?;
        Ok(v)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for WeightsVersionId {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_token("weights_version_id", &self.0, 64)
    }
}

/// Version of the signals scoring contract. A learned recommendation may never
/// move this; it is governed separately from the fundamentals weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SignalsContractVersion(pub u32);

impl Validate for SignalsContractVersion {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "signals_contract_version",
                reason: "must be >= 1",
            });
        }
        Ok(())
    }
}

/// Fundamentals weights. Five named components summing to 1.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComponentWeights {
    pub team: f64,
    pub traction: f64,
    pub market: f64,
    pub product: f64,
    pub moat: f64,
}

impl ComponentWeights {
    pub fn v1(
        team: f64,
        traction: f64,
        market: f64,
        product: f64,
        moat: f64,
    ) -> Result<Self, ContractViolation> {
        let w = Self {
            team,
            traction,
            market,
            product,
            moat,
        };
        w.validate()?;
        Ok(w)
    }

    pub fn sum(&self) -> f64 {
        self.team + self.traction + self.market + self.product + self.moat
    }

    pub fn as_array(&self) -> [f64; 5] {
        [self.team, self.traction, self.market, self.product, self.moat]
    }
}

impl Validate for ComponentWeights {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_unit_interval("component_weights.team", self.team)?;
        validate_unit_interval("component_weights.traction", self.traction)?;
        validate_unit_interval("component_weights.market", self.market)?;
        validate_unit_interval("component_weights.product", self.product)?;
        validate_unit_interval("component_weights.moat", self.moat)?;
        if (self.sum() - 1.0).abs() > COMPONENT_WEIGHT_SUM_TOLERANCE {
            return Err(ContractViolation::InvalidRange {
                field: "component_weights.sum",
                min: 1.0 - COMPONENT_WEIGHT_SUM_TOLERANCE,
                max: 1.0 + COMPONENT_WEIGHT_SUM_TOLERANCE,
                got: self.sum(),
            });
        }
        Ok(())
    }
}

/// Per-dimension caps for the signals bonus. Five named budgets summing to 10.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalMaxPoints {
    pub founder_momentum: f64,
    pub market_psychology: f64,
    pub narrative_fit: f64,
    pub capital_convergence: f64,
    pub timing: f64,
}

impl SignalMaxPoints {
    pub fn v1(
        founder_momentum: f64,
        market_psychology: f64,
        narrative_fit: f64,
        capital_convergence: f64,
        timing: f64,
    ) -> Result<Self, ContractViolation> {
        let p = Self {
            founder_momentum,
            market_psychology,
            narrative_fit,
            capital_convergence,
            timing,
        };
        p.validate()?;
        Ok(p)
    }

    pub fn sum(&self) -> f64 {
        self.founder_momentum
            + self.market_psychology
            + self.narrative_fit
            + self.capital_convergence
            + self.timing
    }

    pub fn as_array(&self) -> [f64; 5] {
        [
            self.founder_momentum,
            self.market_psychology,
            self.narrative_fit,
            self.capital_convergence,
            self.timing,
        ]
    }

    /// Byte-level equality. The signals-immutability contract compares bit
    /// patterns, not approximate values.
    pub fn bytes_identical(&self, other: &SignalMaxPoints) -> bool {
        self.as_array()
            .iter()
            .zip(other.as_array().iter())
            .all(|(a, b)| a.to_bits() == b.to_bits())
    }
}

impl Validate for SignalMaxPoints {
    fn validate(&self) -> Result<(), ContractViolation> {
        for (field, value) in [
            ("signal_max_points.founder_momentum", self.founder_momentum),
            ("signal_max_points.market_psychology", self.market_psychology),
            ("signal_max_points.narrative_fit", self.narrative_fit),
            (
                "signal_max_points.capital_convergence",
                self.capital_convergence,
            ),
            ("signal_max_points.timing", self.timing),
        ] {
            validate_range(field, value, 0.0, SIGNAL_MAX_POINTS_SUM)?;
        }
        if (self.sum() - SIGNAL_MAX_POINTS_SUM).abs() > SIGNAL_MAX_POINTS_SUM_TOLERANCE {
            return Err(ContractViolation::InvalidRange {
                field: "signal_max_points.sum",
                min: SIGNAL_MAX_POINTS_SUM,
                max: SIGNAL_MAX_POINTS_SUM,
                got: self.sum(),
            });
        }
        Ok(())
    }
}

/// The full weight/configuration payload carried by one ledger version.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightSet {
    pub component_weights: ComponentWeights,
    pub signal_max_points: SignalMaxPoints,
    pub normalization_divisor: f64,
    pub base_boost_minimum: f64,
    pub vibe_bonus_cap: f64,
    pub final_score_multiplier: f64,
    pub signals_contract_version: SignalsContractVersion,
}

impl WeightSet {
    pub fn v1(
        component_weights: ComponentWeights,
        signal_max_points: SignalMaxPoints,
        normalization_divisor: f64,
        base_boost_minimum: f64,
        vibe_bonus_cap: f64,
        final_score_multiplier: f64,
        signals_contract_version: SignalsContractVersion,
    ) -> Result<Self, ContractViolation> {
        let w = Self {
            component_weights,
            signal_max_points,
            normalization_divisor,
            base_boost_minimum,
            vibe_bonus_cap,
            final_score_multiplier,
            signals_contract_version,
        };
        w.validate()?;
        Ok(w)
    }

    /// Deterministic fixed-order, fixed-precision rendering. The content hash
    /// of a version is computed over exactly this string, so field order and
    /// formatting are part of the contract.
    pub fn canonical_string(&self) -> String {
        let c = &self.component_weights;
        let s = &self.signal_max_points;
        format!(
            "cw:team={:.9},traction={:.9},market={:.9},product={:.9},moat={:.9};\
             smp:founder_momentum={:.9},market_psychology={:.9},narrative_fit={:.9},capital_convergence={:.9},timing={:.9};\
             normalization_divisor={:.9};base_boost_minimum={:.9};vibe_bonus_cap={:.9};\
             final_score_multiplier={:.9};signals_contract_version={}",
            c.team,
            c.traction,
            c.market,
            c.product,
            c.moat,
            s.founder_momentum,
            s.market_psychology,
            s.narrative_fit,
            s.capital_convergence,
            s.timing,
            self.normalization_divisor,
            self.base_boost_minimum,
            self.vibe_bonus_cap,
            self.final_score_multiplier,
            self.signals_contract_version.0,
        )
    }
}

impl Validate for WeightSet {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.component_weights.validate()?;
        self.signal_max_points.validate()?;
        validate_range(
            "weight_set.normalization_divisor",
            self.normalization_divisor,
            1e-6,
            1e6,
        )?;
        validate_range(
            "weight_set.base_boost_minimum",
            self.base_boost_minimum,
            0.0,
            100.0,
        )?;
        validate_range("weight_set.vibe_bonus_cap", self.vibe_bonus_cap, 0.0, 10.0)?;
        validate_range(
            "weight_set.final_score_multiplier",
            self.final_score_multiplier,
            1e-6,
            1e3,
        )?;
        self.signals_contract_version.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WeightVersionStatus {
    Active,
    Deprecated,
    Revoked,
}

impl WeightVersionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            WeightVersionStatus::Active => "ACTIVE",
            WeightVersionStatus::Deprecated => "DEPRECATED",
            WeightVersionStatus::Revoked => "REVOKED",
        }
    }
}

/// One row of the append-only weight-version ledger. Never mutated or deleted
/// once persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightVersionRecord {
    pub schema_version: SchemaVersion,
    pub version_id: WeightsVersionId,
    pub status: WeightVersionStatus,
    pub weights: WeightSet,
    pub content_hash_sha256: String,
    pub created_by: String,
    pub created_at: MonotonicTimeNs,
    pub comment: String,
}

impl WeightVersionRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn v1(
        version_id: WeightsVersionId,
        status: WeightVersionStatus,
        weights: WeightSet,
        content_hash_sha256: String,
        created_by: String,
        created_at: MonotonicTimeNs,
        comment: String,
    ) -> Result<Self, ContractViolation> {
        let r = Self {
            schema_version: WEIGHTS_CONTRACT_VERSION,
            version_id,
            status,
            weights,
            content_hash_sha256,
            created_by,
            created_at,
            comment,
        };
        r.validate()?;
        Ok(r)
    }
}

impl Validate for WeightVersionRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != WEIGHTS_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "weight_version_record.schema_version",
                reason: "must match WEIGHTS_CONTRACT_VERSION",
            });
        }
        self.version_id.validate()?;
        self.weights.validate()?;
        validate_sha256_hex(
            "weight_version_record.content_hash_sha256",
            &self.content_hash_sha256,
        )?;
        validate_token("weight_version_record.created_by", &self.created_by, 96)?;
        if self.created_at.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "weight_version_record.created_at",
                reason: "must be > 0",
            });
        }
        validate_text_ascii("weight_version_record.comment", &self.comment, 256)?;
        Ok(())
    }
}

pub fn validate_sha256_hex(field: &'static str, value: &str) -> Result<(), ContractViolation> {
    if value.len() != 64 || !value.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "must be a 64-char hex value",
        });
    }
    Ok(())
}
