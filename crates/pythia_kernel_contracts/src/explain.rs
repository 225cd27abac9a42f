#![forbid(unsafe_code)]

use crate::common::{validate_range, validate_text_ascii, validate_token};
use crate::signals::{SignalDimension, SIGNALS_BONUS_CAP};
use crate::weights::WeightsVersionId;
use crate::{ContractViolation, MonotonicTimeNs, SchemaVersion, StartupId, Validate};

pub const EXPLAIN_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

/// Rounding slack on the `total - base <= 10` invariant. Anything beyond this
/// is a scoring bug, not round-off.
pub const EXPLAIN_ROUNDING_EPSILON: f64 = 1e-4;

/// Per-component fundamentals scores, each on the [0,100] scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComponentScores {
    pub team: f64,
    pub traction: f64,
    pub market: f64,
    pub product: f64,
    pub moat: f64,
}

impl ComponentScores {
    pub fn v1(
        team: f64,
        traction: f64,
        market: f64,
        product: f64,
        moat: f64,
    ) -> Result<Self, ContractViolation> {
        let s = Self {
            team,
            traction,
            market,
            product,
            moat,
        };
        s.validate()?;
        Ok(s)
    }

    pub fn as_array(&self) -> [f64; 5] {
        [self.team, self.traction, self.market, self.product, self.moat]
    }
}

impl Validate for ComponentScores {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_range("component_scores.team", self.team, 0.0, 100.0)?;
        validate_range("component_scores.traction", self.traction, 0.0, 100.0)?;
        validate_range("component_scores.market", self.market, 0.0, 100.0)?;
        validate_range("component_scores.product", self.product, 0.0, 100.0)?;
        validate_range("component_scores.moat", self.moat, 0.0, 100.0)?;
        Ok(())
    }
}

/// One entry of the top-signal-contribution breakdown shown to founders.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalContribution {
    pub dimension: SignalDimension,
    pub points: f64,
}

impl Validate for SignalContribution {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_range(
            "signal_contribution.points",
            self.points,
            0.0,
            SIGNALS_BONUS_CAP,
        )?;
        Ok(())
    }
}

/// Typed debug payload entry. The debug surface is a bounded key/value list,
/// never an untyped map flowing through core logic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplainDebugEntry {
    pub key: String,
    pub value: String,
}

impl Validate for ExplainDebugEntry {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_token("explain_debug_entry.key", &self.key, 48)?;
        validate_text_ascii("explain_debug_entry.value", &self.value, 256)?;
        Ok(())
    }
}

/// Auditable score breakdown for one (startup, weights version) pair.
/// Upserted on every recompute; never deleted.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreExplanationRecord {
    pub schema_version: SchemaVersion,
    pub startup_id: StartupId,
    pub weights_version: WeightsVersionId,
    pub base_total_score: f64,
    pub signals_bonus: f64,
    pub total_score: f64,
    pub component_scores: ComponentScores,
    pub top_signal_contributions: Vec<SignalContribution>,
    pub debug: Vec<ExplainDebugEntry>,
    pub computed_at: MonotonicTimeNs,
}

impl ScoreExplanationRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn v1(
        startup_id: StartupId,
        weights_version: WeightsVersionId,
        base_total_score: f64,
        signals_bonus: f64,
        total_score: f64,
        component_scores: ComponentScores,
        top_signal_contributions: Vec<SignalContribution>,
        debug: Vec<ExplainDebugEntry>,
        computed_at: MonotonicTimeNs,
    ) -> Result<Self, ContractViolation> {
        let r = Self {
            schema_version: EXPLAIN_CONTRACT_VERSION,
            startup_id,
            weights_version,
            base_total_score,
            signals_bonus,
            total_score,
            component_scores,
            top_signal_contributions,
            debug,
            computed_at,
        };
        r.validate()?;
        Ok(r)
    }
}

impl Validate for ScoreExplanationRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != EXPLAIN_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "score_explanation_record.schema_version",
                reason: "must match EXPLAIN_CONTRACT_VERSION",
            });
        }
        self.startup_id.validate()?;
        self.weights_version.validate()?;
        validate_range(
            "score_explanation_record.base_total_score",
            self.base_total_score,
            0.0,
            100.0,
        )?;
        validate_range(
            "score_explanation_record.signals_bonus",
            self.signals_bonus,
            0.0,
            SIGNALS_BONUS_CAP,
        )?;
        validate_range(
            "score_explanation_record.total_score",
            self.total_score,
            0.0,
            100.0,
        )?;
        if self.total_score - self.base_total_score > SIGNALS_BONUS_CAP + EXPLAIN_ROUNDING_EPSILON
        {
            return Err(ContractViolation::InvalidRange {
                field: "score_explanation_record.total_minus_base",
                min: 0.0,
                max: SIGNALS_BONUS_CAP + EXPLAIN_ROUNDING_EPSILON,
                got: self.total_score - self.base_total_score,
            });
        }
        self.component_scores.validate()?;
        if self.top_signal_contributions.len() > SignalDimension::ALL.len() {
            return Err(ContractViolation::InvalidValue {
                field: "score_explanation_record.top_signal_contributions",
                reason: "must contain at most one entry per dimension",
            });
        }
        for contribution in &self.top_signal_contributions {
            contribution.validate()?;
        }
        if self.debug.len() > 16 {
            return Err(ContractViolation::InvalidValue {
                field: "score_explanation_record.debug",
                reason: "must contain <= 16 entries",
            });
        }
        for entry in &self.debug {
            entry.validate()?;
        }
        if self.computed_at.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "score_explanation_record.computed_at",
                reason: "must be > 0",
            });
        }
        Ok(())
    }
}
