#![forbid(unsafe_code)]

use crate::common::validate_unit_interval;
use crate::{ContractViolation, MonotonicTimeNs, SchemaVersion, StartupId, Validate};

pub const SIGNALS_CONTRACT_VERSION_SCHEMA: SchemaVersion = SchemaVersion(1);

/// A dimension must move at least this much, relative to its stored value,
/// before the tracker persists anything. Founders see a stable number that
/// moves only on durable shifts, not sampling noise.
pub const SIGNIFICANT_RELATIVE_CHANGE: f64 = 0.5;

pub const SIGNALS_BONUS_CAP: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SignalDimension {
    FounderMomentum,
    MarketPsychology,
    NarrativeFit,
    CapitalConvergence,
    Timing,
}

impl SignalDimension {
    pub const ALL: [SignalDimension; 5] = [
        SignalDimension::FounderMomentum,
        SignalDimension::MarketPsychology,
        SignalDimension::NarrativeFit,
        SignalDimension::CapitalConvergence,
        SignalDimension::Timing,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SignalDimension::FounderMomentum => "FOUNDER_MOMENTUM",
            SignalDimension::MarketPsychology => "MARKET_PSYCHOLOGY",
            SignalDimension::NarrativeFit => "NARRATIVE_FIT",
            SignalDimension::CapitalConvergence => "CAPITAL_CONVERGENCE",
            SignalDimension::Timing => "TIMING",
        }
    }
}

/// Normalized observation values for the five signal dimensions, each in [0,1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalDimensions {
    pub founder_momentum: f64,
    pub market_psychology: f64,
    pub narrative_fit: f64,
    pub capital_convergence: f64,
    pub timing: f64,
}

impl SignalDimensions {
    pub fn v1(
        founder_momentum: f64,
        market_psychology: f64,
        narrative_fit: f64,
        capital_convergence: f64,
        timing: f64,
    ) -> Result<Self, ContractViolation> {
        let d = Self {
            founder_momentum,
            market_psychology,
            narrative_fit,
            capital_convergence,
            timing,
        };
        d.validate()?;
        Ok(d)
    }

    pub fn get(&self, dimension: SignalDimension) -> f64 {
        match dimension {
            SignalDimension::FounderMomentum => self.founder_momentum,
            SignalDimension::MarketPsychology => self.market_psychology,
            SignalDimension::NarrativeFit => self.narrative_fit,
            SignalDimension::CapitalConvergence => self.capital_convergence,
            SignalDimension::Timing => self.timing,
        }
    }
}

impl Validate for SignalDimensions {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_unit_interval("signal_dimensions.founder_momentum", self.founder_momentum)?;
        validate_unit_interval(
            "signal_dimensions.market_psychology",
            self.market_psychology,
        )?;
        validate_unit_interval("signal_dimensions.narrative_fit", self.narrative_fit)?;
        validate_unit_interval(
            "signal_dimensions.capital_convergence",
            self.capital_convergence,
        )?;
        validate_unit_interval("signal_dimensions.timing", self.timing)?;
        Ok(())
    }
}

/// Per-startup signal state. Mutated only through the stability tracker.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalStateRecord {
    pub schema_version: SchemaVersion,
    pub startup_id: StartupId,
    pub dimensions: SignalDimensions,
    pub signals_bonus: f64,
    pub last_significant_change_at: MonotonicTimeNs,
}

impl SignalStateRecord {
    pub fn v1(
        startup_id: StartupId,
        dimensions: SignalDimensions,
        signals_bonus: f64,
        last_significant_change_at: MonotonicTimeNs,
    ) -> Result<Self, ContractViolation> {
        let r = Self {
            schema_version: SIGNALS_CONTRACT_VERSION_SCHEMA,
            startup_id,
            dimensions,
            signals_bonus,
            last_significant_change_at,
        };
        r.validate()?;
        Ok(r)
    }
}

impl Validate for SignalStateRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != SIGNALS_CONTRACT_VERSION_SCHEMA {
            return Err(ContractViolation::InvalidValue {
                field: "signal_state_record.schema_version",
                reason: "must match SIGNALS_CONTRACT_VERSION_SCHEMA",
            });
        }
        self.startup_id.validate()?;
        self.dimensions.validate()?;
        if !self.signals_bonus.is_finite() {
            return Err(ContractViolation::NotFinite {
                field: "signal_state_record.signals_bonus",
            });
        }
        if !(0.0..=SIGNALS_BONUS_CAP).contains(&self.signals_bonus) {
            return Err(ContractViolation::InvalidRange {
                field: "signal_state_record.signals_bonus",
                min: 0.0,
                max: SIGNALS_BONUS_CAP,
                got: self.signals_bonus,
            });
        }
        if self.last_significant_change_at.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "signal_state_record.last_significant_change_at",
                reason: "must be > 0",
            });
        }
        Ok(())
    }
}
