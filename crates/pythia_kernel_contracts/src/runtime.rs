#![forbid(unsafe_code)]

use crate::weights::WeightsVersionId;
use crate::{ContractViolation, MonotonicTimeNs, SchemaVersion, Validate};

pub const RUNTIME_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

/// The singleton runtime-config row. Effective version resolution is
/// override-if-present-else-active; all live scoring reads the effective
/// version, never the active pointer directly.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfigRecord {
    pub schema_version: SchemaVersion,
    pub active_version: WeightsVersionId,
    pub override_version: Option<WeightsVersionId>,
    pub freeze: bool,
    pub updated_at: MonotonicTimeNs,
}

impl RuntimeConfigRecord {
    pub fn v1(
        active_version: WeightsVersionId,
        override_version: Option<WeightsVersionId>,
        freeze: bool,
        updated_at: MonotonicTimeNs,
    ) -> Result<Self, ContractViolation> {
        let r = Self {
            schema_version: RUNTIME_CONTRACT_VERSION,
            active_version,
            override_version,
            freeze,
            updated_at,
        };
        r.validate()?;
        Ok(r)
    }

    pub fn effective_version(&self) -> &WeightsVersionId {
        self.override_version.as_ref().unwrap_or(&self.active_version)
    }
}

impl Validate for RuntimeConfigRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != RUNTIME_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "runtime_config_record.schema_version",
                reason: "must match RUNTIME_CONTRACT_VERSION",
            });
        }
        self.active_version.validate()?;
        if let Some(override_version) = &self.override_version {
            override_version.validate()?;
        }
        if self.updated_at.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "runtime_config_record.updated_at",
                reason: "must be > 0",
            });
        }
        Ok(())
    }
}
