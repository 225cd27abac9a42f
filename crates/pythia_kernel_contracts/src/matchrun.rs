#![forbid(unsafe_code)]

use crate::common::{validate_text_ascii, validate_token};
use crate::explain::ComponentScores;
use crate::{ContractViolation, InvestorId, MonotonicTimeNs, SchemaVersion, StartupId, Validate};

pub const MATCHRUN_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

/// Top-K bound on persisted match counts. A stored count of exactly this value
/// means "this many or more"; the true count beyond K is never computed.
pub const MATCH_COUNT_CAP: u16 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MatchRunId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WorkerId(String);

impl WorkerId {
    pub fn new(id: impl Into<String>) -> Result<Self, ContractViolation> {
        let v = Self(id.into());
        v.validate()?;
        Ok(v)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for WorkerId {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_token("worker_id", &self.0, 96)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchRunStatus {
    Queued,
    Claimed,
    Ready,
    Error,
}

impl MatchRunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchRunStatus::Queued => "QUEUED",
            MatchRunStatus::Claimed => "CLAIMED",
            MatchRunStatus::Ready => "READY",
            MatchRunStatus::Error => "ERROR",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchRunErrorCode {
    Timeout,
    ConfigUnavailable,
    ScoringFailed,
}

impl MatchRunErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchRunErrorCode::Timeout => "TIMEOUT",
            MatchRunErrorCode::ConfigUnavailable => "CONFIG_UNAVAILABLE",
            MatchRunErrorCode::ScoringFailed => "SCORING_FAILED",
        }
    }
}

/// One job of the match-run queue with its lease fields.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchRunRecord {
    pub schema_version: SchemaVersion,
    pub run_id: MatchRunId,
    pub startup_id: StartupId,
    pub status: MatchRunStatus,
    pub worker_id: Option<WorkerId>,
    pub requested_at: MonotonicTimeNs,
    pub claimed_at: Option<MonotonicTimeNs>,
    pub completed_at: Option<MonotonicTimeNs>,
    pub match_count: Option<u16>,
    pub error_code: Option<MatchRunErrorCode>,
    pub error_message: Option<String>,
}

impl MatchRunRecord {
    pub fn v1_queued(
        run_id: MatchRunId,
        startup_id: StartupId,
        requested_at: MonotonicTimeNs,
    ) -> Result<Self, ContractViolation> {
        let r = Self {
            schema_version: MATCHRUN_CONTRACT_VERSION,
            run_id,
            startup_id,
            status: MatchRunStatus::Queued,
            worker_id: None,
            requested_at,
            claimed_at: None,
            completed_at: None,
            match_count: None,
            error_code: None,
            error_message: None,
        };
        r.validate()?;
        Ok(r)
    }
}

impl Validate for MatchRunRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != MATCHRUN_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "match_run_record.schema_version",
                reason: "must match MATCHRUN_CONTRACT_VERSION",
            });
        }
        self.startup_id.validate()?;
        if let Some(worker_id) = &self.worker_id {
            worker_id.validate()?;
        }
        if self.requested_at.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "match_run_record.requested_at",
                reason: "must be > 0",
            });
        }
        if let Some(count) = self.match_count {
            if count > MATCH_COUNT_CAP {
                return Err(ContractViolation::InvalidValue {
                    field: "match_run_record.match_count",
                    reason: "must be <= MATCH_COUNT_CAP",
                });
            }
        }
        match self.status {
            MatchRunStatus::Queued => {
                if self.worker_id.is_some()
                    || self.claimed_at.is_some()
                    || self.completed_at.is_some()
                    || self.match_count.is_some()
                    || self.error_code.is_some()
                {
                    return Err(ContractViolation::InvalidValue {
                        field: "match_run_record.status",
                        reason: "queued row must carry no lease or completion fields",
                    });
                }
            }
            MatchRunStatus::Claimed => {
                if self.worker_id.is_none() || self.claimed_at.is_none() {
                    return Err(ContractViolation::InvalidValue {
                        field: "match_run_record.worker_id",
                        reason: "claimed row requires worker_id and claimed_at",
                    });
                }
                if self.completed_at.is_some() || self.match_count.is_some() {
                    return Err(ContractViolation::InvalidValue {
                        field: "match_run_record.completed_at",
                        reason: "claimed row must not carry completion fields",
                    });
                }
            }
            MatchRunStatus::Ready => {
                if self.worker_id.is_none()
                    || self.claimed_at.is_none()
                    || self.completed_at.is_none()
                    || self.match_count.is_none()
                {
                    return Err(ContractViolation::InvalidValue {
                        field: "match_run_record.match_count",
                        reason: "ready row requires lease fields, completed_at and match_count",
                    });
                }
                if self.error_code.is_some() || self.error_message.is_some() {
                    return Err(ContractViolation::InvalidValue {
                        field: "match_run_record.error_code",
                        reason: "ready row must not carry error fields",
                    });
                }
            }
            MatchRunStatus::Error => {
                if self.worker_id.is_none()
                    || self.claimed_at.is_none()
                    || self.completed_at.is_none()
                    || self.error_code.is_none()
                {
                    return Err(ContractViolation::InvalidValue {
                        field: "match_run_record.error_code",
                        reason: "error row requires lease fields, completed_at and error_code",
                    });
                }
            }
        }
        if let Some(message) = &self.error_message {
            validate_text_ascii("match_run_record.error_message", message, 256)?;
        }
        Ok(())
    }
}

/// Candidate row consumed by ranking: an investor's per-component fit with the
/// requesting startup, already on the [0,100] scale.
#[derive(Debug, Clone, PartialEq)]
pub struct InvestorCandidate {
    pub investor_id: InvestorId,
    pub fit: ComponentScores,
}

impl Validate for InvestorCandidate {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.investor_id.validate()?;
        self.fit.validate()?;
        Ok(())
    }
}

/// One ranked match row returned by the top-K query.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchRow {
    pub investor_id: InvestorId,
    pub score: f64,
}
