#![forbid(unsafe_code)]

pub mod common;
pub mod explain;
pub mod matchrun;
pub mod mlgate;
pub mod recommendation;
pub mod runtime;
pub mod signals;
pub mod weights;

pub use common::{
    ContractViolation, InvestorId, MonotonicTimeNs, ReasonCodeId, SchemaVersion, StartupId,
    Validate,
};
