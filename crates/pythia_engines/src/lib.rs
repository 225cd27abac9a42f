#![forbid(unsafe_code)]

pub mod matchrank;
pub mod mlgate;
pub mod signals;
