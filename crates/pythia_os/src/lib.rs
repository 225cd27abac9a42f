#![forbid(unsafe_code)]

pub mod explain;
pub mod match_worker;
pub mod recommendation;
pub mod runtime_config;
pub mod signals;
pub mod version_store;
