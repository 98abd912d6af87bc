#![forbid(unsafe_code)]

pub mod audit;
pub mod common;
pub mod document;
pub mod identity;
pub mod mark;
pub mod token;

pub use common::{ContractViolation, MonotonicTimeNs, ReasonCodeId, SchemaVersion, Validate};
