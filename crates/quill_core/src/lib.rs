#![forbid(unsafe_code)]

pub mod audit_trail;
pub mod config;
pub mod error;
pub mod finalize;
pub mod lifecycle;
pub mod marks;
pub mod ops;
pub mod stamp;
