#![forbid(unsafe_code)]

pub mod captoken;
pub mod geometry;
