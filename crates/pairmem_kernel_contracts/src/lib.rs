#![forbid(unsafe_code)]

pub mod catalog;
pub mod common;
pub mod outcome;
pub mod schedule;

pub use common::{ContractViolation, SchemaVersion, Validate};
