#![forbid(unsafe_code)]

pub mod experiment_cli;
