#![forbid(unsafe_code)]

pub mod assoc;
pub mod config;
pub mod error;
pub mod outcome;
pub mod participant;
pub mod recog;
pub mod sampler;
pub mod trialseq;

pub use config::ScheduleConfig;
pub use error::SchedulingError;
