#![forbid(unsafe_code)]

pub mod export;
pub mod schedule;

pub use export::{ExportWiring, ExportWiringConfig};
pub use schedule::{build_schedule, build_schedule_with_candidates, ScheduleResult};
