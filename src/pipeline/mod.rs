pub mod merge;
pub mod orchestrator;
pub mod parallel;
pub mod reader;

pub use merge::{MergeOutcome, MergeStats, merge_periods};
pub use orchestrator::{Operation, Pipeline, RunReport, Upload};
pub use reader::{BatchJob, read_jobs};
