pub mod jobs;

pub use jobs::{BatchOutcome, JobContext, Scheduler};
