pub mod discovery;
pub mod handle;
pub mod inspector;
pub mod jobs;
pub mod memory;
pub mod stats;

pub use discovery::QueueRegistry;
pub use handle::{JobState, QueueHandle};
pub use inspector::{KeyInspector, KeyListing, KeyRecord};
pub use jobs::{list_jobs, JobSummary, DEFAULT_JOB_PAGE, MAX_JOB_PAGE};
pub use memory::{format_size, MemoryUsage};
pub use stats::{QueueStatistics, StatsAggregator};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QueueError {
    #[error("Invalid queue name '{0}'")]
    InvalidName(String),

    #[error("Invalid status '{0}'. Expected one of: waiting, active, completed, failed, delayed")]
    UnknownState(String),
}
