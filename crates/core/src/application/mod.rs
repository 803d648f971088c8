// Application Layer - Use Cases and Business Logic

pub mod constants;
pub mod job_manager;
pub mod search;
pub mod specsim;
pub mod spectrum_storage;

// Re-exports
pub use job_manager::{BatchReport, JobManager};
pub use search::{IdentificationJob, ScoreInput, ScoreJob, SearchResources, SearchTask, SubmittedSearch};
pub use specsim::SpecSimJob;
pub use spectrum_storage::{SpectrumStorage, StorageBarrier, StorageStatus};
