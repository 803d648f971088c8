// Port Layer - Interfaces for external dependencies

pub mod candidate_source;
pub mod id_provider; // For deterministic testing
pub mod job_task;
pub mod process_runner;
pub mod progress;
pub mod result_store;
pub mod time_provider;

// Re-exports
pub use candidate_source::CandidateSource;
pub use id_provider::IdProvider;
pub use job_task::{JobContext, JobTask};
pub use process_runner::{ExecutionError, ExecutionResult, ExecutionStatus, ProcessRunner};
pub use progress::{ChannelProgress, NoopProgress, ProgressEvent, ProgressListener};
pub use result_store::{ResultStore, SearchRunResult, StorageHandle};
pub use time_provider::TimeProvider;
