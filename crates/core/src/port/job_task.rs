// Job Task Port
// The unit of work the job manager schedules

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

use crate::domain::{Job, JobId, JobKind};
use crate::error::Result;
use crate::port::progress::{ProgressEvent, ProgressListener};

/// What the manager hands to a running task
#[derive(Clone)]
pub struct JobContext {
    pub job_id: JobId,
    /// Snapshots of the prerequisite records, all terminal
    pub prerequisites: Vec<Job>,
    pub progress: Arc<dyn ProgressListener>,
}

impl JobContext {
    pub fn prerequisite(&self, id: &str) -> Option<&Job> {
        self.prerequisites.iter().find(|job| job.id == id)
    }

    /// Report one finished unit of work
    pub fn unit_completed(&self) {
        self.progress.on_event(ProgressEvent::UnitCompleted {
            job_id: self.job_id.clone(),
        });
    }
}

/// Job task trait
///
/// Implementations: IdentificationJob, ScoreJob, SpecSimJob. The manager
/// dispatches through this trait only.
#[async_trait]
pub trait JobTask: Send + Sync {
    fn kind(&self) -> JobKind;

    fn description(&self) -> String;

    /// Jobs that must be terminal before this one starts
    fn prerequisites(&self) -> Vec<JobId> {
        Vec::new()
    }

    /// Run the task. `Ok(Some(path))` names the file produced.
    async fn execute(&self, ctx: &JobContext) -> Result<Option<PathBuf>>;
}
