// Job Domain Model

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::domain::error::{DomainError, Result};

/// Job ID (UUID v4 in production, sequential in tests)
pub type JobId = String;

/// Job State
///
/// `Queued -> Running -> {Completed, Failed}`. A queued job may also be failed
/// directly when the manager refuses to start it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Queued => write!(f, "QUEUED"),
            JobState::Running => write!(f, "RUNNING"),
            JobState::Completed => write!(f, "COMPLETED"),
            JobState::Failed => write!(f, "FAILED"),
        }
    }
}

/// What a job does. Used for logging and reporting only; dispatch goes
/// through the `JobTask` trait.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobKind {
    Identification,
    Score,
    SpectralSimilarity,
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobKind::Identification => write!(f, "IDENTIFICATION"),
            JobKind::Score => write!(f, "SCORE"),
            JobKind::SpectralSimilarity => write!(f, "SPECTRAL_SIMILARITY"),
        }
    }
}

/// Failure captured on a job record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobError {
    pub category: String,
    pub message: String,
}

impl std::fmt::Display for JobError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.category, self.message)
    }
}

/// Job Entity
///
/// The record the manager keeps for every job it has seen. The work itself
/// lives in a `JobTask`; this struct only carries identity and lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub kind: JobKind,
    pub description: String,
    pub state: JobState,

    pub created_at: i64, // epoch ms
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,

    /// Jobs that must be terminal before this one may start
    pub prerequisites: Vec<JobId>,

    /// File produced by the job, set on completion
    pub output: Option<PathBuf>,
    pub error: Option<JobError>,
}

impl Job {
    /// Create a new Job
    ///
    /// # Arguments
    ///
    /// * `id` - Unique job ID (injected, not generated)
    /// * `created_at` - Creation timestamp in epoch ms (injected, not system time)
    /// * `kind` - Job kind
    /// * `description` - Human-readable description
    pub fn new(
        id: impl Into<String>,
        created_at: i64,
        kind: JobKind,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            description: description.into(),
            state: JobState::Queued,
            created_at,
            started_at: None,
            finished_at: None,
            prerequisites: Vec::new(),
            output: None,
            error: None,
        }
    }

    pub fn with_prerequisites(mut self, prerequisites: Vec<JobId>) -> Self {
        self.prerequisites = prerequisites;
        self
    }

    /// Transition to Running state with explicit timestamp
    pub fn start(&mut self, now_millis: i64) -> Result<()> {
        if self.state != JobState::Queued {
            return Err(DomainError::InvalidStateTransition {
                from: self.state.to_string(),
                to: JobState::Running.to_string(),
            });
        }
        self.state = JobState::Running;
        self.started_at = Some(now_millis);
        Ok(())
    }

    /// Transition to Completed state with explicit timestamp
    pub fn complete(&mut self, now_millis: i64, output: Option<PathBuf>) -> Result<()> {
        if self.state != JobState::Running {
            return Err(DomainError::InvalidStateTransition {
                from: self.state.to_string(),
                to: JobState::Completed.to_string(),
            });
        }
        self.state = JobState::Completed;
        self.finished_at = Some(now_millis);
        self.output = output;
        Ok(())
    }

    /// Mark as Failed with explicit timestamp
    pub fn fail(&mut self, now_millis: i64, error: JobError) -> Result<()> {
        if self.state.is_terminal() {
            return Err(DomainError::InvalidStateTransition {
                from: self.state.to_string(),
                to: JobState::Failed.to_string(),
            });
        }
        self.state = JobState::Failed;
        self.finished_at = Some(now_millis);
        self.error = Some(error);
        Ok(())
    }

    /// Output of a completed job
    pub fn completed_output(&self) -> Option<&PathBuf> {
        match self.state {
            JobState::Completed => self.output.as_ref(),
            _ => None,
        }
    }
}
