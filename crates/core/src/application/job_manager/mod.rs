// Job Manager - FIFO drain loop

mod panic_guard;

use panic_guard::join_failure_message;

use crate::domain::{Job, JobError, JobId, JobState};
use crate::error::{AppError, Result};
use crate::port::id_provider::UuidProvider;
use crate::port::time_provider::SystemTimeProvider;
use crate::port::{
    IdProvider, JobContext, JobTask, NoopProgress, ProgressEvent, ProgressListener, TimeProvider,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Outcome of one `execute` call, in execution order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub completed: Vec<JobId>,
    pub failed: Vec<(JobId, JobError)>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.completed.len() + self.failed.len()
    }
}

struct QueuedJob {
    id: JobId,
    task: Arc<dyn JobTask>,
}

#[derive(Default)]
struct ManagerState {
    queue: VecDeque<QueuedJob>,
    records: HashMap<JobId, Job>,
}

/// Owns the job queue and every job record
///
/// Jobs run strictly one after another in enqueue order. The queue lives
/// behind a mutex that is only held for pushes, pops and record updates, never
/// across an `.await`, so producers may enqueue while a drain is running.
pub struct JobManager {
    state: Mutex<ManagerState>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
    progress: Arc<dyn ProgressListener>,
}

impl JobManager {
    pub fn new(
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
        progress: Arc<dyn ProgressListener>,
    ) -> Self {
        Self {
            state: Mutex::new(ManagerState::default()),
            id_provider,
            time_provider,
            progress,
        }
    }

    /// UUID ids, wall clock, no progress listener
    pub fn with_defaults() -> Self {
        Self::new(
            Arc::new(UuidProvider),
            Arc::new(SystemTimeProvider),
            Arc::new(NoopProgress),
        )
    }

    fn lock(&self) -> MutexGuard<'_, ManagerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a job to the tail of the queue
    pub fn add_job(&self, task: Arc<dyn JobTask>) -> JobId {
        let id = self.id_provider.generate_id();
        let now = self.time_provider.now_millis();
        let record = Job::new(id.clone(), now, task.kind(), task.description())
            .with_prerequisites(task.prerequisites());

        info!(
            job_id = %id,
            kind = %record.kind,
            description = %record.description,
            "Job enqueued"
        );

        let mut state = self.lock();
        state.records.insert(id.clone(), record);
        state.queue.push_back(QueuedJob {
            id: id.clone(),
            task,
        });
        id
    }

    /// Remove a job that has not started yet. Returns false when the job is
    /// unknown or already left the queue.
    pub fn delete_job(&self, id: &str) -> bool {
        let mut state = self.lock();
        let Some(pos) = state.queue.iter().position(|q| q.id == id) else {
            return false;
        };
        state.queue.remove(pos);
        state.records.remove(id);
        debug!(job_id = %id, "Job deleted");
        true
    }

    /// Drop every queued job; returns how many were removed
    pub fn clear(&self) -> usize {
        let mut state = self.lock();
        let removed: Vec<QueuedJob> = state.queue.drain(..).collect();
        for queued in &removed {
            state.records.remove(&queued.id);
        }
        removed.len()
    }

    /// Records of the queued jobs, in execution order
    pub fn pending(&self) -> Vec<Job> {
        let state = self.lock();
        state
            .queue
            .iter()
            .filter_map(|q| state.records.get(&q.id).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().queue.is_empty()
    }

    /// Record of any job this manager has seen
    pub fn job(&self, id: &str) -> Option<Job> {
        self.lock().records.get(id).cloned()
    }

    /// Drop the records of finished jobs; returns how many were removed
    ///
    /// Records still named as a prerequisite by a queued job are kept.
    pub fn forget_finished(&self) -> usize {
        let mut state = self.lock();
        let needed: HashSet<JobId> = state
            .queue
            .iter()
            .filter_map(|queued| state.records.get(&queued.id))
            .flat_map(|job| job.prerequisites.iter().cloned())
            .collect();

        let before = state.records.len();
        state
            .records
            .retain(|id, job| !job.state.is_terminal() || needed.contains(id));
        let removed = before - state.records.len();
        debug!(removed, "Finished job records dropped");
        removed
    }

    /// Drain the queue
    ///
    /// A failing job is recorded as FAILED and the drain moves on; the
    /// manager itself never fails. Jobs enqueued during the drain are run by
    /// this same call.
    pub async fn execute(&self) -> BatchReport {
        let mut report = BatchReport::default();

        while let Some(queued) = self.pop_front() {
            let id = queued.id.clone();
            match self.run_job(queued).await {
                Ok(()) => report.completed.push(id),
                Err(error) => report.failed.push((id, error)),
            }
        }

        info!(
            completed = report.completed.len(),
            failed = report.failed.len(),
            "Batch finished"
        );
        self.progress.on_event(ProgressEvent::BatchFinished {
            completed: report.completed.len(),
            failed: report.failed.len(),
        });
        report
    }

    fn pop_front(&self) -> Option<QueuedJob> {
        self.lock().queue.pop_front()
    }

    /// Run one job to a terminal state
    async fn run_job(&self, queued: QueuedJob) -> std::result::Result<(), JobError> {
        let QueuedJob { id, task } = queued;

        let prerequisites = match self.terminal_prerequisites(&id) {
            Ok(prerequisites) => prerequisites,
            Err(e) => {
                warn!(job_id = %id, error = %e, "Job refused");
                return self.finish(&id, Err(e));
            }
        };

        let started = self.update_record(&id, |job, now| job.start(now));
        match started {
            Ok(job) => {
                info!(job_id = %id, description = %job.description, "Job started");
                self.progress.on_event(ProgressEvent::JobStarted {
                    job_id: id.clone(),
                    description: job.description,
                });
            }
            Err(e) => return self.finish(&id, Err(e)),
        }

        let ctx = JobContext {
            job_id: id.clone(),
            prerequisites,
            progress: Arc::clone(&self.progress),
        };

        // Own tokio task so a panicking job cannot take the drain loop down
        let handle = tokio::task::spawn(async move { task.execute(&ctx).await });

        let outcome = match handle.await {
            Ok(result) => result,
            Err(join_err) => Err(AppError::Internal(join_failure_message(&id, join_err))),
        };
        self.finish(&id, outcome)
    }

    /// Snapshots of the job's prerequisites, all of which must be terminal
    fn terminal_prerequisites(&self, id: &str) -> Result<Vec<Job>> {
        let state = self.lock();
        let record = state
            .records
            .get(id)
            .ok_or_else(|| AppError::Internal(format!("no record for job {}", id)))?;

        let mut prerequisites = Vec::with_capacity(record.prerequisites.len());
        for prerequisite_id in &record.prerequisites {
            match state.records.get(prerequisite_id) {
                Some(job) if job.state.is_terminal() => prerequisites.push(job.clone()),
                Some(job) => {
                    return Err(AppError::PrerequisiteNotReady(format!(
                        "job {} is {}",
                        prerequisite_id, job.state
                    )))
                }
                None => {
                    return Err(AppError::PrerequisiteNotReady(format!(
                        "job {} is unknown",
                        prerequisite_id
                    )))
                }
            }
        }
        Ok(prerequisites)
    }

    /// Record the outcome on the job and notify listeners
    fn finish(
        &self,
        id: &str,
        outcome: Result<Option<PathBuf>>,
    ) -> std::result::Result<(), JobError> {
        let recorded = match outcome {
            Ok(output) => self
                .update_record(id, |job, now| job.complete(now, output))
                .map(|job| {
                    info!(
                        job_id = %id,
                        duration_ms = job.finished_at.unwrap_or_default()
                            - job.started_at.unwrap_or_default(),
                        "Job completed"
                    );
                    Ok(())
                }),
            Err(e) => {
                warn!(job_id = %id, category = e.category(), error = %e, "Job failed");
                let error = e.to_job_error();
                self.update_record(id, |job, now| job.fail(now, error.clone()))
                    .map(|_| Err(error))
            }
        };

        let result = recorded.unwrap_or_else(|e| {
            warn!(job_id = %id, error = %e, "Could not record job outcome");
            Err(e.to_job_error())
        });

        self.progress.on_event(ProgressEvent::JobFinished {
            job_id: id.to_string(),
            state: if result.is_ok() {
                JobState::Completed
            } else {
                JobState::Failed
            },
        });
        result
    }

    fn update_record<F>(&self, id: &str, f: F) -> Result<Job>
    where
        F: FnOnce(&mut Job, i64) -> crate::domain::error::Result<()>,
    {
        let now = self.time_provider.now_millis();
        let mut state = self.lock();
        let job = state
            .records
            .get_mut(id)
            .ok_or_else(|| AppError::Internal(format!("no record for job {}", id)))?;
        f(job, now)?;
        Ok(job.clone())
    }
}
