// Progress Port
// Observer interface for job lifecycle and per-unit progress

use tokio::sync::mpsc;

use crate::domain::{JobId, JobState};

/// Event emitted by the job manager and by running jobs
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    JobStarted { job_id: JobId, description: String },
    JobFinished { job_id: JobId, state: JobState },
    /// One unit of work inside a job (e.g. one query spectrum scored)
    UnitCompleted { job_id: JobId },
    BatchFinished { completed: usize, failed: usize },
}

/// Progress listener
///
/// Called synchronously from the drain loop; implementations must not block.
pub trait ProgressListener: Send + Sync {
    fn on_event(&self, event: ProgressEvent);
}

/// Discards every event
pub struct NoopProgress;

impl ProgressListener for NoopProgress {
    fn on_event(&self, _event: ProgressEvent) {}
}

/// Forwards events to an unbounded channel (UI or log consumer)
pub struct ChannelProgress {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelProgress {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressListener for ChannelProgress {
    fn on_event(&self, event: ProgressEvent) {
        // Receiver gone means nobody is watching
        let _ = self.tx.send(event);
    }
}

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// Records every event in order
    #[derive(Default)]
    pub struct RecordingProgress {
        events: Mutex<Vec<ProgressEvent>>,
    }

    impl RecordingProgress {
        pub fn events(&self) -> Vec<ProgressEvent> {
            self.events.lock().unwrap().clone()
        }

        pub fn units_for(&self, job_id: &str) -> usize {
            self.events()
                .iter()
                .filter(|e| matches!(e, ProgressEvent::UnitCompleted { job_id: id } if id == job_id))
                .count()
        }
    }

    impl ProgressListener for RecordingProgress {
        fn on_event(&self, event: ProgressEvent) {
            self.events.lock().unwrap().push(event);
        }
    }
}
