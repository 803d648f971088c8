// Panic isolation for the drain loop
use tokio::task::JoinError;
use tracing::error;

/// Render a failed job task join as a message for the job's error slot
///
/// A panicking job must not take the manager down; the drain loop runs every
/// task on its own tokio task and turns the join error into a failure.
pub(super) fn join_failure_message(job_id: &str, err: JoinError) -> String {
    if err.is_cancelled() {
        error!(job_id = %job_id, "Job task cancelled");
        return "job task cancelled".to_string();
    }
    match err.try_into_panic() {
        Ok(payload) => {
            let panic_msg = if let Some(s) = payload.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = payload.downcast_ref::<String>() {
                s.clone()
            } else {
                "Unknown panic".to_string()
            };
            error!(job_id = %job_id, panic_msg = %panic_msg, "Job task panicked");
            format!("job panicked: {}", panic_msg)
        }
        Err(err) => err.to_string(),
    }
}
