// Subprocess runner for external identification engines
// reason: async-trait, tokio for async process management
use async_trait::async_trait;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{info, warn};

use mpa_core::domain::EngineCommand;
use mpa_core::port::process_runner::{
    ExecutionError, ExecutionResult, ExecutionStatus, ProcessRunner,
};
use mpa_core::port::TimeProvider;

/// Spawns engine executables with an allowlisted environment
pub struct SubprocessRunner {
    time_provider: Arc<dyn TimeProvider>,
    env_allowlist: Vec<String>,
    timeout_ms: Option<i64>,
}

impl SubprocessRunner {
    /// Create a new subprocess runner
    ///
    /// # Arguments
    /// * `time_provider` - Time provider for duration tracking
    /// * `env_allowlist` - Parent environment variables passed to the engine;
    ///   everything else is cleared
    ///
    /// # Example
    /// ```ignore
    /// let runner = SubprocessRunner::new(
    ///     Arc::new(SystemTimeProvider),
    ///     vec!["PATH".to_string(), "HOME".to_string(), "USER".to_string()],
    /// );
    /// ```
    pub fn new(time_provider: Arc<dyn TimeProvider>, env_allowlist: Vec<String>) -> Self {
        Self {
            time_provider,
            env_allowlist,
            timeout_ms: None,
        }
    }

    /// Kill the engine when it runs longer than `timeout_ms`
    pub fn with_timeout(mut self, timeout_ms: Option<i64>) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Keep allowlisted variables only
    fn filter_env<I>(&self, env: I) -> HashMap<String, String>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        env.into_iter()
            .filter(|(k, _)| self.env_allowlist.contains(k))
            .collect()
    }

    /// Spawn child process and wait for output
    async fn spawn_and_wait(
        &self,
        command: &EngineCommand,
    ) -> Result<std::process::Output, ExecutionError> {
        let filtered_env = self.filter_env(std::env::vars());

        let child = Command::new(&command.program)
            .args(&command.args)
            .env_clear()
            .envs(&filtered_env)
            .current_dir(&command.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ExecutionError::SpawnFailed(format!("{}: {}", command.program, e)))?;

        match self.timeout_ms {
            Some(timeout_ms) => {
                match timeout(
                    Duration::from_millis(timeout_ms.max(0) as u64),
                    child.wait_with_output(),
                )
                .await
                {
                    Ok(Ok(output)) => Ok(output),
                    Ok(Err(e)) => Err(ExecutionError::IoError(e.to_string())),
                    Err(_) => {
                        warn!(program = %command.program, timeout_ms, "Engine timed out, killed");
                        Err(ExecutionError::Timeout(timeout_ms))
                    }
                }
            }
            None => child
                .wait_with_output()
                .await
                .map_err(|e| ExecutionError::IoError(e.to_string())),
        }
    }

    /// Build execution result from process output
    fn build_result(&self, output: std::process::Output, duration_ms: i64) -> ExecutionResult {
        let status = if output.status.success() {
            ExecutionStatus::Success
        } else {
            ExecutionStatus::Failed
        };

        ExecutionResult {
            status,
            exit_code: output.status.code(),
            duration_ms,
            stdout: Some(String::from_utf8_lossy(&output.stdout).to_string()),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        }
    }
}

#[async_trait]
impl ProcessRunner for SubprocessRunner {
    async fn run(&self, command: &EngineCommand) -> Result<ExecutionResult, ExecutionError> {
        if command.program.trim().is_empty() {
            return Err(ExecutionError::InvalidCommand(
                "engine executable is empty".to_string(),
            ));
        }

        let start_time = self.time_provider.now_millis();
        info!(
            program = %command.program,
            args = ?command.args,
            working_dir = %command.working_dir.display(),
            timeout_ms = ?self.timeout_ms,
            "Starting engine process"
        );

        let output = self.spawn_and_wait(command).await?;
        let duration_ms = self.time_provider.now_millis() - start_time;
        let result = self.build_result(output, duration_ms);

        info!(
            program = %command.program,
            duration_ms = %duration_ms,
            exit_code = ?result.exit_code,
            status = ?result.status,
            "Engine process completed"
        );

        Ok(result)
    }
}
