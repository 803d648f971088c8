// Process Runner Port
// Abstraction for invoking external identification engines

use crate::domain::EngineCommand;
use async_trait::async_trait;
use thiserror::Error;

/// Result of a process invocation
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    pub duration_ms: i64,
    pub exit_code: Option<i32>,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
}

/// Execution status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStatus {
    Success,
    Failed,
}

/// Execution errors
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Spawn failed: {0}")]
    SpawnFailed(String),

    #[error("Process timeout after {0}ms")]
    Timeout(i64),

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("IO error: {0}")]
    IoError(String),
}

/// Process Runner trait
///
/// Implementations:
/// - SubprocessRunner (infra-system): spawns the engine executable
/// - MockProcessRunner: scripted results for tests
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run `command` to completion
    ///
    /// # Errors
    /// - ExecutionError::SpawnFailed if the process cannot be started
    /// - ExecutionError::Timeout if a configured timeout elapses
    /// - ExecutionError::InvalidCommand if the command is empty
    async fn run(&self, command: &EngineCommand) -> Result<ExecutionResult, ExecutionError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Mock runner behavior for one invocation
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Exit 0 and write `content` to the command's output file
        Success { content: String },
        /// Exit 0 without writing anything
        SuccessNoOutput,
        /// Non-zero exit code with stderr
        ExitCode(i32, String),
        /// Spawn failure
        SpawnFail(String),
    }

    /// Mock Process Runner for testing
    ///
    /// Behaviours are consumed in call order; once the script is exhausted the
    /// default behaviour applies.
    pub struct MockProcessRunner {
        script: Mutex<VecDeque<MockBehavior>>,
        default: MockBehavior,
        calls: Arc<Mutex<Vec<EngineCommand>>>,
    }

    impl MockProcessRunner {
        pub fn new(default: MockBehavior) -> Self {
            Self {
                script: Mutex::new(VecDeque::new()),
                default,
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }

        /// Succeeds with a one-row PSM table
        pub fn new_success() -> Self {
            Self::new(MockBehavior::Success {
                content: "title\tpeptide\tevalue\nQ1\tPEPTIDEK\t0.001\n".to_string(),
            })
        }

        pub fn new_fail(message: impl Into<String>) -> Self {
            Self::new(MockBehavior::ExitCode(1, message.into()))
        }

        /// Queue behaviours for the next invocations
        pub fn with_script(self, script: Vec<MockBehavior>) -> Self {
            *self.script.lock().unwrap() = script.into();
            self
        }

        pub fn calls(&self) -> Vec<EngineCommand> {
            self.calls.lock().unwrap().clone()
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ProcessRunner for MockProcessRunner {
        async fn run(&self, command: &EngineCommand) -> Result<ExecutionResult, ExecutionError> {
            self.calls.lock().unwrap().push(command.clone());
            let behavior = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| self.default.clone());

            let ok = |exit_code: i32, stderr: Option<String>| ExecutionResult {
                status: if exit_code == 0 {
                    ExecutionStatus::Success
                } else {
                    ExecutionStatus::Failed
                },
                duration_ms: 10,
                exit_code: Some(exit_code),
                stdout: Some("mock output".to_string()),
                stderr,
            };

            match behavior {
                MockBehavior::Success { content } => {
                    std::fs::write(&command.output_file, content)
                        .map_err(|e| ExecutionError::IoError(e.to_string()))?;
                    Ok(ok(0, None))
                }
                MockBehavior::SuccessNoOutput => Ok(ok(0, None)),
                MockBehavior::ExitCode(code, stderr) => Ok(ok(code, Some(stderr))),
                MockBehavior::SpawnFail(msg) => Err(ExecutionError::SpawnFailed(msg)),
            }
        }
    }
}
