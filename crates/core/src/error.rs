// Central Error Type for the Application

use thiserror::Error;

use crate::domain::JobError;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Table error: {0}")]
    Table(#[from] csv::Error),

    #[error("Execution error: {0}")]
    Execution(#[from] crate::port::ExecutionError),

    #[error("Engine failed: {0}")]
    EngineFailed(String),

    #[error("Missing input: {0}")]
    MissingInput(String),

    #[error("Prerequisite not ready: {0}")]
    PrerequisiteNotReady(String),

    #[error("Spectrum storage failed: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Short category tag stored on failed jobs
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Domain(_) => "DOMAIN",
            AppError::Config(_) => "CONFIG",
            AppError::Database(_) => "DATA_ACCESS",
            AppError::Io(_) => "IO",
            AppError::Serialization(_) => "SERIALIZATION",
            AppError::Table(_) => "MALFORMED_OUTPUT",
            AppError::Execution(_) => "ENGINE",
            AppError::EngineFailed(_) => "ENGINE",
            AppError::MissingInput(_) => "MISSING_INPUT",
            AppError::PrerequisiteNotReady(_) => "PREREQUISITE",
            AppError::Storage(_) => "STORAGE",
            AppError::Internal(_) => "INTERNAL",
        }
    }

    /// Snapshot captured into a job's error slot
    pub fn to_job_error(&self) -> JobError {
        JobError {
            category: self.category().to_string(),
            message: self.to_string(),
        }
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
