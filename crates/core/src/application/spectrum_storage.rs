// Spectrum Storage - background ingestion with a completion barrier

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::error::{AppError, Result};
use crate::port::{ResultStore, StorageHandle};

/// Published state of the storage task
#[derive(Debug, Clone, PartialEq)]
pub enum StorageStatus {
    Pending,
    Stored(Vec<StorageHandle>),
    Failed(String),
}

/// Background task storing spectrum files outside the job queue
pub struct SpectrumStorage {
    handle: JoinHandle<()>,
    status: watch::Receiver<StorageStatus>,
}

impl SpectrumStorage {
    /// Start storing `files` under `experiment_id` on a background task
    pub fn spawn(store: Arc<dyn ResultStore>, files: Vec<PathBuf>, experiment_id: i64) -> Self {
        let (tx, rx) = watch::channel(StorageStatus::Pending);

        let handle = tokio::spawn(async move {
            let mut stored = Vec::with_capacity(files.len());
            for file in &files {
                match store.store_spectra(file, experiment_id).await {
                    Ok(handle) => {
                        info!(
                            file = %file.display(),
                            spectra = handle.spectrum_count,
                            experiment_id,
                            "Spectra stored"
                        );
                        stored.push(handle);
                    }
                    Err(e) => {
                        error!(file = %file.display(), error = %e, "Spectrum storage failed");
                        let _ = tx.send(StorageStatus::Failed(format!(
                            "{}: {}",
                            file.display(),
                            e
                        )));
                        return;
                    }
                }
            }
            let _ = tx.send(StorageStatus::Stored(stored));
        });

        Self { handle, status: rx }
    }

    pub fn barrier(&self) -> StorageBarrier {
        StorageBarrier {
            status: self.status.clone(),
        }
    }

    /// Wait for the task and return what it stored
    pub async fn join(self) -> Result<Vec<StorageHandle>> {
        let barrier = self.barrier();
        self.handle
            .await
            .map_err(|e| AppError::Storage(format!("storage task aborted: {}", e)))?;
        barrier.wait_handles().await
    }
}

/// Rendezvous point for jobs that need the spectra stored first
#[derive(Clone)]
pub struct StorageBarrier {
    status: watch::Receiver<StorageStatus>,
}

impl StorageBarrier {
    /// Barrier that is already passed (spectra stored earlier)
    pub fn ready() -> Self {
        let (_tx, rx) = watch::channel(StorageStatus::Stored(Vec::new()));
        Self { status: rx }
    }

    /// Resolve once storage finished; fails if storage failed
    pub async fn wait(&self) -> Result<()> {
        self.wait_handles().await.map(|_| ())
    }

    async fn wait_handles(&self) -> Result<Vec<StorageHandle>> {
        let mut rx = self.status.clone();
        loop {
            let status = rx.borrow_and_update().clone();
            match status {
                StorageStatus::Stored(handles) => return Ok(handles),
                StorageStatus::Failed(msg) => return Err(AppError::Storage(msg)),
                StorageStatus::Pending => {}
            }
            if rx.changed().await.is_err() {
                // Sender dropped; the last published value is final
                return match rx.borrow().clone() {
                    StorageStatus::Stored(handles) => Ok(handles),
                    StorageStatus::Failed(msg) => Err(AppError::Storage(msg)),
                    StorageStatus::Pending => Err(AppError::Storage(
                        "storage task ended without reporting".to_string(),
                    )),
                };
            }
        }
    }
}
