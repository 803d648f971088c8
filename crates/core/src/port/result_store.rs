// Result Store Port
// Persistence of spectra, identification results and spectral matches

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::domain::{ScoredPsm, SearchEngine, SpectrumSpectrumMatch};
use crate::error::Result;

/// Outcome of storing one spectrum file
#[derive(Debug, Clone, PartialEq)]
pub struct StorageHandle {
    pub experiment_id: i64,
    pub file: PathBuf,
    pub spectrum_count: usize,
}

/// Scored output of one engine over one spectrum file
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRunResult {
    pub engine: SearchEngine,
    pub experiment_id: i64,
    pub target_file: PathBuf,
    pub decoy_file: Option<PathBuf>,
    pub psms: Vec<ScoredPsm>,
}

/// Result Store trait
///
/// Implementations:
/// - SqliteResultStore (infra-sqlite)
/// - InMemoryResultStore: records calls for tests
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Parse and persist the spectra of `file` under `experiment_id`
    async fn store_spectra(&self, file: &Path, experiment_id: i64) -> Result<StorageHandle>;

    /// Persist scored identifications produced by one engine
    async fn store_results(&self, run: &SearchRunResult) -> Result<()>;

    /// Persist accepted spectrum-spectrum matches
    async fn store_similarity_matches(
        &self,
        experiment_id: i64,
        matches: &[SpectrumSpectrumMatch],
    ) -> Result<()>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::sync::Mutex;

    /// In-memory store that records every call
    #[derive(Default)]
    pub struct InMemoryResultStore {
        pub spectra: Mutex<Vec<StorageHandle>>,
        pub results: Mutex<Vec<SearchRunResult>>,
        pub matches: Mutex<Vec<SpectrumSpectrumMatch>>,
        fail_with: Option<String>,
    }

    impl InMemoryResultStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Every operation fails with a database error
        pub fn failing(message: impl Into<String>) -> Self {
            Self {
                fail_with: Some(message.into()),
                ..Self::default()
            }
        }

        fn check(&self) -> Result<()> {
            match &self.fail_with {
                Some(msg) => Err(AppError::Database(msg.clone())),
                None => Ok(()),
            }
        }

        pub fn stored_results(&self) -> Vec<SearchRunResult> {
            self.results.lock().unwrap().clone()
        }

        pub fn stored_matches(&self) -> Vec<SpectrumSpectrumMatch> {
            self.matches.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ResultStore for InMemoryResultStore {
        async fn store_spectra(&self, file: &Path, experiment_id: i64) -> Result<StorageHandle> {
            self.check()?;
            let spectra = crate::domain::mgf::read_mgf(file)?;
            let handle = StorageHandle {
                experiment_id,
                file: file.to_path_buf(),
                spectrum_count: spectra.len(),
            };
            self.spectra.lock().unwrap().push(handle.clone());
            Ok(handle)
        }

        async fn store_results(&self, run: &SearchRunResult) -> Result<()> {
            self.check()?;
            self.results.lock().unwrap().push(run.clone());
            Ok(())
        }

        async fn store_similarity_matches(
            &self,
            _experiment_id: i64,
            matches: &[SpectrumSpectrumMatch],
        ) -> Result<()> {
            self.check()?;
            self.matches.lock().unwrap().extend_from_slice(matches);
            Ok(())
        }
    }
}
