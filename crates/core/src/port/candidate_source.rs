// Candidate Source Port
// Library spectra whose precursor m/z falls inside a set of windows

use async_trait::async_trait;

use crate::domain::{Interval, SpectralSearchCandidate};
use crate::error::Result;

/// Candidate Source trait
///
/// Implementations:
/// - SqliteResultStore (infra-sqlite): one range query per interval
/// - StaticCandidateSource: fixed library for tests
#[async_trait]
pub trait CandidateSource: Send + Sync {
    /// Library spectra of `experiment_id` whose precursor m/z lies in at least
    /// one of `intervals`. Each spectrum is returned once.
    async fn get_candidates(
        &self,
        experiment_id: i64,
        intervals: &[Interval],
    ) -> Result<Vec<SpectralSearchCandidate>>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::sync::Mutex;

    /// Fixed library filtered by interval membership
    #[derive(Default)]
    pub struct StaticCandidateSource {
        library: Vec<SpectralSearchCandidate>,
        fail_with: Option<String>,
        requests: Mutex<Vec<Vec<Interval>>>,
    }

    impl StaticCandidateSource {
        pub fn new(library: Vec<SpectralSearchCandidate>) -> Self {
            Self {
                library,
                ..Self::default()
            }
        }

        pub fn failing(message: impl Into<String>) -> Self {
            Self {
                fail_with: Some(message.into()),
                ..Self::default()
            }
        }

        /// Interval lists received, one entry per call
        pub fn requests(&self) -> Vec<Vec<Interval>> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CandidateSource for StaticCandidateSource {
        async fn get_candidates(
            &self,
            _experiment_id: i64,
            intervals: &[Interval],
        ) -> Result<Vec<SpectralSearchCandidate>> {
            self.requests.lock().unwrap().push(intervals.to_vec());
            if let Some(msg) = &self.fail_with {
                return Err(AppError::Database(msg.clone()));
            }
            Ok(self
                .library
                .iter()
                .filter(|c| intervals.iter().any(|i| i.contains(c.precursor_mz)))
                .cloned()
                .collect())
        }
    }
}
