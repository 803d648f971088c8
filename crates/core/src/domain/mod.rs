// Domain Layer - Pure business logic and entities

pub mod engine;
pub mod error;
pub mod interval;
pub mod job;
pub mod mgf;
pub mod psm;
pub mod settings;
pub mod similarity;
pub mod spectrum;

// Re-exports
pub use engine::{EngineCommand, EngineConfig, SearchEngine};
pub use error::DomainError;
pub use interval::{build_intervals, Interval};
pub use job::{Job, JobError, JobId, JobKind, JobState};
pub use psm::{PsmRecord, ScoredPsm};
pub use settings::{SearchSettings, SearchType, SpecSimSettings, Tolerance};
pub use spectrum::{Peak, SpectralSearchCandidate, Spectrum, SpectrumSpectrumMatch};
