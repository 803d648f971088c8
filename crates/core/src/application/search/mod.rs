// Search Task - job graph construction for database searches

pub mod identification;
pub mod qvalue;
pub mod score;

pub use identification::IdentificationJob;
pub use score::{ScoreInput, ScoreJob};

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::application::job_manager::JobManager;
use crate::application::spectrum_storage::StorageBarrier;
use crate::domain::{EngineConfig, JobId, SearchEngine, SearchSettings, SearchType};
use crate::error::{AppError, Result};
use crate::port::{ProcessRunner, ResultStore};

/// Collaborators shared by every job of one search
#[derive(Clone)]
pub struct SearchResources {
    pub output_dir: PathBuf,
    /// Engines without an entry use their default executable
    pub engines: HashMap<SearchEngine, EngineConfig>,
    pub runner: Arc<dyn ProcessRunner>,
    pub store: Arc<dyn ResultStore>,
    pub storage: Option<StorageBarrier>,
}

impl SearchResources {
    fn engine_config(&self, engine: SearchEngine) -> EngineConfig {
        self.engines
            .get(&engine)
            .cloned()
            .unwrap_or_else(|| EngineConfig::for_engine(engine))
    }
}

/// Ids of the (target, decoy, score) triple submitted for one file and engine
#[derive(Debug, Clone, PartialEq)]
pub struct SubmittedSearch {
    pub file: PathBuf,
    pub engine: SearchEngine,
    pub target: JobId,
    pub decoy: JobId,
    pub score: JobId,
}

/// Static fan-out of spectrum files over the enabled engines
///
/// Per file and engine, submits a target identification job, a decoy
/// identification job and a score job that declares both as prerequisites.
pub struct SearchTask {
    files: Vec<PathBuf>,
    settings: SearchSettings,
    resources: SearchResources,
}

impl SearchTask {
    /// Validates the inputs; nothing is enqueued on error
    ///
    /// Spectrum files, the FASTA database and the output directory are made
    /// absolute against the current directory, since engines run inside the
    /// output directory.
    pub fn new(
        files: Vec<PathBuf>,
        mut settings: SearchSettings,
        mut resources: SearchResources,
    ) -> Result<Self> {
        if files.is_empty() {
            return Err(AppError::Config("no spectrum files selected".to_string()));
        }
        settings
            .validate()
            .map_err(|e| AppError::Config(e.to_string()))?;

        let files = files
            .iter()
            .map(|file| absolute(file))
            .collect::<Result<Vec<_>>>()?;
        settings.fasta_file = absolute(&settings.fasta_file)?;
        resources.output_dir = absolute(&resources.output_dir)?;

        Ok(Self {
            files,
            settings,
            resources,
        })
    }

    /// Hold identification jobs until `barrier` reports the spectra stored
    pub fn with_storage(mut self, barrier: StorageBarrier) -> Self {
        self.resources.storage = Some(barrier);
        self
    }

    /// Spectrum files as the jobs will see them
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Enqueue the job graph on `manager`
    pub fn submit(&self, manager: &JobManager) -> Vec<SubmittedSearch> {
        let engines = self.settings.enabled_engines();
        let mut submitted = Vec::with_capacity(self.files.len() * engines.len());

        for file in &self.files {
            for &engine in &engines {
                let target = self.identification_job(engine, file, SearchType::Target);
                let decoy = self.identification_job(engine, file, SearchType::Decoy);
                let target_file = target.output_file();
                let decoy_file = decoy.output_file();

                let target_id = manager.add_job(Arc::new(target));
                let decoy_id = manager.add_job(Arc::new(decoy));

                let score = ScoreJob::new(
                    engine,
                    self.settings.experiment_id,
                    ScoreInput {
                        job_id: target_id.clone(),
                        expected_file: target_file,
                    },
                    ScoreInput {
                        job_id: decoy_id.clone(),
                        expected_file: decoy_file,
                    },
                    engine.score_output_path(&self.resources.output_dir, file),
                    Arc::clone(&self.resources.store),
                );
                let score_id = manager.add_job(Arc::new(score));

                submitted.push(SubmittedSearch {
                    file: file.clone(),
                    engine,
                    target: target_id,
                    decoy: decoy_id,
                    score: score_id,
                });
            }
        }

        info!(
            files = self.files.len(),
            engines = engines.len(),
            jobs = submitted.len() * 3,
            "Search jobs submitted"
        );
        submitted
    }

    fn identification_job(
        &self,
        engine: SearchEngine,
        file: &Path,
        search_type: SearchType,
    ) -> IdentificationJob {
        let job = IdentificationJob::new(
            engine,
            file.to_path_buf(),
            self.settings.with_search_type(search_type),
            self.resources.engine_config(engine),
            self.resources.output_dir.clone(),
            Arc::clone(&self.resources.runner),
        );
        match &self.resources.storage {
            Some(barrier) => job.with_storage_barrier(barrier.clone()),
            None => job,
        }
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path)
        .map_err(|e| AppError::Config(format!("cannot resolve {}: {}", path.display(), e)))
}
