// Identification job - one engine run over one spectrum file

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::application::constants::STDERR_TAIL_CHARS;
use crate::application::spectrum_storage::StorageBarrier;
use crate::domain::{EngineCommand, EngineConfig, JobKind, SearchEngine, SearchSettings, SearchType};
use crate::error::{AppError, Result};
use crate::port::{ExecutionStatus, JobContext, JobTask, ProcessRunner};

/// Runs one search engine in target or decoy mode
pub struct IdentificationJob {
    engine: SearchEngine,
    spectrum_file: PathBuf,
    settings: SearchSettings,
    config: EngineConfig,
    output_dir: PathBuf,
    runner: Arc<dyn ProcessRunner>,
    storage: Option<StorageBarrier>,
}

impl IdentificationJob {
    /// `settings` is this job's own snapshot; its search type decides the
    /// database and the output file.
    pub fn new(
        engine: SearchEngine,
        spectrum_file: PathBuf,
        settings: SearchSettings,
        config: EngineConfig,
        output_dir: PathBuf,
        runner: Arc<dyn ProcessRunner>,
    ) -> Self {
        Self {
            engine,
            spectrum_file,
            settings,
            config,
            output_dir,
            runner,
            storage: None,
        }
    }

    /// Wait on `barrier` before starting the engine
    pub fn with_storage_barrier(mut self, barrier: StorageBarrier) -> Self {
        self.storage = Some(barrier);
        self
    }

    pub fn engine(&self) -> SearchEngine {
        self.engine
    }

    pub fn search_type(&self) -> SearchType {
        self.settings.search_type
    }

    pub fn output_file(&self) -> PathBuf {
        self.engine
            .output_path(&self.output_dir, &self.spectrum_file, self.settings.search_type)
    }

    pub fn command(&self) -> EngineCommand {
        let output_file = self.output_file();
        let mut args = self.config.extra_args.clone();
        args.extend(
            self.engine
                .build_args(&self.spectrum_file, &output_file, &self.settings),
        );
        EngineCommand {
            program: self.config.executable.clone(),
            args,
            working_dir: self.output_dir.clone(),
            output_file,
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn stderr_tail(stderr: Option<&str>) -> String {
    let stderr = stderr.unwrap_or_default().trim();
    let skip = stderr.chars().count().saturating_sub(STDERR_TAIL_CHARS);
    stderr.chars().skip(skip).collect()
}

#[async_trait]
impl JobTask for IdentificationJob {
    fn kind(&self) -> JobKind {
        JobKind::Identification
    }

    fn description(&self) -> String {
        format!(
            "{} {} search on {}",
            self.engine.name(),
            self.settings.search_type,
            file_name(&self.spectrum_file)
        )
    }

    async fn execute(&self, ctx: &JobContext) -> Result<Option<PathBuf>> {
        if let Some(barrier) = &self.storage {
            barrier.wait().await?;
        }

        if !tokio::fs::try_exists(&self.spectrum_file).await? {
            return Err(AppError::MissingInput(format!(
                "spectrum file {} not found",
                self.spectrum_file.display()
            )));
        }
        tokio::fs::create_dir_all(&self.output_dir).await?;

        let command = self.command();
        info!(
            job_id = %ctx.job_id,
            engine = %self.engine,
            search_type = %self.settings.search_type,
            program = %command.program,
            "Running identification engine"
        );

        let result = self.runner.run(&command).await?;
        if result.status != ExecutionStatus::Success {
            warn!(
                job_id = %ctx.job_id,
                engine = %self.engine,
                exit_code = ?result.exit_code,
                "Identification engine failed"
            );
            return Err(AppError::EngineFailed(format!(
                "{} exited with code {:?}: {}",
                self.engine,
                result.exit_code,
                stderr_tail(result.stderr.as_deref())
            )));
        }

        if !tokio::fs::try_exists(&command.output_file).await? {
            return Err(AppError::EngineFailed(format!(
                "{} produced no output file {}",
                self.engine,
                command.output_file.display()
            )));
        }

        info!(
            job_id = %ctx.job_id,
            duration_ms = result.duration_ms,
            output = %command.output_file.display(),
            "Identification finished"
        );
        Ok(Some(command.output_file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Tolerance;
    use crate::port::process_runner::mocks::{MockBehavior, MockProcessRunner};
    use crate::port::NoopProgress;

    fn settings(search_type: SearchType) -> SearchSettings {
        SearchSettings {
            xtandem: true,
            omssa: false,
            precursor_tolerance: Tolerance::Da(1.0),
            fragment_tolerance: 0.5,
            missed_cleavages: 1,
            fasta_file: PathBuf::from("/db/uniprot.fasta"),
            experiment_id: 1,
            search_type,
        }
    }

    fn ctx() -> JobContext {
        JobContext {
            job_id: "job-1".to_string(),
            prerequisites: Vec::new(),
            progress: Arc::new(NoopProgress),
        }
    }

    fn job(dir: &tempfile::TempDir, runner: Arc<MockProcessRunner>, search_type: SearchType) -> IdentificationJob {
        let spectra = dir.path().join("run1.mgf");
        std::fs::write(&spectra, "BEGIN IONS\nPEPMASS=500.0\nEND IONS\n").unwrap();
        IdentificationJob::new(
            SearchEngine::XTandem,
            spectra,
            settings(search_type),
            EngineConfig {
                executable: "tandem-wrapper".to_string(),
                extra_args: vec!["--threads".to_string(), "2".to_string()],
            },
            dir.path().join("out"),
            runner,
        )
    }

    #[test]
    fn test_command_uses_decoy_database_for_decoy_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let job = job(&dir, Arc::new(MockProcessRunner::new_success()), SearchType::Decoy);

        let command = job.command();

        assert_eq!(command.program, "tandem-wrapper");
        assert_eq!(command.args[0..2], ["--threads".to_string(), "2".to_string()]);
        assert!(command.args.contains(&"/db/uniprot_decoy.fasta".to_string()));
        assert!(command.output_file.ends_with("out/run1_xtandem_decoy.tsv"));
        assert_eq!(job.description(), "X!TANDEM DECOY search on run1.mgf");
    }

    #[tokio::test]
    async fn test_successful_run_returns_output_file() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(MockProcessRunner::new_success());
        let job = job(&dir, runner.clone(), SearchType::Target);

        let output = job.execute(&ctx()).await.unwrap();

        assert_eq!(output, Some(job.output_file()));
        assert!(job.output_file().exists());
        assert_eq!(runner.call_count(), 1);
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_engine_failure() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(MockProcessRunner::new_fail("database not found"));
        let job = job(&dir, runner, SearchType::Target);

        let err = job.execute(&ctx()).await.unwrap_err();

        assert_eq!(err.category(), "ENGINE");
        assert!(err.to_string().contains("database not found"));
    }

    #[tokio::test]
    async fn test_missing_output_is_engine_failure() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(MockProcessRunner::new(MockBehavior::SuccessNoOutput));
        let job = job(&dir, runner, SearchType::Target);

        let err = job.execute(&ctx()).await.unwrap_err();
        assert!(err.to_string().contains("no output file"));
    }

    #[tokio::test]
    async fn test_spawn_failure_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(MockProcessRunner::new(MockBehavior::SpawnFail(
            "tandem-wrapper: not found".to_string(),
        )));
        let job = job(&dir, runner, SearchType::Target);

        let err = job.execute(&ctx()).await.unwrap_err();
        assert_eq!(err.category(), "ENGINE");
    }

    #[test]
    fn test_stderr_tail_keeps_end() {
        let long = "x".repeat(STDERR_TAIL_CHARS) + "END";
        let tail = stderr_tail(Some(&long));
        assert_eq!(tail.chars().count(), STDERR_TAIL_CHARS);
        assert!(tail.ends_with("END"));
    }
}
