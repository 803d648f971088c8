// Score job - target/decoy q-values for one engine run

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use super::qvalue::{best_per_spectrum, target_decoy_q_values};
use crate::domain::psm::{read_psm_table, write_scored_table};
use crate::domain::{JobId, JobKind, PsmRecord, SearchEngine};
use crate::error::{AppError, Result};
use crate::port::{JobContext, JobTask, ResultStore, SearchRunResult};

/// One prerequisite identification job and the file it is expected to write
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreInput {
    pub job_id: JobId,
    pub expected_file: PathBuf,
}

pub struct ScoreJob {
    engine: SearchEngine,
    experiment_id: i64,
    target: ScoreInput,
    decoy: ScoreInput,
    output_file: PathBuf,
    store: Arc<dyn ResultStore>,
}

impl ScoreJob {
    pub fn new(
        engine: SearchEngine,
        experiment_id: i64,
        target: ScoreInput,
        decoy: ScoreInput,
        output_file: PathBuf,
        store: Arc<dyn ResultStore>,
    ) -> Self {
        Self {
            engine,
            experiment_id,
            target,
            decoy,
            output_file,
            store,
        }
    }

    pub fn output_file(&self) -> &PathBuf {
        &self.output_file
    }

    /// Output of a completed prerequisite, or `MissingInput`
    fn resolve(&self, ctx: &JobContext, input: &ScoreInput) -> Result<PathBuf> {
        ctx.prerequisite(&input.job_id)
            .and_then(|job| job.completed_output())
            .cloned()
            .ok_or_else(|| {
                AppError::MissingInput(format!(
                    "{} (job {} produced no output)",
                    input.expected_file.display(),
                    input.job_id
                ))
            })
    }
}

fn read_table(path: &Path) -> Result<Vec<PsmRecord>> {
    read_psm_table(path).map_err(|e| match e {
        AppError::Io(io) => AppError::MissingInput(format!("{}: {}", path.display(), io)),
        other => other,
    })
}

#[async_trait]
impl JobTask for ScoreJob {
    fn kind(&self) -> JobKind {
        JobKind::Score
    }

    fn description(&self) -> String {
        let name = self
            .output_file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!("{} q-value scoring -> {}", self.engine.name(), name)
    }

    fn prerequisites(&self) -> Vec<JobId> {
        vec![self.target.job_id.clone(), self.decoy.job_id.clone()]
    }

    async fn execute(&self, ctx: &JobContext) -> Result<Option<PathBuf>> {
        let target_file = self.resolve(ctx, &self.target)?;
        let decoy_file = self.resolve(ctx, &self.decoy)?;

        let targets = best_per_spectrum(&read_table(&target_file)?);
        let decoys = best_per_spectrum(&read_table(&decoy_file)?);
        let scored = target_decoy_q_values(&targets, &decoys);

        write_scored_table(&self.output_file, &scored)?;
        info!(
            job_id = %ctx.job_id,
            engine = %self.engine,
            targets = targets.len(),
            decoys = decoys.len(),
            output = %self.output_file.display(),
            "Q-values computed"
        );

        self.store
            .store_results(&SearchRunResult {
                engine: self.engine,
                experiment_id: self.experiment_id,
                target_file,
                decoy_file: Some(decoy_file),
                psms: scored,
            })
            .await?;

        Ok(Some(self.output_file.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Job, JobError};
    use crate::port::result_store::mocks::InMemoryResultStore;
    use crate::port::NoopProgress;

    fn completed(id: &str, output: PathBuf) -> Job {
        let mut job = Job::new(id, 0, JobKind::Identification, id);
        job.start(1).unwrap();
        job.complete(2, Some(output)).unwrap();
        job
    }

    fn failed(id: &str) -> Job {
        let mut job = Job::new(id, 0, JobKind::Identification, id);
        job.start(1).unwrap();
        job.fail(
            2,
            JobError {
                category: "ENGINE".to_string(),
                message: "boom".to_string(),
            },
        )
        .unwrap();
        job
    }

    fn ctx(prerequisites: Vec<Job>) -> JobContext {
        JobContext {
            job_id: "job-3".to_string(),
            prerequisites,
            progress: Arc::new(NoopProgress),
        }
    }

    fn score_job(dir: &tempfile::TempDir, store: Arc<InMemoryResultStore>) -> ScoreJob {
        ScoreJob::new(
            SearchEngine::Omssa,
            4,
            ScoreInput {
                job_id: "job-1".to_string(),
                expected_file: dir.path().join("a_omssa_target.tsv"),
            },
            ScoreInput {
                job_id: "job-2".to_string(),
                expected_file: dir.path().join("a_omssa_decoy.tsv"),
            },
            dir.path().join("a_omssa_qvalues.tsv"),
            store,
        )
    }

    #[tokio::test]
    async fn test_scores_and_stores_results() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a_omssa_target.tsv");
        let decoy = dir.path().join("a_omssa_decoy.tsv");
        std::fs::write(
            &target,
            "title\tpeptide\tevalue\ns1\tPEPTIDEK\t0.001\ns2\tELVISK\t0.2\ns1\tOTHERK\t0.5\n",
        )
        .unwrap();
        std::fs::write(&decoy, "title\tpeptide\tevalue\nd1\tKEDITPEP\t0.1\n").unwrap();
        let store = Arc::new(InMemoryResultStore::new());
        let job = score_job(&dir, store.clone());

        let output = job
            .execute(&ctx(vec![
                completed("job-1", target.clone()),
                completed("job-2", decoy.clone()),
            ]))
            .await
            .unwrap();

        assert_eq!(output.as_ref(), Some(job.output_file()));
        let written = std::fs::read_to_string(job.output_file()).unwrap();
        assert!(written.starts_with("title\tpeptide\taccession\tevalue\tq_value"));

        let results = store.stored_results();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].engine, SearchEngine::Omssa);
        assert_eq!(results[0].experiment_id, 4);
        assert_eq!(results[0].decoy_file, Some(decoy));
        let psms = &results[0].psms;
        assert_eq!(psms.len(), 2);
        assert_eq!(psms[0].peptide, "PEPTIDEK");
        assert_eq!(psms[0].q_value, 0.0);
        assert_eq!(psms[1].q_value, 0.5);
    }

    #[tokio::test]
    async fn test_failed_prerequisite_is_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let decoy = dir.path().join("a_omssa_decoy.tsv");
        std::fs::write(&decoy, "title\tpeptide\tevalue\n").unwrap();
        let store = Arc::new(InMemoryResultStore::new());
        let job = score_job(&dir, store.clone());

        let err = job
            .execute(&ctx(vec![failed("job-1"), completed("job-2", decoy)]))
            .await
            .unwrap_err();

        assert_eq!(err.category(), "MISSING_INPUT");
        assert!(err.to_string().contains("a_omssa_target.tsv"));
        assert!(store.stored_results().is_empty());
    }

    #[tokio::test]
    async fn test_deleted_output_file_is_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(InMemoryResultStore::new());
        let job = score_job(&dir, store);

        let err = job
            .execute(&ctx(vec![
                completed("job-1", dir.path().join("gone_target.tsv")),
                completed("job-2", dir.path().join("gone_decoy.tsv")),
            ]))
            .await
            .unwrap_err();

        assert_eq!(err.category(), "MISSING_INPUT");
    }

    #[tokio::test]
    async fn test_store_failure_fails_job() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("t.tsv");
        let decoy = dir.path().join("d.tsv");
        std::fs::write(&target, "title\tpeptide\tevalue\ns1\tPEPTIDEK\t0.01\n").unwrap();
        std::fs::write(&decoy, "title\tpeptide\tevalue\n").unwrap();
        let job = score_job(&dir, Arc::new(InMemoryResultStore::failing("locked")));

        let err = job
            .execute(&ctx(vec![completed("job-1", target), completed("job-2", decoy)]))
            .await
            .unwrap_err();

        assert_eq!(err.category(), "DATA_ACCESS");
    }

    #[test]
    fn test_prerequisites_are_target_then_decoy() {
        let dir = tempfile::tempdir().unwrap();
        let job = score_job(&dir, Arc::new(InMemoryResultStore::new()));
        assert_eq!(job.prerequisites(), vec!["job-1", "job-2"]);
    }
}
