//! Spectral similarity search against a SQLite spectrum library

use std::path::PathBuf;
use std::sync::Arc;

use mpa_core::application::{JobManager, SpecSimJob, SpectrumStorage};
use mpa_core::domain::mgf::parse_mgf;
use mpa_core::domain::{Interval, JobState, ScoredPsm, SearchEngine, SpecSimSettings};
use mpa_core::port::id_provider::SequentialIdProvider;
use mpa_core::port::progress::mocks::RecordingProgress;
use mpa_core::port::time_provider::SystemTimeProvider;
use mpa_core::port::{CandidateSource, ResultStore, SearchRunResult};
use mpa_infra_sqlite::{create_pool, run_migrations, SqliteResultStore};

const LIBRARY: &str = "BEGIN IONS
TITLE=L1
PEPMASS=500.25
CHARGE=2+
120.1 40.0
250.2 100.0
END IONS
BEGIN IONS
TITLE=L2
PEPMASS=500.6
300.0 50.0
410.0 80.0
END IONS
BEGIN IONS
TITLE=L3
PEPMASS=900.0
120.1 40.0
250.2 100.0
END IONS
";

const QUERIES: &str = "BEGIN IONS
TITLE=Q1
PEPMASS=500.25
120.1 40.0
250.2 100.0
END IONS
BEGIN IONS
TITLE=Q2
PEPMASS=712.8
120.1 40.0
END IONS
";

async fn library_store(dir: &tempfile::TempDir) -> Arc<SqliteResultStore> {
    let pool = create_pool("sqlite::memory:").await.unwrap();
    run_migrations(&pool).await.unwrap();
    let store = Arc::new(SqliteResultStore::new(pool));

    let path = dir.path().join("library.mgf");
    std::fs::write(&path, LIBRARY).unwrap();
    SpectrumStorage::spawn(store.clone(), vec![path], 1)
        .join()
        .await
        .unwrap();
    store
}

fn settings(experiment_id: i64) -> SpecSimSettings {
    SpecSimSettings {
        tol_mz: 0.5,
        thresh_score: 0.9,
        experiment_id,
        ..SpecSimSettings::default()
    }
}

fn manager(progress: Arc<RecordingProgress>) -> JobManager {
    JobManager::new(
        Arc::new(SequentialIdProvider::default()),
        Arc::new(SystemTimeProvider),
        progress,
    )
}

async fn library_id(store: &SqliteResultStore, title: &str) -> i64 {
    sqlx::query_scalar("SELECT id FROM spectra WHERE title = ?")
        .bind(title)
        .fetch_one(store.pool())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_identical_spectrum_is_matched_and_stored() {
    let dir = tempfile::tempdir().unwrap();
    let store = library_store(&dir).await;
    let progress = Arc::new(RecordingProgress::default());
    let manager = manager(progress.clone());

    let job = Arc::new(
        SpecSimJob::new(parse_mgf(QUERIES).unwrap(), settings(1), store.clone())
            .unwrap()
            .with_store(store.clone()),
    );
    let id = manager.add_job(job.clone());
    let report = manager.execute().await;

    assert!(report.is_success(), "failed: {:?}", report.failed);
    assert_eq!(manager.job(&id).unwrap().state, JobState::Completed);

    let results = job.results();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].query_title, "Q1");
    assert_eq!(results[0].library_spectrum_id, library_id(&store, "L1").await);
    assert!(results[0].score > 0.99);

    let stored = store.similarity_matches(1).await.unwrap();
    assert_eq!(stored, results);

    // One progress unit per query spectrum
    assert_eq!(progress.units_for(&id), 2);
}

#[tokio::test]
async fn test_candidate_windows_cover_only_query_neighbourhoods() {
    let dir = tempfile::tempdir().unwrap();
    let store = library_store(&dir).await;

    let job = SpecSimJob::new(parse_mgf(QUERIES).unwrap(), settings(1), store.clone()).unwrap();
    let intervals = job.intervals();
    assert_eq!(
        intervals,
        vec![Interval::new(499.75, 500.75), Interval::new(712.3, 713.3)]
    );

    let mut titles: Vec<String> = store
        .get_candidates(1, &intervals)
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.title)
        .collect();
    titles.sort();
    assert_eq!(titles, vec!["L1", "L2"]);
}

#[tokio::test]
async fn test_candidates_carry_identified_sequence() {
    let dir = tempfile::tempdir().unwrap();
    let store = library_store(&dir).await;

    store
        .store_results(&SearchRunResult {
            engine: SearchEngine::Omssa,
            experiment_id: 1,
            target_file: PathBuf::from("/out/library_omssa_target.tsv"),
            decoy_file: None,
            psms: vec![ScoredPsm {
                spectrum_title: "L1".to_string(),
                peptide: "PEPTIDEK".to_string(),
                accession: None,
                evalue: 0.0001,
                q_value: 0.0,
            }],
        })
        .await
        .unwrap();

    let candidates = store
        .get_candidates(1, &[Interval::new(499.0, 501.0)])
        .await
        .unwrap();
    let l1 = candidates.iter().find(|c| c.title == "L1").unwrap();
    let l2 = candidates.iter().find(|c| c.title == "L2").unwrap();
    assert_eq!(l1.sequence.as_deref(), Some("PEPTIDEK"));
    assert_eq!(l2.sequence, None);
}

#[tokio::test]
async fn test_other_experiment_yields_no_matches() {
    let dir = tempfile::tempdir().unwrap();
    let store = library_store(&dir).await;
    let manager = manager(Arc::new(RecordingProgress::default()));

    let job = Arc::new(
        SpecSimJob::new(parse_mgf(QUERIES).unwrap(), settings(2), store.clone())
            .unwrap()
            .with_store(store.clone()),
    );
    manager.add_job(job.clone());
    let report = manager.execute().await;

    assert!(report.is_success());
    assert!(job.results().is_empty());
    assert!(store.similarity_matches(2).await.unwrap().is_empty());
}
