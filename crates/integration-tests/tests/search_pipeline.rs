//! Database search pipeline against a SQLite store
//!
//! Target/decoy/score job graphs drained by the JobManager, with spectra
//! stored in the background behind the storage barrier.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use mpa_core::application::{JobManager, SearchResources, SearchTask, SpectrumStorage};
use mpa_core::domain::{
    EngineConfig, JobState, SearchEngine, SearchSettings, SearchType, Tolerance,
};
use mpa_core::port::id_provider::SequentialIdProvider;
use mpa_core::port::process_runner::mocks::{MockBehavior, MockProcessRunner};
use mpa_core::port::progress::mocks::RecordingProgress;
use mpa_core::port::time_provider::SystemTimeProvider;
use mpa_core::port::ProcessRunner;
use mpa_infra_sqlite::{create_pool, run_migrations, SqliteResultStore};

const MGF: &str = "BEGIN IONS
TITLE=Q1
PEPMASS=500.25
CHARGE=2+
120.1 40.0
250.2 100.0
END IONS
BEGIN IONS
TITLE=Q2
PEPMASS=712.8
120.1 10.0
END IONS
";

async fn setup_store() -> Arc<SqliteResultStore> {
    let pool = create_pool("sqlite::memory:").await.unwrap();
    run_migrations(&pool).await.unwrap();
    Arc::new(SqliteResultStore::new(pool))
}

fn write_mgf(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn settings(xtandem: bool, omssa: bool) -> SearchSettings {
    SearchSettings {
        xtandem,
        omssa,
        precursor_tolerance: Tolerance::Ppm(10.0),
        fragment_tolerance: 0.5,
        missed_cleavages: 1,
        fasta_file: PathBuf::from("/db/uniprot.fasta"),
        experiment_id: 1,
        search_type: SearchType::Target,
    }
}

fn manager(progress: Arc<RecordingProgress>) -> JobManager {
    JobManager::new(
        Arc::new(SequentialIdProvider::default()),
        Arc::new(SystemTimeProvider),
        progress,
    )
}

fn resources(
    output_dir: &Path,
    runner: Arc<dyn ProcessRunner>,
    store: Arc<SqliteResultStore>,
    storage: &SpectrumStorage,
) -> SearchResources {
    SearchResources {
        output_dir: output_dir.to_path_buf(),
        engines: HashMap::new(),
        runner,
        store,
        storage: Some(storage.barrier()),
    }
}

async fn psm_count(store: &SqliteResultStore) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM psms")
        .fetch_one(store.pool())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_full_search_graph_completes() {
    let dir = tempfile::tempdir().unwrap();
    let files = vec![
        write_mgf(dir.path(), "a.mgf", MGF),
        write_mgf(dir.path(), "b.mgf", MGF),
    ];
    let store = setup_store().await;
    let runner = Arc::new(MockProcessRunner::new_success());
    let progress = Arc::new(RecordingProgress::default());
    let manager = manager(progress.clone());

    let storage = SpectrumStorage::spawn(store.clone(), files.clone(), 1);
    let task = SearchTask::new(
        files,
        settings(true, true),
        resources(dir.path(), runner.clone(), store.clone(), &storage),
    )
    .unwrap();
    let submitted = task.submit(&manager);

    let report = manager.execute().await;

    assert!(report.is_success(), "failed: {:?}", report.failed);
    assert_eq!(report.completed.len(), 12);
    assert_eq!(runner.call_count(), 8);

    // Execution order equals submission order
    let expected: Vec<String> = submitted
        .iter()
        .flat_map(|s| [s.target.clone(), s.decoy.clone(), s.score.clone()])
        .collect();
    assert_eq!(report.completed, expected);

    for search in &submitted {
        let score = manager.job(&search.score).unwrap();
        assert_eq!(score.state, JobState::Completed);
        let output = score.output.unwrap();
        assert!(output.exists());
        assert!(output
            .file_name()
            .unwrap()
            .to_string_lossy()
            .ends_with(&format!("_{}_qvalues.tsv", search.engine.tag())));
    }

    // One scored PSM per (file, engine)
    assert_eq!(psm_count(&store).await, 4);
    assert_eq!(storage.join().await.unwrap().len(), 2);
    assert_eq!(store.count_spectra(1).await.unwrap(), 4);
}

#[tokio::test]
async fn test_failed_target_search_does_not_stop_the_batch() {
    let dir = tempfile::tempdir().unwrap();
    let files = vec![write_mgf(dir.path(), "a.mgf", MGF)];
    let store = setup_store().await;
    let runner = Arc::new(
        MockProcessRunner::new_success()
            .with_script(vec![MockBehavior::ExitCode(2, "tandem: bad parameter".to_string())]),
    );
    let progress = Arc::new(RecordingProgress::default());
    let manager = manager(progress.clone());

    let storage = SpectrumStorage::spawn(store.clone(), files.clone(), 1);
    let submitted = SearchTask::new(
        files,
        settings(true, false),
        resources(dir.path(), runner.clone(), store.clone(), &storage),
    )
    .unwrap()
    .submit(&manager);
    let search = &submitted[0];

    let report = manager.execute().await;

    assert!(!report.is_success());
    assert_eq!(report.completed, vec![search.decoy.clone()]);
    let failed: Vec<(&str, &str)> = report
        .failed
        .iter()
        .map(|(id, e)| (id.as_str(), e.category.as_str()))
        .collect();
    assert_eq!(
        failed,
        vec![
            (search.target.as_str(), "ENGINE"),
            (search.score.as_str(), "MISSING_INPUT"),
        ]
    );

    let target = manager.job(&search.target).unwrap();
    assert!(target.error.unwrap().message.contains("bad parameter"));
    let score = manager.job(&search.score).unwrap();
    assert!(score.error.unwrap().message.contains("a_xtandem_target.tsv"));
    assert_eq!(psm_count(&store).await, 0);
}

#[tokio::test]
async fn test_storage_failure_fails_searches_without_running_engines() {
    let dir = tempfile::tempdir().unwrap();
    let files = vec![write_mgf(
        dir.path(),
        "broken.mgf",
        "BEGIN IONS\nTITLE=nopepmass\n100.0 1.0\nEND IONS\n",
    )];
    let store = setup_store().await;
    let runner = Arc::new(MockProcessRunner::new_success());
    let manager = manager(Arc::new(RecordingProgress::default()));

    let storage = SpectrumStorage::spawn(store.clone(), files.clone(), 1);
    let submitted = SearchTask::new(
        files,
        settings(false, true),
        resources(dir.path(), runner.clone(), store.clone(), &storage),
    )
    .unwrap()
    .submit(&manager);

    let report = manager.execute().await;

    assert_eq!(report.failed.len(), 3);
    assert_eq!(runner.call_count(), 0);
    let target = manager.job(&submitted[0].target).unwrap();
    assert_eq!(target.error.unwrap().category, "STORAGE");
    assert!(storage.join().await.is_err());
}

#[tokio::test]
async fn test_progress_events_cover_every_job() {
    let dir = tempfile::tempdir().unwrap();
    let files = vec![write_mgf(dir.path(), "a.mgf", MGF)];
    let store = setup_store().await;
    let progress = Arc::new(RecordingProgress::default());
    let manager = manager(progress.clone());

    let storage = SpectrumStorage::spawn(store.clone(), files.clone(), 1);
    SearchTask::new(
        files,
        settings(true, false),
        resources(
            dir.path(),
            Arc::new(MockProcessRunner::new_success()),
            store,
            &storage,
        ),
    )
    .unwrap()
    .submit(&manager);
    manager.execute().await;

    let events = progress.events();
    let started = events
        .iter()
        .filter(|e| matches!(e, mpa_core::port::ProgressEvent::JobStarted { .. }))
        .count();
    assert_eq!(started, 3);
    assert!(matches!(
        events.last(),
        Some(mpa_core::port::ProgressEvent::BatchFinished {
            completed: 3,
            failed: 0
        })
    ));
}

/// Engine stand-in: writes a PSM table to the path following `-output`
#[cfg(unix)]
const FAKE_TANDEM: &str = r#"
while [ $# -gt 0 ]; do
  if [ "$1" = "-output" ]; then out="$2"; fi
  shift
done
case "$out" in
  *decoy*) printf 'title\tpeptide\tevalue\nQ2\tKSIVLE\t0.5\n' > "$out" ;;
  *) printf 'title\tpeptide\tevalue\nQ1\tPEPTIDEK\t0.001\nQ2\tELVISK\t0.01\n' > "$out" ;;
esac
"#;

#[cfg(unix)]
#[tokio::test]
async fn test_search_with_real_subprocess_engine() {
    use mpa_infra_system::SubprocessRunner;

    let dir = tempfile::tempdir().unwrap();
    let output_dir = dir.path().join("results");
    let files = vec![write_mgf(dir.path(), "run1.mgf", MGF)];
    let store = setup_store().await;
    let manager = manager(Arc::new(RecordingProgress::default()));

    let runner = SubprocessRunner::new(Arc::new(SystemTimeProvider), vec!["PATH".to_string()])
        .with_timeout(Some(10_000));
    let storage = SpectrumStorage::spawn(store.clone(), files.clone(), 1);
    let mut resources = resources(&output_dir, Arc::new(runner), store.clone(), &storage);
    resources.engines.insert(
        SearchEngine::XTandem,
        EngineConfig {
            executable: "sh".to_string(),
            extra_args: vec![
                "-c".to_string(),
                FAKE_TANDEM.to_string(),
                "fake-tandem".to_string(),
            ],
        },
    );

    let submitted = SearchTask::new(files, settings(true, false), resources)
        .unwrap()
        .submit(&manager);
    let report = manager.execute().await;

    assert!(report.is_success(), "failed: {:?}", report.failed);
    assert!(output_dir.join("run1_xtandem_target.tsv").exists());
    assert!(output_dir.join("run1_xtandem_decoy.tsv").exists());

    let scored = std::fs::read_to_string(output_dir.join("run1_xtandem_qvalues.tsv")).unwrap();
    assert!(scored.contains("PEPTIDEK"));
    assert!(scored.contains("ELVISK"));

    let rows: Vec<(String, f64)> =
        sqlx::query_as("SELECT peptide, q_value FROM psms ORDER BY evalue")
            .fetch_all(store.pool())
            .await
            .unwrap();
    assert_eq!(
        rows,
        vec![("PEPTIDEK".to_string(), 0.0), ("ELVISK".to_string(), 0.0)]
    );
    assert_eq!(
        manager.job(&submitted[0].score).unwrap().state,
        JobState::Completed
    );
}
