//! MPA CLI - database searches and spectral similarity search
//! Composition root: wires the SQLite store and subprocess runner into the core jobs

mod config;
mod logging;
mod output;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use mpa_core::application::{
    JobManager, SearchResources, SearchTask, SpecSimJob, SpectrumStorage,
};
use mpa_core::domain::mgf::read_mgf;
use mpa_core::domain::{JobId, SearchSettings, SearchType, SpecSimSettings, Tolerance};
use mpa_core::port::id_provider::UuidProvider;
use mpa_core::port::time_provider::SystemTimeProvider;
use mpa_core::port::{ChannelProgress, ProgressEvent};
use mpa_infra_sqlite::{create_pool, run_migrations, SqliteResultStore};
use mpa_infra_system::SubprocessRunner;

use crate::config::AppConfig;

#[derive(Parser)]
#[command(name = "mpa")]
#[command(about = "Peptide search jobs and spectral similarity search", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML or JSON)
    #[arg(long, global = true, env = "MPA_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run target and decoy searches plus q-value scoring for every file and engine
    Search(SearchArgs),

    /// Compare query spectra against stored library spectra
    Specsim(SpecSimArgs),

    /// Store spectra in the library without searching
    Ingest {
        /// MGF file (repeatable)
        #[arg(short, long = "file", required = true)]
        files: Vec<PathBuf>,

        #[arg(short, long, env = "MPA_EXPERIMENT")]
        experiment: i64,
    },
}

#[derive(Args)]
struct SearchArgs {
    /// MGF file (repeatable)
    #[arg(short, long = "file", required = true)]
    files: Vec<PathBuf>,

    #[arg(long)]
    xtandem: bool,

    #[arg(long)]
    omssa: bool,

    /// Target protein database; the decoy database is `<stem>_decoy.<ext>` beside it
    #[arg(long, env = "MPA_FASTA")]
    fasta: PathBuf,

    #[arg(long, default_value = "1.0")]
    precursor_tol: f64,

    /// Precursor tolerance in ppm instead of Da
    #[arg(long)]
    ppm: bool,

    /// Fragment tolerance in Da
    #[arg(long, default_value = "0.5")]
    fragment_tol: f64,

    #[arg(long, default_value = "2")]
    missed_cleavages: u32,

    #[arg(short, long, env = "MPA_EXPERIMENT")]
    experiment: i64,
}

impl SearchArgs {
    fn settings(&self) -> SearchSettings {
        let precursor_tolerance = if self.ppm {
            Tolerance::Ppm(self.precursor_tol)
        } else {
            Tolerance::Da(self.precursor_tol)
        };
        SearchSettings {
            xtandem: self.xtandem,
            omssa: self.omssa,
            precursor_tolerance,
            fragment_tolerance: self.fragment_tol,
            missed_cleavages: self.missed_cleavages,
            fasta_file: self.fasta.clone(),
            experiment_id: self.experiment,
            search_type: SearchType::Target,
        }
    }
}

#[derive(Args)]
struct SpecSimArgs {
    /// Query MGF file (repeatable)
    #[arg(short, long = "file", required = true)]
    files: Vec<PathBuf>,

    /// Library experiment to search
    #[arg(short, long, env = "MPA_EXPERIMENT")]
    experiment: i64,

    /// JSON settings file; flags below override its values
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Precursor m/z tolerance
    #[arg(long)]
    tol_mz: Option<f64>,

    /// Minimum accepted score
    #[arg(long)]
    thresh_score: Option<f64>,

    /// Most intense peaks kept per query (0 keeps all)
    #[arg(long)]
    pick_count: Option<usize>,

    /// 0 peak matching, 1 direct binning, 2 profiling
    #[arg(long)]
    vect: Option<u32>,

    #[arg(long)]
    bin_width: Option<f64>,

    #[arg(long)]
    bin_shift: Option<f64>,

    /// 0 box, 1 triangular, 2 gaussian
    #[arg(long)]
    profile: Option<u32>,

    #[arg(long)]
    base_width: Option<f64>,

    /// 0 identity, 1 sqrt, 2 ln
    #[arg(long)]
    trafo: Option<u32>,

    /// 0 euclidean, 1 dot product, 2 pearson, 3 cross-correlation
    #[arg(long)]
    comp: Option<u32>,

    #[arg(long)]
    xcorr_offset: Option<u32>,
}

impl SpecSimArgs {
    fn settings(&self) -> Result<SpecSimSettings> {
        let mut settings = match &self.settings {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                serde_json::from_str(&content)
                    .with_context(|| format!("Invalid settings file {}", path.display()))?
            }
            None => SpecSimSettings::default(),
        };

        settings.experiment_id = self.experiment;
        overlay(&mut settings.tol_mz, self.tol_mz);
        overlay(&mut settings.thresh_score, self.thresh_score);
        overlay(&mut settings.pick_count, self.pick_count);
        overlay(&mut settings.vect_index, self.vect);
        overlay(&mut settings.bin_width, self.bin_width);
        overlay(&mut settings.bin_shift, self.bin_shift);
        overlay(&mut settings.profile_index, self.profile);
        overlay(&mut settings.base_width, self.base_width);
        overlay(&mut settings.trafo_index, self.trafo);
        overlay(&mut settings.comp_index, self.comp);
        overlay(&mut settings.xcorr_offset, self.xcorr_offset);
        Ok(settings)
    }
}

fn overlay<T>(field: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *field = value;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Logging (guard flushes the file appender on exit)
    let _log_guard = logging::init_logging()?;

    // 2. Configuration
    let config = AppConfig::load(cli.config.as_deref())?;
    info!(
        version = mpa_core::VERSION,
        database = %config.database_path.display(),
        "MPA starting"
    );

    // 3. Database
    let store = Arc::new(open_store(&config).await?);

    match cli.command {
        Commands::Search(args) => run_search(&config, store, args).await,
        Commands::Specsim(args) => run_specsim(store, args).await,
        Commands::Ingest { files, experiment } => run_ingest(store, files, experiment).await,
    }
}

async fn open_store(config: &AppConfig) -> Result<SqliteResultStore> {
    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let pool = create_pool(&config.database_url())
        .await
        .context("DB pool creation failed")?;
    run_migrations(&pool).await.context("Migration failed")?;
    Ok(SqliteResultStore::new(pool))
}

/// Job manager whose progress events are printed as they arrive
fn console_manager() -> (JobManager, JoinHandle<()>) {
    let (progress, mut rx) = ChannelProgress::new();
    let manager = JobManager::new(
        Arc::new(UuidProvider),
        Arc::new(SystemTimeProvider),
        Arc::new(progress),
    );
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            output::print_event(&event);
            if matches!(event, ProgressEvent::BatchFinished { .. }) {
                break;
            }
        }
    });
    (manager, printer)
}

async fn run_search(config: &AppConfig, store: Arc<SqliteResultStore>, args: SearchArgs) -> Result<()> {
    let settings = args.settings();
    let time_provider = Arc::new(SystemTimeProvider);
    let runner = SubprocessRunner::new(time_provider, config.env_allowlist.clone())
        .with_timeout(config.engine_timeout_ms);

    let experiment_id = settings.experiment_id;
    let resources = SearchResources {
        output_dir: config.output_dir.clone(),
        engines: config.engines.by_engine(),
        runner: Arc::new(runner),
        store: store.clone(),
        storage: None,
    };
    let task = SearchTask::new(args.files, settings, resources)?;

    // Spectra are stored alongside the searches; identification jobs wait on the barrier
    let storage = SpectrumStorage::spawn(store, task.files().to_vec(), experiment_id);
    let task = task.with_storage(storage.barrier());

    let (manager, printer) = console_manager();
    let submitted = task.submit(&manager);
    println!(
        "{}",
        format!("Submitted {} jobs", submitted.len() * 3).cyan().bold()
    );

    let report = manager.execute().await;
    let _ = printer.await;

    if let Err(e) = storage.join().await {
        warn!(error = %e, "Spectrum storage did not complete");
    }

    let ids: Vec<JobId> = submitted
        .iter()
        .flat_map(|s| [s.target.clone(), s.decoy.clone(), s.score.clone()])
        .collect();
    print_job_table(&manager, &ids);
    output::print_report(&report);

    if !report.is_success() {
        anyhow::bail!("{} job(s) failed", report.failed.len());
    }
    Ok(())
}

async fn run_specsim(store: Arc<SqliteResultStore>, args: SpecSimArgs) -> Result<()> {
    let settings = args.settings()?;
    let queries = read_queries(&args.files)?;
    info!(queries = queries.len(), experiment_id = settings.experiment_id, "Queries loaded");

    let job = Arc::new(SpecSimJob::new(queries, settings, store.clone())?.with_store(store));

    let (manager, printer) = console_manager();
    let id = manager.add_job(job.clone());
    let report = manager.execute().await;
    let _ = printer.await;

    print_job_table(&manager, &[id]);
    output::print_matches(&job.ranked_results());
    output::print_report(&report);

    if !report.is_success() {
        anyhow::bail!("spectral similarity search failed");
    }
    Ok(())
}

async fn run_ingest(store: Arc<SqliteResultStore>, files: Vec<PathBuf>, experiment: i64) -> Result<()> {
    let handles = SpectrumStorage::spawn(store, files, experiment)
        .join()
        .await
        .context("Spectrum storage failed")?;

    output::print_stored(&handles);
    let total: usize = handles.iter().map(|h| h.spectrum_count).sum();
    println!(
        "{}",
        format!("✓ {} spectra stored in experiment {}", total, experiment)
            .green()
            .bold()
    );
    Ok(())
}

fn read_queries(files: &[PathBuf]) -> Result<Vec<mpa_core::domain::Spectrum>> {
    let mut queries = Vec::new();
    for file in files {
        queries.extend(read_spectra(file)?);
    }
    Ok(queries)
}

fn read_spectra(file: &Path) -> Result<Vec<mpa_core::domain::Spectrum>> {
    read_mgf(file).with_context(|| format!("Failed to read {}", file.display()))
}

fn print_job_table(manager: &JobManager, ids: &[JobId]) {
    let jobs: Vec<_> = ids.iter().filter_map(|id| manager.job(id)).collect();
    println!();
    output::print_jobs(&jobs);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_flags_build_settings() {
        let cli = Cli::parse_from([
            "mpa", "search", "-f", "a.mgf", "-f", "b.mgf", "--omssa", "--fasta", "db.fasta",
            "--precursor-tol", "10", "--ppm", "--experiment", "3",
        ]);
        let Commands::Search(args) = cli.command else {
            panic!("expected search command");
        };

        assert_eq!(args.files, vec![PathBuf::from("a.mgf"), PathBuf::from("b.mgf")]);
        let settings = args.settings();
        assert!(settings.omssa);
        assert!(!settings.xtandem);
        assert_eq!(settings.precursor_tolerance, Tolerance::Ppm(10.0));
        assert_eq!(settings.fragment_tolerance, 0.5);
        assert_eq!(settings.missed_cleavages, 2);
        assert_eq!(settings.experiment_id, 3);
    }

    #[test]
    fn test_specsim_flags_override_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("specsim.json");
        std::fs::write(
            &path,
            r#"{"tol_mz": 2.0, "thresh_score": 0.7, "comp_index": 2, "experiment_id": 9}"#,
        )
        .unwrap();

        let cli = Cli::parse_from([
            "mpa",
            "specsim",
            "-f",
            "q.mgf",
            "-e",
            "4",
            "--settings",
            path.to_str().unwrap(),
            "--thresh-score",
            "0.9",
        ]);
        let Commands::Specsim(args) = cli.command else {
            panic!("expected specsim command");
        };

        let settings = args.settings().unwrap();
        assert_eq!(settings.tol_mz, 2.0);
        assert_eq!(settings.thresh_score, 0.9);
        assert_eq!(settings.comp_index, 2);
        // Command line experiment wins over the file
        assert_eq!(settings.experiment_id, 4);
    }

    #[test]
    fn test_specsim_defaults_without_file() {
        let cli = Cli::parse_from(["mpa", "specsim", "-f", "q.mgf", "-e", "1", "--comp", "3"]);
        let Commands::Specsim(args) = cli.command else {
            panic!("expected specsim command");
        };

        let settings = args.settings().unwrap();
        assert_eq!(settings.comp_index, 3);
        assert_eq!(settings.vect_index, SpecSimSettings::default().vect_index);
    }

    #[test]
    fn test_search_requires_a_file() {
        assert!(Cli::try_parse_from(["mpa", "search", "--fasta", "db.fasta", "-e", "1"]).is_err());
    }
}
