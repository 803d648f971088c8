//! Terminal tables

use colored::Colorize;
use mpa_core::application::BatchReport;
use mpa_core::domain::{Job, JobState, SpectrumSpectrumMatch};
use mpa_core::port::{ProgressEvent, StorageHandle};
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct JobRow {
    id: String,
    kind: String,
    state: String,
    description: String,
    #[tabled(rename = "duration (ms)")]
    duration: String,
    error: String,
}

impl From<&Job> for JobRow {
    fn from(job: &Job) -> Self {
        let duration = match (job.started_at, job.finished_at) {
            (Some(start), Some(end)) => (end - start).to_string(),
            _ => "-".to_string(),
        };
        Self {
            id: job.id.clone(),
            kind: job.kind.to_string(),
            state: job.state.to_string(),
            description: job.description.clone(),
            duration,
            error: job
                .error
                .as_ref()
                .map(|e| e.to_string())
                .unwrap_or_default(),
        }
    }
}

#[derive(Tabled)]
struct MatchRow {
    query: String,
    #[tabled(rename = "library spectrum")]
    library_spectrum_id: i64,
    score: String,
}

#[derive(Tabled)]
struct StoredRow {
    file: String,
    experiment: i64,
    spectra: usize,
}

pub fn print_jobs(jobs: &[Job]) {
    let rows: Vec<JobRow> = jobs.iter().map(JobRow::from).collect();
    println!("{}", Table::new(rows));
}

pub fn print_report(report: &BatchReport) {
    println!();
    if report.is_success() {
        println!(
            "{}",
            format!("✓ {} jobs completed", report.completed.len())
                .green()
                .bold()
        );
    } else {
        println!(
            "{}",
            format!(
                "✗ {} of {} jobs failed",
                report.failed.len(),
                report.total()
            )
            .red()
            .bold()
        );
    }
}

pub fn print_matches(matches: &[SpectrumSpectrumMatch]) {
    if matches.is_empty() {
        println!("{}", "No spectral matches above threshold".yellow());
        return;
    }
    let rows: Vec<MatchRow> = matches
        .iter()
        .map(|m| MatchRow {
            query: m.query_title.clone(),
            library_spectrum_id: m.library_spectrum_id,
            score: format!("{:.4}", m.score),
        })
        .collect();
    println!("{}", Table::new(rows));
}

pub fn print_stored(handles: &[StorageHandle]) {
    let rows: Vec<StoredRow> = handles
        .iter()
        .map(|h| StoredRow {
            file: h.file.display().to_string(),
            experiment: h.experiment_id,
            spectra: h.spectrum_count,
        })
        .collect();
    println!("{}", Table::new(rows));
}

/// One status line per lifecycle event; unit ticks are left to the log
pub fn print_event(event: &ProgressEvent) {
    match event {
        ProgressEvent::JobStarted {
            job_id,
            description,
        } => println!("{} {} {}", "▶".cyan(), job_id.dimmed(), description),
        ProgressEvent::JobFinished { job_id, state } => match state {
            JobState::Completed => println!("{} {} {}", "✓".green(), job_id.dimmed(), state),
            _ => println!("{} {} {}", "✗".red(), job_id.dimmed(), state.to_string().red()),
        },
        ProgressEvent::UnitCompleted { .. } | ProgressEvent::BatchFinished { .. } => {}
    }
}
