// SpecSim job - spectral similarity search against a stored library

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

use crate::domain::similarity::{build_comparator, PreparedQuery, SpectrumComparator};
use crate::domain::{
    build_intervals, Interval, JobKind, SpecSimSettings, SpectralSearchCandidate, Spectrum,
    SpectrumSpectrumMatch,
};
use crate::error::{AppError, Result};
use crate::port::{CandidateSource, JobContext, JobTask, ResultStore};

fn relock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Compares query spectra to library candidates within a precursor window
///
/// Accepted matches accumulate in the job and stay readable through
/// [`SpecSimJob::results`] even when the job later fails.
pub struct SpecSimJob {
    queries: Vec<Spectrum>,
    settings: SpecSimSettings,
    source: Arc<dyn CandidateSource>,
    store: Option<Arc<dyn ResultStore>>,
    comparator: Mutex<Box<dyn SpectrumComparator>>,
    results: Mutex<Vec<SpectrumSpectrumMatch>>,
}

impl SpecSimJob {
    /// Resolves the strategy selectors now; an unknown index or an
    /// unsupported combination is rejected before anything is enqueued.
    pub fn new(
        queries: Vec<Spectrum>,
        settings: SpecSimSettings,
        source: Arc<dyn CandidateSource>,
    ) -> Result<Self> {
        settings
            .validate()
            .map_err(|e| AppError::Config(e.to_string()))?;
        let comparator = build_comparator(&settings)?;
        Ok(Self::with_comparator(queries, settings, source, comparator))
    }

    /// Use a caller supplied comparator instead of the configured one
    pub fn with_comparator(
        queries: Vec<Spectrum>,
        settings: SpecSimSettings,
        source: Arc<dyn CandidateSource>,
        comparator: Box<dyn SpectrumComparator>,
    ) -> Self {
        Self {
            queries,
            settings,
            source,
            store: None,
            comparator: Mutex::new(comparator),
            results: Mutex::new(Vec::new()),
        }
    }

    /// Persist accepted matches after a successful run
    pub fn with_store(mut self, store: Arc<dyn ResultStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Merged tolerance windows around the query precursors
    pub fn intervals(&self) -> Vec<Interval> {
        let centers: Vec<f64> = self.queries.iter().map(|q| q.precursor_mz).collect();
        build_intervals(&centers, self.settings.tol_mz)
    }

    /// Matches accepted so far
    pub fn results(&self) -> Vec<SpectrumSpectrumMatch> {
        relock(&self.results).clone()
    }

    /// Matches accepted so far, best score first
    ///
    /// Ties keep query order.
    pub fn ranked_results(&self) -> Vec<SpectrumSpectrumMatch> {
        let mut ranked = self.results();
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        ranked
    }

    /// Score every query against the candidates within its own window
    fn score_queries(&self, candidates: &[SpectralSearchCandidate], ctx: &JobContext) {
        let tol = self.settings.tol_mz;
        let threshold = self.settings.thresh_score;
        let mut comparator = relock(&self.comparator);

        for query in &self.queries {
            let peaks = query.highest_peaks(self.settings.pick_count);
            let mut accepted = Vec::new();
            {
                let mut prepared = PreparedQuery::new(&mut **comparator, &peaks);
                for candidate in candidates {
                    if (query.precursor_mz - candidate.precursor_mz).abs() >= tol {
                        continue;
                    }
                    let score = prepared.score(&candidate.peaks);
                    if score >= threshold {
                        accepted.push(SpectrumSpectrumMatch {
                            query_title: query.title.clone(),
                            library_spectrum_id: candidate.spectrum_id,
                            score,
                        });
                    }
                }
            }
            debug!(
                job_id = %ctx.job_id,
                query = %query.title,
                accepted = accepted.len(),
                "Query scored"
            );
            relock(&self.results).extend(accepted);
            ctx.unit_completed();
        }
    }
}

#[async_trait]
impl JobTask for SpecSimJob {
    fn kind(&self) -> JobKind {
        JobKind::SpectralSimilarity
    }

    fn description(&self) -> String {
        format!(
            "Spectral similarity search of {} spectra (experiment {})",
            self.queries.len(),
            self.settings.experiment_id
        )
    }

    async fn execute(&self, ctx: &JobContext) -> Result<Option<PathBuf>> {
        relock(&self.results).clear();

        let intervals = self.intervals();
        if intervals.is_empty() {
            info!(job_id = %ctx.job_id, "No query spectra, nothing to compare");
            return Ok(None);
        }

        let candidates = self
            .source
            .get_candidates(self.settings.experiment_id, &intervals)
            .await?;
        info!(
            job_id = %ctx.job_id,
            queries = self.queries.len(),
            intervals = intervals.len(),
            candidates = candidates.len(),
            "Candidates retrieved"
        );

        self.score_queries(&candidates, ctx);

        let matches = self.results();
        info!(job_id = %ctx.job_id, matches = matches.len(), "Spectral similarity finished");

        if let Some(store) = &self.store {
            store
                .store_similarity_matches(self.settings.experiment_id, &matches)
                .await?;
        }
        Ok(None)
    }
}
