// SQLite ResultStore + CandidateSource Implementation

use async_trait::async_trait;
use mpa_core::domain::mgf::parse_mgf;
use mpa_core::domain::{Interval, Peak, SpectralSearchCandidate, SpectrumSpectrumMatch};
use mpa_core::error::Result;
use mpa_core::port::{CandidateSource, ResultStore, SearchRunResult, StorageHandle};
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

use crate::error::map_sqlx_error;

/// One shared pool handed to every job; each call borrows a connection only
/// for its own statements.
#[derive(Clone)]
pub struct SqliteResultStore {
    pool: SqlitePool,
}

impl SqliteResultStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Number of stored spectra in an experiment
    pub async fn count_spectra(&self, experiment_id: i64) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM spectra WHERE experiment_id = ?")
            .bind(experiment_id)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }

    /// Stored spectrum-spectrum matches of an experiment, best score first
    pub async fn similarity_matches(&self, experiment_id: i64) -> Result<Vec<SpectrumSpectrumMatch>> {
        let rows: Vec<(String, i64, f64)> = sqlx::query_as(
            r#"
            SELECT query_title, library_spectrum_id, score
            FROM ssms
            WHERE experiment_id = ?
            ORDER BY score DESC, id ASC
            "#,
        )
        .bind(experiment_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|(query_title, library_spectrum_id, score)| SpectrumSpectrumMatch {
                query_title,
                library_spectrum_id,
                score,
            })
            .collect())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CandidateRow {
    id: i64,
    title: String,
    precursor_mz: f64,
    precursor_charge: Option<i32>,
    peaks: String,
    sequence: Option<String>,
}

impl CandidateRow {
    fn into_candidate(self) -> Result<SpectralSearchCandidate> {
        let peaks: Vec<Peak> = serde_json::from_str(&self.peaks)?;
        Ok(SpectralSearchCandidate {
            spectrum_id: self.id,
            title: self.title,
            precursor_mz: self.precursor_mz,
            precursor_charge: self.precursor_charge,
            peaks,
            sequence: self.sequence,
        })
    }
}

#[async_trait]
impl ResultStore for SqliteResultStore {
    async fn store_spectra(&self, file: &Path, experiment_id: i64) -> Result<StorageHandle> {
        let content = tokio::fs::read_to_string(file).await?;
        let spectra = parse_mgf(&content)?;
        let file_str = file.display().to_string();

        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        for spectrum in &spectra {
            let peaks = serde_json::to_string(&spectrum.peaks)?;
            sqlx::query(
                r#"
                INSERT INTO spectra (experiment_id, file, title, precursor_mz, precursor_charge, peaks)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(experiment_id)
            .bind(&file_str)
            .bind(&spectrum.title)
            .bind(spectrum.precursor_mz)
            .bind(spectrum.precursor_charge)
            .bind(peaks)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        }
        tx.commit().await.map_err(map_sqlx_error)?;

        info!(
            file = %file_str,
            experiment_id,
            spectra = spectra.len(),
            "Stored spectra"
        );
        Ok(StorageHandle {
            experiment_id,
            file: file.to_path_buf(),
            spectrum_count: spectra.len(),
        })
    }

    async fn store_results(&self, run: &SearchRunResult) -> Result<()> {
        let source_file = run.target_file.display().to_string();

        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        for psm in &run.psms {
            sqlx::query(
                r#"
                INSERT INTO psms (
                    experiment_id, engine, search_type, spectrum_title,
                    peptide, accession, evalue, q_value, source_file
                ) VALUES (?, ?, 'TARGET', ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(run.experiment_id)
            .bind(run.engine.tag())
            .bind(&psm.spectrum_title)
            .bind(&psm.peptide)
            .bind(&psm.accession)
            .bind(psm.evalue)
            .bind(psm.q_value)
            .bind(&source_file)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        }
        tx.commit().await.map_err(map_sqlx_error)?;

        info!(
            engine = %run.engine,
            experiment_id = run.experiment_id,
            psms = run.psms.len(),
            "Stored identification results"
        );
        Ok(())
    }

    async fn store_similarity_matches(
        &self,
        experiment_id: i64,
        matches: &[SpectrumSpectrumMatch],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        for ssm in matches {
            sqlx::query(
                "INSERT INTO ssms (experiment_id, query_title, library_spectrum_id, score) VALUES (?, ?, ?, ?)",
            )
            .bind(experiment_id)
            .bind(&ssm.query_title)
            .bind(ssm.library_spectrum_id)
            .bind(ssm.score)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        }
        tx.commit().await.map_err(map_sqlx_error)?;

        info!(experiment_id, matches = matches.len(), "Stored spectral matches");
        Ok(())
    }
}

#[async_trait]
impl CandidateSource for SqliteResultStore {
    async fn get_candidates(
        &self,
        experiment_id: i64,
        intervals: &[Interval],
    ) -> Result<Vec<SpectralSearchCandidate>> {
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();

        // One range query per window; the (experiment_id, precursor_mz) index serves each
        for interval in intervals {
            let rows: Vec<CandidateRow> = sqlx::query_as(
                r#"
                SELECT s.id, s.title, s.precursor_mz, s.precursor_charge, s.peaks,
                    (SELECT p.peptide FROM psms p
                     WHERE p.experiment_id = s.experiment_id AND p.spectrum_title = s.title
                     ORDER BY p.q_value IS NULL, p.q_value ASC, p.evalue ASC
                     LIMIT 1) AS sequence
                FROM spectra s
                WHERE s.experiment_id = ? AND s.precursor_mz BETWEEN ? AND ?
                ORDER BY s.precursor_mz ASC, s.id ASC
                "#,
            )
            .bind(experiment_id)
            .bind(interval.left())
            .bind(interval.right())
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

            debug!(
                left = interval.left(),
                right = interval.right(),
                rows = rows.len(),
                "Candidate window queried"
            );

            for row in rows {
                if seen.insert(row.id) {
                    candidates.push(row.into_candidate()?);
                }
            }
        }

        Ok(candidates)
    }
}

impl From<SqlitePool> for SqliteResultStore {
    fn from(pool: SqlitePool) -> Self {
        Self::new(pool)
    }
}
