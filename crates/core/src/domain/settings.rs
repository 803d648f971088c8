// Search and similarity settings (immutable value objects)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::domain::engine::SearchEngine;
use crate::domain::error::{DomainError, Result};

/// Precursor tolerance with its unit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tolerance {
    Da(f64),
    Ppm(f64),
}

impl Tolerance {
    /// Absolute half-width of the tolerance window around `mz`
    pub fn window(&self, mz: f64) -> f64 {
        match *self {
            Tolerance::Da(da) => da,
            Tolerance::Ppm(ppm) => mz * ppm * 1e-6,
        }
    }

    pub fn value(&self) -> f64 {
        match *self {
            Tolerance::Da(v) | Tolerance::Ppm(v) => v,
        }
    }

    pub fn is_ppm(&self) -> bool {
        matches!(self, Tolerance::Ppm(_))
    }

    pub fn unit(&self) -> &'static str {
        match self {
            Tolerance::Da(_) => "Da",
            Tolerance::Ppm(_) => "ppm",
        }
    }
}

/// Target (real database) or decoy (reversed database) search
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SearchType {
    #[default]
    Target,
    Decoy,
}

impl std::fmt::Display for SearchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchType::Target => write!(f, "TARGET"),
            SearchType::Decoy => write!(f, "DECOY"),
        }
    }
}

/// Database search settings
///
/// Each identification job owns its own copy, taken with
/// [`SearchSettings::with_search_type`], so target and decoy jobs never share
/// a mutable search-type field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSettings {
    #[serde(default)]
    pub xtandem: bool,
    #[serde(default)]
    pub omssa: bool,
    pub precursor_tolerance: Tolerance,
    pub fragment_tolerance: f64, // Da
    pub missed_cleavages: u32,
    pub fasta_file: PathBuf,
    pub experiment_id: i64,
    #[serde(default)]
    pub search_type: SearchType,
}

impl SearchSettings {
    /// Copy of these settings tagged with `search_type`
    pub fn with_search_type(&self, search_type: SearchType) -> Self {
        Self {
            search_type,
            ..self.clone()
        }
    }

    /// Enabled engines in fan-out order
    pub fn enabled_engines(&self) -> Vec<SearchEngine> {
        SearchEngine::ALL
            .into_iter()
            .filter(|engine| match engine {
                SearchEngine::XTandem => self.xtandem,
                SearchEngine::Omssa => self.omssa,
            })
            .collect()
    }

    /// Database searched for the current search type
    pub fn database_path(&self) -> PathBuf {
        match self.search_type {
            SearchType::Target => self.fasta_file.clone(),
            SearchType::Decoy => decoy_database_path(&self.fasta_file),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let precursor = self.precursor_tolerance.value();
        if !precursor.is_finite() || precursor < 0.0 {
            return Err(DomainError::ValidationError(format!(
                "Precursor tolerance must be non-negative, got {}",
                precursor
            )));
        }
        if !self.fragment_tolerance.is_finite() || self.fragment_tolerance < 0.0 {
            return Err(DomainError::ValidationError(format!(
                "Fragment tolerance must be non-negative, got {}",
                self.fragment_tolerance
            )));
        }
        if self.fasta_file.as_os_str().is_empty() {
            return Err(DomainError::ValidationError(
                "No FASTA database selected".to_string(),
            ));
        }
        if self.enabled_engines().is_empty() {
            return Err(DomainError::ValidationError(
                "No search engine selected".to_string(),
            ));
        }
        Ok(())
    }
}

/// `db.fasta` -> `db_decoy.fasta`
pub fn decoy_database_path(fasta: &Path) -> PathBuf {
    let stem = fasta
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = match fasta.extension() {
        Some(ext) => format!("{}_decoy.{}", stem, ext.to_string_lossy()),
        None => format!("{}_decoy", stem),
    };
    fasta.with_file_name(file_name)
}

/// Spectral similarity search settings
///
/// Strategy selectors are plain indices so settings files stay stable; they
/// are resolved (and rejected when unknown) by `similarity::build_comparator`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecSimSettings {
    pub tol_mz: f64,
    pub thresh_score: f64,
    #[serde(default)]
    pub pick_count: usize,

    #[serde(default)]
    pub vect_index: u32,
    #[serde(default = "default_bin_width")]
    pub bin_width: f64,
    #[serde(default)]
    pub bin_shift: f64,
    #[serde(default)]
    pub profile_index: u32,
    #[serde(default = "default_bin_width")]
    pub base_width: f64,

    #[serde(default)]
    pub trafo_index: u32,
    #[serde(default)]
    pub comp_index: u32,
    #[serde(default)]
    pub xcorr_offset: u32,

    pub experiment_id: i64,
}

/// Upper bound on `base_width / bin_width` for profiling vectorization
pub const MAX_PROFILE_BINS_PER_PEAK: f64 = 10_000.0;

fn default_bin_width() -> f64 {
    1.0
}

impl Default for SpecSimSettings {
    fn default() -> Self {
        Self {
            tol_mz: 10.0,
            thresh_score: 0.5,
            pick_count: 20,
            vect_index: 1,
            bin_width: default_bin_width(),
            bin_shift: 0.0,
            profile_index: 0,
            base_width: default_bin_width(),
            trafo_index: 1,
            comp_index: 1,
            xcorr_offset: 75,
            experiment_id: 0,
        }
    }
}

impl SpecSimSettings {
    pub fn validate(&self) -> Result<()> {
        if !self.tol_mz.is_finite() || self.tol_mz < 0.0 {
            return Err(DomainError::ValidationError(format!(
                "Precursor m/z tolerance must be non-negative, got {}",
                self.tol_mz
            )));
        }
        if !self.thresh_score.is_finite() {
            return Err(DomainError::ValidationError(
                "Score threshold must be a finite number".to_string(),
            ));
        }
        if !(self.bin_width.is_finite() && self.bin_width > 0.0) {
            return Err(DomainError::ValidationError(format!(
                "Bin width must be positive, got {}",
                self.bin_width
            )));
        }
        if !(self.base_width.is_finite() && self.base_width > 0.0) {
            return Err(DomainError::ValidationError(format!(
                "Profile base width must be positive, got {}",
                self.base_width
            )));
        }
        // Profiling walks every bin under the base width of every peak
        if self.vect_index == 2 && self.base_width / self.bin_width > MAX_PROFILE_BINS_PER_PEAK {
            return Err(DomainError::ValidationError(format!(
                "Profile base width {} spans more than {} bins of width {}",
                self.base_width, MAX_PROFILE_BINS_PER_PEAK, self.bin_width
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> SearchSettings {
        SearchSettings {
            xtandem: true,
            omssa: false,
            precursor_tolerance: Tolerance::Da(1.0),
            fragment_tolerance: 0.5,
            missed_cleavages: 2,
            fasta_file: PathBuf::from("/db/uniprot_sprot.fasta"),
            experiment_id: 1,
            search_type: SearchType::Target,
        }
    }

    #[test]
    fn test_with_search_type_copies() {
        let target = settings();
        let decoy = target.with_search_type(SearchType::Decoy);

        assert_eq!(target.search_type, SearchType::Target);
        assert_eq!(decoy.search_type, SearchType::Decoy);
        assert_eq!(target.database_path(), PathBuf::from("/db/uniprot_sprot.fasta"));
        assert_eq!(
            decoy.database_path(),
            PathBuf::from("/db/uniprot_sprot_decoy.fasta")
        );
    }

    #[test]
    fn test_enabled_engines_order() {
        let mut s = settings();
        s.omssa = true;
        assert_eq!(
            s.enabled_engines(),
            vec![SearchEngine::XTandem, SearchEngine::Omssa]
        );
    }

    #[test]
    fn test_validate_rejects_negative_tolerance() {
        let mut s = settings();
        s.precursor_tolerance = Tolerance::Ppm(-5.0);
        assert!(s.validate().unwrap_err().to_string().contains("non-negative"));

        let mut s = settings();
        s.fragment_tolerance = -0.1;
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_validate_requires_engine() {
        let mut s = settings();
        s.xtandem = false;
        assert!(s.validate().unwrap_err().to_string().contains("engine"));
    }

    #[test]
    fn test_ppm_window() {
        let tol = Tolerance::Ppm(10.0);
        assert!((tol.window(1000.0) - 0.01).abs() < 1e-12);
        assert_eq!(Tolerance::Da(0.5).window(1000.0), 0.5);
    }

    #[test]
    fn test_specsim_settings_from_json_defaults() {
        let json = serde_json::json!({
            "tol_mz": 0.05,
            "thresh_score": 0.8,
            "experiment_id": 7
        });
        let s: SpecSimSettings = serde_json::from_value(json).unwrap();
        assert_eq!(s.bin_width, 1.0);
        assert_eq!(s.comp_index, 0);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn test_validate_caps_profile_bins_per_peak() {
        let mut s = SpecSimSettings {
            vect_index: 2,
            base_width: 1e6,
            bin_width: 1e-3,
            ..SpecSimSettings::default()
        };
        let err = s.validate().unwrap_err();
        assert!(err.to_string().contains("bins"));

        s.base_width = 5.0;
        s.bin_width = 0.001;
        assert!(s.validate().is_ok());

        // The ratio only matters for profiling
        s.vect_index = 1;
        s.base_width = 1e6;
        assert!(s.validate().is_ok());
    }
}
