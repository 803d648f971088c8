// Spectrum value types

use serde::{Deserialize, Serialize};

/// Single centroided peak
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Peak {
    pub mz: f64,
    pub intensity: f64,
}

impl Peak {
    pub fn new(mz: f64, intensity: f64) -> Self {
        Self { mz, intensity }
    }
}

/// Query spectrum (one MGF block)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spectrum {
    pub title: String,
    pub precursor_mz: f64,
    pub precursor_charge: Option<i32>,
    pub peaks: Vec<Peak>,
}

impl Spectrum {
    pub fn new(title: impl Into<String>, precursor_mz: f64, peaks: Vec<Peak>) -> Self {
        Self {
            title: title.into(),
            precursor_mz,
            precursor_charge: None,
            peaks,
        }
    }

    /// The `count` most intense peaks in ascending m/z order.
    /// `count == 0` keeps every peak.
    pub fn highest_peaks(&self, count: usize) -> Vec<Peak> {
        let mut peaks = self.peaks.clone();
        if count > 0 && peaks.len() > count {
            peaks.sort_by(|a, b| b.intensity.total_cmp(&a.intensity));
            peaks.truncate(count);
        }
        peaks.sort_by(|a, b| a.mz.total_cmp(&b.mz));
        peaks
    }
}

/// Library spectrum returned by the candidate extraction collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectralSearchCandidate {
    pub spectrum_id: i64,
    pub title: String,
    pub precursor_mz: f64,
    pub precursor_charge: Option<i32>,
    pub peaks: Vec<Peak>,
    /// Best peptide assigned to the library spectrum, if any
    pub sequence: Option<String>,
}

/// Scored pairing of a query spectrum and a library spectrum
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectrumSpectrumMatch {
    pub query_title: String,
    pub library_spectrum_id: i64,
    pub score: f64,
}
