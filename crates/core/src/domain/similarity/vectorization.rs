//! Peak list -> comparable vector
//!
//! Three binning policies:
//! - peak matching: no grid, peaks of two spectra are paired when their m/z
//!   differ by at most the tolerance
//! - direct binning: fixed-width grid offset by `shift`, intensities summed per bin
//! - profiling: like direct binning, but every peak is spread over the bins
//!   covered by a profile of width `base_width` centred on the peak

use std::collections::BTreeMap;

use crate::domain::error::{DomainError, Result};
use crate::domain::settings::SpecSimSettings;
use crate::domain::spectrum::Peak;

use super::transformation::Transformation;

/// Shape used by the profiling vectorization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileShape {
    Box,
    Triangular,
    Gaussian,
}

impl ProfileShape {
    /// Weight at distance `d` from the peak centre, `half` = half base width
    fn weight(&self, d: f64, half: f64) -> f64 {
        if d > half {
            return 0.0;
        }
        match self {
            ProfileShape::Box => 1.0,
            ProfileShape::Triangular => 1.0 - d / half,
            ProfileShape::Gaussian => {
                // base width spans +/- 2 sigma
                let sigma = half / 2.0;
                (-0.5 * (d / sigma).powi(2)).exp()
            }
        }
    }
}

impl TryFrom<u32> for ProfileShape {
    type Error = DomainError;

    fn try_from(index: u32) -> Result<Self> {
        match index {
            0 => Ok(ProfileShape::Box),
            1 => Ok(ProfileShape::Triangular),
            2 => Ok(ProfileShape::Gaussian),
            _ => Err(DomainError::UnsupportedStrategy {
                kind: "profile",
                index,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Vectorization {
    PeakMatching {
        tolerance: f64,
    },
    DirectBinning {
        width: f64,
        shift: f64,
    },
    Profiling {
        width: f64,
        shift: f64,
        shape: ProfileShape,
        base_width: f64,
    },
}

/// Vectorized spectrum
#[derive(Debug, Clone, PartialEq)]
pub enum SpectrumVector {
    /// Transformed peaks in ascending m/z (peak matching)
    Peaks(Vec<Peak>),
    /// Sparse bin index -> transformed intensity
    Bins(BTreeMap<i64, f64>),
}

impl SpectrumVector {
    /// Bins of a binned vector
    pub fn bins(&self) -> Option<&BTreeMap<i64, f64>> {
        match self {
            SpectrumVector::Bins(bins) => Some(bins),
            SpectrumVector::Peaks(_) => None,
        }
    }
}

impl Vectorization {
    pub fn from_settings(settings: &SpecSimSettings) -> Result<Self> {
        match settings.vect_index {
            0 => Ok(Vectorization::PeakMatching {
                tolerance: settings.bin_width,
            }),
            1 => Ok(Vectorization::DirectBinning {
                width: settings.bin_width,
                shift: settings.bin_shift,
            }),
            2 => Ok(Vectorization::Profiling {
                width: settings.bin_width,
                shift: settings.bin_shift,
                shape: ProfileShape::try_from(settings.profile_index)?,
                base_width: settings.base_width,
            }),
            index => Err(DomainError::UnsupportedStrategy {
                kind: "vectorization",
                index,
            }),
        }
    }

    pub fn is_binned(&self) -> bool {
        !matches!(self, Vectorization::PeakMatching { .. })
    }

    pub fn vectorize(&self, peaks: &[Peak], trafo: Transformation) -> SpectrumVector {
        match *self {
            Vectorization::PeakMatching { .. } => {
                let mut transformed: Vec<Peak> = peaks
                    .iter()
                    .map(|p| Peak::new(p.mz, trafo.transform(p.intensity)))
                    .collect();
                transformed.sort_by(|a, b| a.mz.total_cmp(&b.mz));
                SpectrumVector::Peaks(transformed)
            }
            Vectorization::DirectBinning { width, shift } => {
                let mut bins = BTreeMap::new();
                for peak in peaks {
                    let bin = ((peak.mz - shift) / width).floor() as i64;
                    *bins.entry(bin).or_insert(0.0) += trafo.transform(peak.intensity);
                }
                SpectrumVector::Bins(bins)
            }
            Vectorization::Profiling {
                width,
                shift,
                shape,
                base_width,
            } => {
                let half = base_width / 2.0;
                let mut bins = BTreeMap::new();
                for peak in peaks {
                    let intensity = trafo.transform(peak.intensity);
                    let first = ((peak.mz - half - shift) / width).floor() as i64;
                    let last = ((peak.mz + half - shift) / width).floor() as i64;
                    for bin in first..=last {
                        let center = shift + (bin as f64 + 0.5) * width;
                        let weight = shape.weight((center - peak.mz).abs(), half);
                        if weight > 0.0 {
                            *bins.entry(bin).or_insert(0.0) += intensity * weight;
                        }
                    }
                }
                SpectrumVector::Bins(bins)
            }
        }
    }

    /// Dense, position-aligned intensity vectors for two vectorized spectra
    pub fn align(&self, a: &SpectrumVector, b: &SpectrumVector) -> (Vec<f64>, Vec<f64>) {
        match (a, b) {
            (SpectrumVector::Peaks(a), SpectrumVector::Peaks(b)) => {
                let tolerance = match *self {
                    Vectorization::PeakMatching { tolerance } => tolerance,
                    _ => 0.0,
                };
                match_peaks(a, b, tolerance)
            }
            (SpectrumVector::Bins(a), SpectrumVector::Bins(b)) => align_bins(a, b),
            // never produced by a single Vectorization
            _ => (Vec::new(), Vec::new()),
        }
    }
}

/// Greedy sweep over two m/z-sorted peak lists
fn match_peaks(a: &[Peak], b: &[Peak], tolerance: f64) -> (Vec<f64>, Vec<f64>) {
    let mut left = Vec::with_capacity(a.len() + b.len());
    let mut right = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);

    while i < a.len() && j < b.len() {
        if (a[i].mz - b[j].mz).abs() <= tolerance {
            left.push(a[i].intensity);
            right.push(b[j].intensity);
            i += 1;
            j += 1;
        } else if a[i].mz < b[j].mz {
            left.push(a[i].intensity);
            right.push(0.0);
            i += 1;
        } else {
            left.push(0.0);
            right.push(b[j].intensity);
            j += 1;
        }
    }
    for peak in &a[i..] {
        left.push(peak.intensity);
        right.push(0.0);
    }
    for peak in &b[j..] {
        left.push(0.0);
        right.push(peak.intensity);
    }
    (left, right)
}

fn align_bins(a: &BTreeMap<i64, f64>, b: &BTreeMap<i64, f64>) -> (Vec<f64>, Vec<f64>) {
    let mut keys: Vec<i64> = a.keys().chain(b.keys()).copied().collect();
    keys.sort_unstable();
    keys.dedup();

    let left = keys.iter().map(|k| a.get(k).copied().unwrap_or(0.0)).collect();
    let right = keys.iter().map(|k| b.get(k).copied().unwrap_or(0.0)).collect();
    (left, right)
}
