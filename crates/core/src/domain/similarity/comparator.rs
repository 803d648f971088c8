//! Spectrum comparators
//!
//! A comparator is prepared once per query spectrum, scores any number of
//! candidates against it, and is cleaned up before the next query. Callers go
//! through [`PreparedQuery`], which runs `cleanup` when it goes out of scope.
//! Every comparator returns a similarity where higher means more alike.

use std::collections::BTreeMap;

use crate::domain::spectrum::Peak;

use super::transformation::Transformation;
use super::vectorization::{SpectrumVector, Vectorization};

pub trait SpectrumComparator: Send {
    /// Vectorize and cache the query peaks
    fn prepare(&mut self, query: &[Peak]);

    /// Similarity between the prepared query and `candidate` (0.0 when unprepared)
    fn compare_to(&mut self, candidate: &[Peak]) -> f64;

    /// Drop all per-query state
    fn cleanup(&mut self);
}

/// Comparator prepared for one query spectrum
pub struct PreparedQuery<'a> {
    comparator: &'a mut dyn SpectrumComparator,
}

impl<'a> PreparedQuery<'a> {
    pub fn new(comparator: &'a mut dyn SpectrumComparator, query: &[Peak]) -> Self {
        comparator.prepare(query);
        Self { comparator }
    }

    pub fn score(&mut self, candidate: &[Peak]) -> f64 {
        self.comparator.compare_to(candidate)
    }
}

impl Drop for PreparedQuery<'_> {
    fn drop(&mut self) {
        self.comparator.cleanup();
    }
}

/// Query vector cache shared by the vector-based comparators
#[derive(Debug, Clone)]
struct QueryState {
    vectorization: Vectorization,
    transformation: Transformation,
    query: Option<SpectrumVector>,
}

impl QueryState {
    fn new(vectorization: Vectorization, transformation: Transformation) -> Self {
        Self {
            vectorization,
            transformation,
            query: None,
        }
    }

    fn prepare(&mut self, peaks: &[Peak]) {
        self.query = Some(self.vectorization.vectorize(peaks, self.transformation));
    }

    fn vectorize(&self, peaks: &[Peak]) -> SpectrumVector {
        self.vectorization.vectorize(peaks, self.transformation)
    }

    fn aligned(&self, candidate: &[Peak]) -> Option<(Vec<f64>, Vec<f64>)> {
        let query = self.query.as_ref()?;
        Some(self.vectorization.align(query, &self.vectorize(candidate)))
    }

    fn cleanup(&mut self) {
        self.query = None;
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn norm(a: &[f64]) -> f64 {
    dot(a, a).sqrt()
}

/// Euclidean distance of the unit-normalized vectors, mapped to
/// `1 - d / sqrt(2)` so identical spectra score 1 and orthogonal ones 0
#[derive(Debug, Clone)]
pub struct EuclideanDistance {
    state: QueryState,
}

impl EuclideanDistance {
    pub fn new(vectorization: Vectorization, transformation: Transformation) -> Self {
        Self {
            state: QueryState::new(vectorization, transformation),
        }
    }
}

impl SpectrumComparator for EuclideanDistance {
    fn prepare(&mut self, query: &[Peak]) {
        self.state.prepare(query);
    }

    fn compare_to(&mut self, candidate: &[Peak]) -> f64 {
        let Some((a, b)) = self.state.aligned(candidate) else {
            return 0.0;
        };
        let (na, nb) = (norm(&a), norm(&b));
        if na == 0.0 || nb == 0.0 {
            return 0.0;
        }
        let distance = a
            .iter()
            .zip(&b)
            .map(|(x, y)| (x / na - y / nb).powi(2))
            .sum::<f64>()
            .sqrt();
        1.0 - distance / std::f64::consts::SQRT_2
    }

    fn cleanup(&mut self) {
        self.state.cleanup();
    }
}

/// Cosine of the angle between the two intensity vectors
#[derive(Debug, Clone)]
pub struct NormalizedDotProduct {
    state: QueryState,
}

impl NormalizedDotProduct {
    pub fn new(vectorization: Vectorization, transformation: Transformation) -> Self {
        Self {
            state: QueryState::new(vectorization, transformation),
        }
    }
}

impl SpectrumComparator for NormalizedDotProduct {
    fn prepare(&mut self, query: &[Peak]) {
        self.state.prepare(query);
    }

    fn compare_to(&mut self, candidate: &[Peak]) -> f64 {
        let Some((a, b)) = self.state.aligned(candidate) else {
            return 0.0;
        };
        let denominator = norm(&a) * norm(&b);
        if denominator == 0.0 {
            0.0
        } else {
            dot(&a, &b) / denominator
        }
    }

    fn cleanup(&mut self) {
        self.state.cleanup();
    }
}

/// Pearson product-moment correlation of the aligned vectors
#[derive(Debug, Clone)]
pub struct PearsonCorrelation {
    state: QueryState,
}

impl PearsonCorrelation {
    pub fn new(vectorization: Vectorization, transformation: Transformation) -> Self {
        Self {
            state: QueryState::new(vectorization, transformation),
        }
    }
}

impl SpectrumComparator for PearsonCorrelation {
    fn prepare(&mut self, query: &[Peak]) {
        self.state.prepare(query);
    }

    fn compare_to(&mut self, candidate: &[Peak]) -> f64 {
        let Some((a, b)) = self.state.aligned(candidate) else {
            return 0.0;
        };
        let n = a.len();
        if n < 2 {
            return 0.0;
        }
        let mean_a = a.iter().sum::<f64>() / n as f64;
        let mean_b = b.iter().sum::<f64>() / n as f64;

        let (mut cov, mut var_a, mut var_b) = (0.0, 0.0, 0.0);
        for (x, y) in a.iter().zip(&b) {
            let (dx, dy) = (x - mean_a, y - mean_b);
            cov += dx * dy;
            var_a += dx * dx;
            var_b += dy * dy;
        }
        if var_a == 0.0 || var_b == 0.0 {
            return 0.0;
        }
        cov / (var_a * var_b).sqrt()
    }

    fn cleanup(&mut self) {
        self.state.cleanup();
    }
}

/// Cross-correlation over bin offsets: the zero-offset correlation minus the
/// mean correlation at offsets `-offset..=offset` (excluding 0), computed on
/// unit-normalized binned vectors. Requires a binned vectorization.
#[derive(Debug, Clone)]
pub struct CrossCorrelation {
    state: QueryState,
    offset: u32,
    query_bins: Option<BTreeMap<i64, f64>>,
}

impl CrossCorrelation {
    pub fn new(vectorization: Vectorization, transformation: Transformation, offset: u32) -> Self {
        Self {
            state: QueryState::new(vectorization, transformation),
            offset,
            query_bins: None,
        }
    }
}

fn unit_bins(vector: &SpectrumVector) -> Option<BTreeMap<i64, f64>> {
    let bins = vector.bins()?;
    let norm = bins.values().map(|v| v * v).sum::<f64>().sqrt();
    if norm == 0.0 {
        return None;
    }
    Some(bins.iter().map(|(&k, &v)| (k, v / norm)).collect())
}

fn correlation_at(query: &BTreeMap<i64, f64>, candidate: &BTreeMap<i64, f64>, shift: i64) -> f64 {
    query
        .iter()
        .filter_map(|(k, q)| candidate.get(&(k + shift)).map(|c| q * c))
        .sum()
}

impl SpectrumComparator for CrossCorrelation {
    fn prepare(&mut self, query: &[Peak]) {
        let vector = self.state.vectorize(query);
        self.query_bins = unit_bins(&vector);
    }

    fn compare_to(&mut self, candidate: &[Peak]) -> f64 {
        let Some(query) = self.query_bins.as_ref() else {
            return 0.0;
        };
        let Some(candidate) = unit_bins(&self.state.vectorize(candidate)) else {
            return 0.0;
        };

        let zero = correlation_at(query, &candidate, 0);
        if self.offset == 0 {
            return zero;
        }
        let offset = self.offset as i64;
        let background: f64 = (-offset..=offset)
            .filter(|&tau| tau != 0)
            .map(|tau| correlation_at(query, &candidate, tau))
            .sum();
        zero - background / (2 * offset) as f64
    }

    fn cleanup(&mut self) {
        self.query_bins = None;
    }
}
