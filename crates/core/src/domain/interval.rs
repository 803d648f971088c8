//! Precursor tolerance windows
//!
//! A sorted, non-overlapping list of closed intervals used to restrict the
//! candidate library to the neighbourhood of the query precursors.

use serde::{Deserialize, Serialize};

/// Closed range `[left, right]` with `left <= right`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    left: f64,
    right: f64,
}

impl Interval {
    /// Builds `[min(a, b), max(a, b)]`
    pub fn new(a: f64, b: f64) -> Self {
        if a <= b {
            Self { left: a, right: b }
        } else {
            Self { left: b, right: a }
        }
    }

    pub fn left(&self) -> f64 {
        self.left
    }

    pub fn right(&self) -> f64 {
        self.right
    }

    pub fn midpoint(&self) -> f64 {
        (self.left + self.right) / 2.0
    }

    pub fn contains(&self, value: f64) -> bool {
        self.left <= value && value <= self.right
    }

    /// True when `other` lies completely inside this interval
    pub fn encloses(&self, other: &Interval) -> bool {
        self.left <= other.left && other.right <= self.right
    }

    fn extend_to(&mut self, right: f64) {
        if right > self.right {
            self.right = right;
        }
    }
}

/// Tolerance window `[center - tolerance, center + tolerance]`, clamped at 0
pub fn window(center: f64, tolerance: f64) -> Interval {
    Interval::new((center - tolerance).max(0.0), center + tolerance)
}

/// Merge the tolerance windows of `centers` into the minimal ordered list of
/// disjoint intervals.
///
/// Windows whose left edge falls at or before the running right edge are
/// merged. An empty input yields an empty list.
pub fn build_intervals(centers: &[f64], tolerance: f64) -> Vec<Interval> {
    let mut sorted: Vec<f64> = centers.iter().copied().filter(|c| !c.is_nan()).collect();
    sorted.sort_by(f64::total_cmp);

    let mut intervals: Vec<Interval> = Vec::new();
    for center in sorted {
        let next = window(center, tolerance);
        match intervals.last_mut() {
            Some(current) if next.left <= current.right => current.extend_to(next.right),
            _ => intervals.push(next),
        }
    }
    intervals
}
