// Intensity transformations applied during vectorization

use crate::domain::error::{DomainError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transformation {
    Identity,
    SquareRoot,
    /// Natural log, with non-positive intensities mapped to 0
    NaturalLog,
}

impl Transformation {
    pub fn transform(&self, intensity: f64) -> f64 {
        match self {
            Transformation::Identity => intensity,
            Transformation::SquareRoot => intensity.max(0.0).sqrt(),
            Transformation::NaturalLog => {
                if intensity > 0.0 {
                    intensity.ln()
                } else {
                    0.0
                }
            }
        }
    }
}

impl TryFrom<u32> for Transformation {
    type Error = DomainError;

    fn try_from(index: u32) -> Result<Self> {
        match index {
            0 => Ok(Transformation::Identity),
            1 => Ok(Transformation::SquareRoot),
            2 => Ok(Transformation::NaturalLog),
            _ => Err(DomainError::UnsupportedStrategy {
                kind: "transformation",
                index,
            }),
        }
    }
}
