// Spectral similarity strategies

pub mod comparator;
pub mod transformation;
pub mod vectorization;

pub use comparator::{
    CrossCorrelation, EuclideanDistance, NormalizedDotProduct, PearsonCorrelation,
    PreparedQuery, SpectrumComparator,
};
pub use transformation::Transformation;
pub use vectorization::{ProfileShape, SpectrumVector, Vectorization};

use crate::domain::error::{DomainError, Result};
use crate::domain::settings::SpecSimSettings;

/// Resolve the strategy indices of `settings` into a ready comparator.
///
/// Unknown indices and unsupported combinations are rejected here, before any
/// spectrum is touched.
pub fn build_comparator(settings: &SpecSimSettings) -> Result<Box<dyn SpectrumComparator>> {
    let vectorization = Vectorization::from_settings(settings)?;
    let transformation = Transformation::try_from(settings.trafo_index)?;

    let comparator: Box<dyn SpectrumComparator> = match settings.comp_index {
        0 => Box::new(EuclideanDistance::new(vectorization, transformation)),
        1 => Box::new(NormalizedDotProduct::new(vectorization, transformation)),
        2 => Box::new(PearsonCorrelation::new(vectorization, transformation)),
        3 => {
            if !vectorization.is_binned() {
                return Err(DomainError::UnsupportedCombination(
                    "cross-correlation requires a binned vectorization".to_string(),
                ));
            }
            Box::new(CrossCorrelation::new(
                vectorization,
                transformation,
                settings.xcorr_offset,
            ))
        }
        index => {
            return Err(DomainError::UnsupportedStrategy {
                kind: "comparator",
                index,
            })
        }
    };
    Ok(comparator)
}
