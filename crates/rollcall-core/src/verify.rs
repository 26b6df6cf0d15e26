//! Verification orchestration: one live capture against one stored identity.
//!
//! The stored vector's shape is validated before any model runs; an invalid
//! stored descriptor must never cost an extraction. "No face" and "no match"
//! are data, reported through the outcome, never through `Err`.

use crate::compare::compare_descriptors;
use crate::extractor::{ExtractError, Extractor};
use crate::types::{Descriptor, DescriptorLengthError, FaceRegion, Landmarks};
use image::RgbImage;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("invalid stored descriptor: {0}")]
    InvalidStoredDescriptor(#[from] DescriptorLengthError),
    #[error(transparent)]
    Extract(#[from] ExtractError),
}

/// Structured result of a verification.
///
/// `NoFace` is an input-quality outcome, distinct from a biometric
/// mismatch; callers record the two differently.
#[derive(Debug, Clone, Serialize)]
pub enum VerificationOutcome {
    NoFace,
    Decision {
        is_match: bool,
        distance: f32,
        region: FaceRegion,
        landmarks: Landmarks,
    },
}

impl VerificationOutcome {
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Decision { is_match: true, .. })
    }
}

/// Verify a live image against a stored descriptor vector.
pub fn verify<E: Extractor>(
    extractor: &mut E,
    stored: &[f32],
    image: &RgbImage,
    tolerance: f32,
) -> Result<VerificationOutcome, VerifyError> {
    let stored = Descriptor::new(stored.to_vec())?;

    let Some(extraction) = extractor.extract(image)? else {
        tracing::debug!("verification: no face in live image");
        return Ok(VerificationOutcome::NoFace);
    };

    let result = compare_descriptors(Some(&stored), Some(&extraction.descriptor), tolerance);
    tracing::debug!(
        is_match = result.is_match,
        distance = result.distance,
        "verification decided"
    );

    Ok(VerificationOutcome::Decision {
        is_match: result.is_match,
        distance: result.distance,
        region: extraction.region,
        landmarks: extraction.landmarks,
    })
}
