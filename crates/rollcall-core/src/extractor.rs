//! Descriptor extraction: detect → landmark → encode on one image.
//!
//! The pipeline's selection rule is deliberate: when the detector reports
//! more than one face, exactly the first entry in its native output order is
//! used. No size or confidence re-ranking happens here, since reordering
//! would change observable behavior on multi-face images.

use crate::detector::DetectorError;
use crate::encoder::EncoderError;
use crate::landmarks::LandmarkError;
use crate::registry::ModelRegistry;
use crate::types::{Descriptor, FaceRegion, Landmarks};
use image::RgbImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("detection: {0}")]
    Detector(#[from] DetectorError),
    #[error("landmarking: {0}")]
    Landmarks(#[from] LandmarkError),
    #[error("encoding: {0}")]
    Encoder(#[from] EncoderError),
}

/// The jointly-present outputs of a successful extraction.
///
/// Either a face was found and all three fields exist, or no face was found
/// and the whole extraction is absent; there is no partial state.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub descriptor: Descriptor,
    pub region: FaceRegion,
    pub landmarks: Landmarks,
}

/// Source of face descriptors. The seam lets orchestration be exercised
/// without loaded models.
pub trait Extractor {
    /// Extract the descriptor, region, and landmarks for the first detected
    /// face, or `None` when the image contains no detectable face. A
    /// faceless image is a normal outcome, never an error.
    fn extract(&mut self, image: &RgbImage) -> Result<Option<Extraction>, ExtractError>;
}

impl Extractor for ModelRegistry {
    fn extract(&mut self, image: &RgbImage) -> Result<Option<Extraction>, ExtractError> {
        let detections = self.detector.detect(image)?;

        // First in native detector order; the order is authoritative.
        let Some(detection) = detections.first() else {
            tracing::debug!("no face detected");
            return Ok(None);
        };

        let points = self.landmarks.predict(image, detection)?;
        let descriptor = self.encoder.encode(image, &points)?;

        let (width, height) = image.dimensions();
        let region = detection.to_region(width, height);

        let rounded: Vec<(i64, i64)> = points
            .iter()
            .map(|&(x, y)| (x.round() as i64, y.round() as i64))
            .collect();
        let landmarks = Landmarks::from_points(rounded)
            .map_err(|e| LandmarkError::InferenceFailed(e.to_string()))?;

        tracing::debug!(?region, "extraction complete");
        Ok(Some(Extraction { descriptor, region, landmarks }))
    }
}
