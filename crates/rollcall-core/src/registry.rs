//! One-shot model registry.
//!
//! The pipeline depends on three pretrained ONNX artifacts: the frontal-face
//! detector, the 68-point landmark predictor, and the descriptor encoder.
//! Loading is disk-read plus model deserialization, so the registry is built
//! exactly once at process start and reused by every extraction; a missing or
//! malformed file is fatal because no call can proceed without it.

use crate::detector::{DetectorError, FaceDetector};
use crate::encoder::{EncoderError, FaceEncoder};
use crate::landmarks::{LandmarkError, LandmarkPredictor};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Fixed artifact filenames inside the model directory.
pub const DETECTOR_MODEL_FILE: &str = "frontal_face_detector.onnx";
pub const LANDMARK_MODEL_FILE: &str = "shape_predictor_68.onnx";
pub const ENCODER_MODEL_FILE: &str = "face_encoder_resnet_v1.onnx";

#[derive(Error, Debug)]
pub enum ModelLoadError {
    #[error("face detector: {0}")]
    Detector(#[from] DetectorError),
    #[error("landmark predictor: {0}")]
    Landmarks(#[from] LandmarkError),
    #[error("descriptor encoder: {0}")]
    Encoder(#[from] EncoderError),
}

/// Resolved locations of the three model artifacts.
#[derive(Debug, Clone)]
pub struct ModelPaths {
    pub detector: PathBuf,
    pub landmarks: PathBuf,
    pub encoder: PathBuf,
}

impl ModelPaths {
    /// Join the fixed artifact filenames onto a model directory.
    pub fn from_dir(dir: &Path) -> Self {
        Self {
            detector: dir.join(DETECTOR_MODEL_FILE),
            landmarks: dir.join(LANDMARK_MODEL_FILE),
            encoder: dir.join(ENCODER_MODEL_FILE),
        }
    }
}

/// Default model directory: `$XDG_DATA_HOME/rollcall/models`, falling back
/// to `~/.local/share/rollcall/models`.
pub fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("rollcall/models")
}

/// The loaded model bundle.
///
/// Logically read-only after construction; session invocation takes
/// `&mut self`, so hosts with concurrent workers give each worker its own
/// registry. The registry itself holds no per-request state.
#[derive(Debug)]
pub struct ModelRegistry {
    pub detector: FaceDetector,
    pub landmarks: LandmarkPredictor,
    pub encoder: FaceEncoder,
}

impl ModelRegistry {
    /// Load all three models, failing fast on the first missing or
    /// malformed artifact.
    pub fn load(paths: &ModelPaths) -> Result<Self, ModelLoadError> {
        let detector = FaceDetector::load(&paths.detector)?;
        let landmarks = LandmarkPredictor::load(&paths.landmarks)?;
        let encoder = FaceEncoder::load(&paths.encoder)?;
        tracing::info!("model registry loaded");

        Ok(Self { detector, landmarks, encoder })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_paths_from_dir() {
        let paths = ModelPaths::from_dir(Path::new("/srv/models"));
        assert_eq!(paths.detector, Path::new("/srv/models/frontal_face_detector.onnx"));
        assert_eq!(paths.landmarks, Path::new("/srv/models/shape_predictor_68.onnx"));
        assert_eq!(paths.encoder, Path::new("/srv/models/face_encoder_resnet_v1.onnx"));
    }

    #[test]
    fn test_load_missing_detector_fails() {
        let paths = ModelPaths::from_dir(Path::new("/nonexistent/model/dir"));
        let err = ModelRegistry::load(&paths).unwrap_err();
        assert!(matches!(
            err,
            ModelLoadError::Detector(DetectorError::ModelNotFound(_))
        ));
        // The offending path is named in the message.
        assert!(err.to_string().contains("frontal_face_detector.onnx"));
    }
}
