//! Face descriptor encoder via ONNX Runtime.
//!
//! Produces the 128-dimensional identity embedding from a 150×150 aligned
//! RGB chip. Each call renders five jittered chips through small random
//! perturbations of the alignment transform and averages their embeddings,
//! which damps crop-boundary noise. The jitter RNG is seeded with a fixed
//! constant per call, so encoding the same image twice yields the same
//! descriptor.

use crate::alignment::{self, CHIP_SIZE};
use crate::types::{Descriptor, DESCRIPTOR_LEN};
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::Path;
use thiserror::Error;

const ENCODER_MEAN: f32 = 127.5;
const ENCODER_STD: f32 = 128.0;

/// Fixed number of jittered chips averaged per descriptor. Descriptors are
/// only comparable across identical jitter configuration, so this is not a
/// caller knob.
const JITTER_COUNT: usize = 5;

/// Fixed per-call jitter seed. Extraction must be idempotent: the same
/// image always renders the same five perturbed chips.
const JITTER_SEED: u64 = 0x5eed;

#[derive(Error, Debug)]
pub enum EncoderError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Descriptor encoder over an aligned face chip.
#[derive(Debug)]
pub struct FaceEncoder {
    session: Session,
}

impl FaceEncoder {
    /// Load the encoder ONNX model from the given path.
    pub fn load(model_path: &Path) -> Result<Self, EncoderError> {
        if !model_path.exists() {
            return Err(EncoderError::ModelNotFound(
                model_path.display().to_string(),
            ));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = %model_path.display(),
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded face encoder model"
        );

        Ok(Self { session })
    }

    /// Encode a face into its 128-dimensional descriptor.
    ///
    /// `landmarks` are the 68 predicted points in image coordinates; the
    /// alignment anchors and chip transform are derived from them.
    pub fn encode(
        &mut self,
        image: &RgbImage,
        landmarks: &[(f32, f32)],
    ) -> Result<Descriptor, EncoderError> {
        let anchors = alignment::anchor_points(landmarks);
        let base = alignment::estimate_chip_transform(&anchors);
        let mut rng = StdRng::seed_from_u64(JITTER_SEED);

        let mut sum = [0.0f32; DESCRIPTOR_LEN];
        for jitter in 0..JITTER_COUNT {
            let matrix = alignment::perturbed(&base, &mut rng, CHIP_SIZE as f32);
            let chip = alignment::warp_chip(image, &matrix, CHIP_SIZE);
            let embedding = self.embed_chip(&chip)?;
            for (acc, v) in sum.iter_mut().zip(embedding.iter()) {
                *acc += v;
            }
            tracing::debug!(jitter, "encoded jittered chip");
        }

        let values = sum.iter().map(|v| v / JITTER_COUNT as f32).collect();
        // Length already checked per chip.
        Descriptor::new(values).map_err(|e| EncoderError::InferenceFailed(e.to_string()))
    }

    /// Run one chip through the embedding network.
    fn embed_chip(&mut self, chip: &RgbImage) -> Result<Vec<f32>, EncoderError> {
        let input = preprocess(chip);
        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| EncoderError::InferenceFailed(format!("embedding extraction: {e}")))?;

        if raw.len() != DESCRIPTOR_LEN {
            return Err(EncoderError::InferenceFailed(format!(
                "expected {DESCRIPTOR_LEN}-dim embedding, got {}",
                raw.len()
            )));
        }

        Ok(raw.to_vec())
    }
}

/// Normalize a 150×150 RGB chip into a NCHW float tensor.
fn preprocess(chip: &RgbImage) -> Array4<f32> {
    let size = CHIP_SIZE as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));

    for y in 0..size {
        for x in 0..size {
            let pixel = chip.get_pixel(x as u32, y as u32);
            for c in 0..3 {
                tensor[[0, c, y, x]] = (pixel.0[c] as f32 - ENCODER_MEAN) / ENCODER_STD;
            }
        }
    }

    tensor
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_preprocess_output_shape() {
        let chip = RgbImage::from_pixel(CHIP_SIZE, CHIP_SIZE, Rgb([128, 128, 128]));
        let tensor = preprocess(&chip);
        assert_eq!(tensor.shape(), &[1, 3, CHIP_SIZE as usize, CHIP_SIZE as usize]);
    }

    #[test]
    fn test_preprocess_normalization() {
        let chip = RgbImage::from_pixel(CHIP_SIZE, CHIP_SIZE, Rgb([128, 0, 255]));
        let tensor = preprocess(&chip);
        assert!((tensor[[0, 0, 10, 10]] - (128.0 - ENCODER_MEAN) / ENCODER_STD).abs() < 1e-6);
        assert!((tensor[[0, 1, 10, 10]] - (0.0 - ENCODER_MEAN) / ENCODER_STD).abs() < 1e-6);
        assert!((tensor[[0, 2, 10, 10]] - (255.0 - ENCODER_MEAN) / ENCODER_STD).abs() < 1e-6);
    }

    #[test]
    fn test_jitter_configuration_fixed() {
        // The jitter count and seed are part of descriptor comparability;
        // pin them so a change is a deliberate one.
        assert_eq!(JITTER_COUNT, 5);
        assert_eq!(JITTER_SEED, 0x5eed);
    }
}
