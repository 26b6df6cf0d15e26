//! 68-point facial landmark predictor via ONNX Runtime.
//!
//! The predictor consumes the face crop named by a detector box, resized to
//! a 128×128 RGB input, and emits 136 floats: the 68 canonical (x, y) pairs
//! interleaved, in input-pixel coordinates. Postprocessing maps them back
//! into the coordinate frame of the original image. Point order follows the
//! iBUG annotation scheme (jaw 0-16, brows 17-26, nose 27-35, eyes 36-47,
//! lips 48-67) and is never reordered here.

use crate::detector::Detection;
use crate::types::LANDMARK_COUNT;
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const LANDMARK_INPUT_SIZE: usize = 128;
const LANDMARK_OUTPUT_LEN: usize = LANDMARK_COUNT * 2;

#[derive(Error, Debug)]
pub enum LandmarkError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// The crop rectangle a detection names, kept in float image coordinates.
///
/// Deliberately unclamped: a detection that extends past the image edge
/// still defines the predictor's coordinate frame, and sampling fills the
/// out-of-bounds part with black.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropBox {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl From<&Detection> for CropBox {
    fn from(detection: &Detection) -> Self {
        Self {
            left: detection.left,
            top: detection.top,
            width: detection.right - detection.left,
            height: detection.bottom - detection.top,
        }
    }
}

/// 68-point landmark regressor.
#[derive(Debug)]
pub struct LandmarkPredictor {
    session: Session,
}

impl LandmarkPredictor {
    /// Load the landmark ONNX model from the given path.
    pub fn load(model_path: &Path) -> Result<Self, LandmarkError> {
        if !model_path.exists() {
            return Err(LandmarkError::ModelNotFound(
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
            "loaded landmark predictor model"
        );

        Ok(Self { session })
    }

    /// Predict the 68 landmark points for one detected face.
    ///
    /// Returns the points as floats in original-image coordinates, in
    /// canonical order.
    pub fn predict(
        &mut self,
        image: &RgbImage,
        detection: &Detection,
    ) -> Result<Vec<(f32, f32)>, LandmarkError> {
        let crop = CropBox::from(detection);
        let input = crop_to_tensor(image, &crop, LANDMARK_INPUT_SIZE);

        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| LandmarkError::InferenceFailed(format!("landmark regression: {e}")))?;

        if raw.len() != LANDMARK_OUTPUT_LEN {
            return Err(LandmarkError::InferenceFailed(format!(
                "expected {LANDMARK_OUTPUT_LEN} outputs (68 x/y pairs), got {}",
                raw.len()
            )));
        }

        let points = to_image_points(raw, &crop, LANDMARK_INPUT_SIZE);
        tracing::debug!(count = points.len(), "landmarks predicted");
        Ok(points)
    }
}

/// Sample the crop box into a normalized NCHW tensor.
///
/// Bilinear sampling in the crop's own frame; source pixels outside the
/// image contribute black.
fn crop_to_tensor(image: &RgbImage, crop: &CropBox, input_size: usize) -> Array4<f32> {
    let (width, height) = image.dimensions();
    let mut tensor = Array4::<f32>::zeros((1, 3, input_size, input_size));

    let sample = |x: i32, y: i32, c: usize| -> f32 {
        if x >= 0 && x < width as i32 && y >= 0 && y < height as i32 {
            image.get_pixel(x as u32, y as u32).0[c] as f32
        } else {
            0.0
        }
    };

    for ty in 0..input_size {
        for tx in 0..input_size {
            // Pixel-center mapping from tensor space to the crop rectangle.
            let sx = crop.left + (tx as f32 + 0.5) * crop.width / input_size as f32 - 0.5;
            let sy = crop.top + (ty as f32 + 0.5) * crop.height / input_size as f32 - 0.5;

            let x0 = sx.floor() as i32;
            let y0 = sy.floor() as i32;
            let fx = sx - x0 as f32;
            let fy = sy - y0 as f32;

            for c in 0..3 {
                let val = sample(x0, y0, c) * (1.0 - fx) * (1.0 - fy)
                    + sample(x0 + 1, y0, c) * fx * (1.0 - fy)
                    + sample(x0, y0 + 1, c) * (1.0 - fx) * fy
                    + sample(x0 + 1, y0 + 1, c) * fx * fy;
                tensor[[0, c, ty, tx]] = val / 255.0;
            }
        }
    }

    tensor
}

/// Map raw model output (input-pixel coordinates) back to image coordinates.
fn to_image_points(raw: &[f32], crop: &CropBox, input_size: usize) -> Vec<(f32, f32)> {
    raw.chunks_exact(2)
        .map(|pair| {
            (
                crop.left + pair[0] * crop.width / input_size as f32,
                crop.top + pair[1] * crop.height / input_size as f32,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn crop(left: f32, top: f32, width: f32, height: f32) -> CropBox {
        CropBox { left, top, width, height }
    }

    #[test]
    fn test_crop_box_from_detection() {
        let d = Detection {
            left: 10.0,
            top: 20.0,
            right: 110.0,
            bottom: 170.0,
            confidence: 0.9,
        };
        let c = CropBox::from(&d);
        assert_eq!(c, crop(10.0, 20.0, 100.0, 150.0));
    }

    #[test]
    fn test_crop_to_tensor_shape_and_range() {
        let image = RgbImage::from_pixel(64, 64, Rgb([255, 128, 0]));
        let tensor = crop_to_tensor(&image, &crop(0.0, 0.0, 64.0, 64.0), 128);
        assert_eq!(tensor.shape(), &[1, 3, 128, 128]);

        // Interior sample carries the /255 normalized channel values.
        assert!((tensor[[0, 0, 64, 64]] - 1.0).abs() < 1e-3);
        assert!((tensor[[0, 1, 64, 64]] - 128.0 / 255.0).abs() < 1e-2);
        assert!(tensor[[0, 2, 64, 64]].abs() < 1e-3);
    }

    #[test]
    fn test_crop_to_tensor_out_of_bounds_black() {
        // A crop hanging half off the left edge samples black there.
        let image = RgbImage::from_pixel(32, 32, Rgb([200, 200, 200]));
        let tensor = crop_to_tensor(&image, &crop(-32.0, 0.0, 64.0, 32.0), 128);
        assert_eq!(tensor[[0, 0, 10, 10]], 0.0);
        assert!(tensor[[0, 0, 10, 100]] > 0.5);
    }

    #[test]
    fn test_to_image_points_mapping() {
        // Output (64, 64) at input size 128 is the crop center.
        let raw = [64.0f32, 64.0, 0.0, 128.0];
        let points = to_image_points(&raw, &crop(10.0, 20.0, 100.0, 50.0), 128);
        assert_eq!(points.len(), 2);
        assert!((points[0].0 - 60.0).abs() < 1e-4);
        assert!((points[0].1 - 45.0).abs() < 1e-4);
        // (0, 128) maps to the crop's left edge, bottom edge.
        assert!((points[1].0 - 10.0).abs() < 1e-4);
        assert!((points[1].1 - 70.0).abs() < 1e-4);
    }

    #[test]
    fn test_to_image_points_count() {
        let raw = vec![1.0f32; LANDMARK_OUTPUT_LEN];
        let points = to_image_points(&raw, &crop(0.0, 0.0, 128.0, 128.0), 128);
        assert_eq!(points.len(), LANDMARK_COUNT);
    }
}
