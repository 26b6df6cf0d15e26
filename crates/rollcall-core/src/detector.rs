//! Frontal-face detector via ONNX Runtime.
//!
//! Anchor-based detector with 3-stride decoding and order-preserving NMS.
//! Input images go through a single fixed upsample pass before letterboxing,
//! and decoded coordinates are mapped back through both steps. Detections
//! are returned in anchor scan order (stride 8, then 16, then 32; row-major
//! cells; anchor index within a cell), which is deterministic for a given
//! image. Callers that need exactly one face take the first entry as-is.

use crate::types::FaceRegion;
use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const DETECTOR_INPUT_SIZE: usize = 640;
const DETECTOR_MEAN: f32 = 127.5;
const DETECTOR_STD: f32 = 128.0;
const DETECTOR_CONFIDENCE_THRESHOLD: f32 = 0.5;
const DETECTOR_NMS_THRESHOLD: f32 = 0.4;
const DETECTOR_STRIDES: [usize; 3] = [8, 16, 32];
const DETECTOR_ANCHORS_PER_CELL: usize = 2;
/// Single pyramid pass: the image is doubled before detection.
const DETECTOR_UPSAMPLE_FACTOR: u32 = 2;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// One raw detection in original-image coordinates, edges unclamped.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub confidence: f32,
}

impl Detection {
    /// Round this detection to integer bounds clamped to the image.
    pub fn to_region(&self, width: u32, height: u32) -> FaceRegion {
        FaceRegion::clamped(
            self.top.round() as i64,
            self.right.round() as i64,
            self.bottom.round() as i64,
            self.left.round() as i64,
            width,
            height,
        )
    }
}

/// Mapping from model input space back to original-image coordinates.
struct CoordMap {
    /// Letterbox fit scale (upsampled image to model input).
    scale: f32,
    pad_x: f32,
    pad_y: f32,
    /// Pyramid factor applied before letterboxing.
    upsample: f32,
}

impl CoordMap {
    fn to_image(&self, x: f32, y: f32) -> (f32, f32) {
        (
            (x - self.pad_x) / self.scale / self.upsample,
            (y - self.pad_y) / self.scale / self.upsample,
        )
    }
}

/// Output tensor indices for one stride: (score_idx, bbox_idx).
type StrideOutputIndices = (usize, usize);

/// Anchor-based frontal-face detector.
#[derive(Debug)]
pub struct FaceDetector {
    session: Session,
    input_height: usize,
    input_width: usize,
    /// Per-stride output indices [(score, bbox)] for strides [8, 16, 32].
    /// Discovered by name at load time; falls back to positional ordering.
    stride_indices: [StrideOutputIndices; 3],
}

impl FaceDetector {
    /// Load the detector ONNX model from the given path.
    pub fn load(model_path: &Path) -> Result<Self, DetectorError> {
        if !model_path.exists() {
            return Err(DetectorError::ModelNotFound(
                model_path.display().to_string(),
            ));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        let output_names: Vec<String> =
            session.outputs().iter().map(|o| o.name().to_string()).collect();
        let num_outputs = output_names.len();

        tracing::info!(
            path = %model_path.display(),
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?output_names,
            "loaded face detector model"
        );

        if num_outputs < 6 {
            return Err(DetectorError::InferenceFailed(format!(
                "detector model requires 6 outputs (3 strides x score/bbox), got {num_outputs}"
            )));
        }

        let stride_indices = discover_output_indices(&output_names);
        tracing::debug!(?stride_indices, "detector output tensor mapping");

        Ok(Self {
            session,
            input_height: DETECTOR_INPUT_SIZE,
            input_width: DETECTOR_INPUT_SIZE,
            stride_indices,
        })
    }

    /// Detect faces in an RGB image.
    ///
    /// Returns detections in anchor scan order. The order carries meaning:
    /// when callers want a single face they take the first entry, and no
    /// confidence or size re-ranking is applied here.
    pub fn detect(&mut self, image: &RgbImage) -> Result<Vec<Detection>, DetectorError> {
        let (width, height) = image.dimensions();
        let upsampled = imageops::resize(
            image,
            width * DETECTOR_UPSAMPLE_FACTOR,
            height * DETECTOR_UPSAMPLE_FACTOR,
            FilterType::Triangle,
        );

        let (input, map) = preprocess(&upsampled, self.input_width, self.input_height);

        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let mut detections = Vec::new();
        for (stride_pos, &stride) in DETECTOR_STRIDES.iter().enumerate() {
            let (score_idx, bbox_idx) = self.stride_indices[stride_pos];

            let (_, scores) = outputs[score_idx]
                .try_extract_tensor::<f32>()
                .map_err(|e| DetectorError::InferenceFailed(format!("scores stride {stride}: {e}")))?;
            let (_, deltas) = outputs[bbox_idx]
                .try_extract_tensor::<f32>()
                .map_err(|e| DetectorError::InferenceFailed(format!("bboxes stride {stride}: {e}")))?;

            detections.extend(decode_stride(
                scores,
                deltas,
                stride,
                self.input_width,
                self.input_height,
                &map,
                DETECTOR_CONFIDENCE_THRESHOLD,
            ));
        }

        let kept = suppress_overlaps(detections, DETECTOR_NMS_THRESHOLD);
        tracing::debug!(count = kept.len(), "faces detected");
        Ok(kept)
    }
}

/// Letterbox an image into a NCHW float tensor.
///
/// The image is fit within the input square by a uniform scale and centered;
/// padding is left at 0.0, which equals the normalized mean.
fn preprocess(image: &RgbImage, input_width: usize, input_height: usize) -> (Array4<f32>, CoordMap) {
    let (width, height) = image.dimensions();
    let scale_w = input_width as f32 / width as f32;
    let scale_h = input_height as f32 / height as f32;
    let scale = scale_w.min(scale_h);

    let new_w = (width as f32 * scale).round() as u32;
    let new_h = (height as f32 * scale).round() as u32;
    let pad_x = (input_width as f32 - new_w as f32) / 2.0;
    let pad_y = (input_height as f32 - new_h as f32) / 2.0;

    let resized = imageops::resize(image, new_w, new_h, FilterType::Triangle);

    let pad_x_start = pad_x.floor() as usize;
    let pad_y_start = pad_y.floor() as usize;

    let mut tensor = Array4::<f32>::zeros((1, 3, input_height, input_width));
    for y in 0..new_h as usize {
        for x in 0..new_w as usize {
            let pixel = resized.get_pixel(x as u32, y as u32);
            for c in 0..3 {
                tensor[[0, c, pad_y_start + y, pad_x_start + x]] =
                    (pixel.0[c] as f32 - DETECTOR_MEAN) / DETECTOR_STD;
            }
        }
    }

    let map = CoordMap {
        scale,
        pad_x,
        pad_y,
        upsample: DETECTOR_UPSAMPLE_FACTOR as f32,
    };
    (tensor, map)
}

/// Discover output tensor ordering by name.
///
/// Exports may name tensors "score_8", "bbox_16", ... or use generic numeric
/// names. Falls back to the standard positional ordering:
///   [0-2] = scores (strides 8, 16, 32)
///   [3-5] = bboxes (strides 8, 16, 32)
fn discover_output_indices(names: &[String]) -> [StrideOutputIndices; 3] {
    let find = |prefix: &str, stride: usize| -> Option<usize> {
        let target = format!("{prefix}_{stride}");
        names.iter().position(|n| n == &target)
    };

    let named = DETECTOR_STRIDES
        .iter()
        .all(|&stride| find("score", stride).is_some() && find("bbox", stride).is_some());

    if named {
        tracing::info!("detector: using name-based output tensor mapping");
        std::array::from_fn(|i| {
            let stride = DETECTOR_STRIDES[i];
            (find("score", stride).unwrap(), find("bbox", stride).unwrap())
        })
    } else {
        tracing::info!(
            ?names,
            "detector: output names not recognized, using positional mapping [0-2]=scores, [3-5]=bboxes"
        );
        [(0, 3), (1, 4), (2, 5)]
    }
}

/// Decode detections for a single stride level, in anchor scan order.
fn decode_stride(
    scores: &[f32],
    deltas: &[f32],
    stride: usize,
    input_width: usize,
    input_height: usize,
    map: &CoordMap,
    threshold: f32,
) -> Vec<Detection> {
    let grid_h = input_height / stride;
    let grid_w = input_width / stride;
    let num_anchors = grid_h * grid_w * DETECTOR_ANCHORS_PER_CELL;

    let mut detections = Vec::new();

    for idx in 0..num_anchors {
        let score = scores.get(idx).copied().unwrap_or(0.0);
        if score <= threshold {
            continue;
        }

        let cell_idx = idx / DETECTOR_ANCHORS_PER_CELL;
        let cy = (cell_idx / grid_w) as f32;
        let cx = (cell_idx % grid_w) as f32;

        let anchor_cx = cx * stride as f32;
        let anchor_cy = cy * stride as f32;

        // Deltas are [left, top, right, bottom] offsets from the anchor
        // center, in units of the stride.
        let off = idx * 4;
        if off + 3 >= deltas.len() {
            continue;
        }
        let x1 = anchor_cx - deltas[off] * stride as f32;
        let y1 = anchor_cy - deltas[off + 1] * stride as f32;
        let x2 = anchor_cx + deltas[off + 2] * stride as f32;
        let y2 = anchor_cy + deltas[off + 3] * stride as f32;

        let (left, top) = map.to_image(x1, y1);
        let (right, bottom) = map.to_image(x2, y2);

        detections.push(Detection {
            left,
            top,
            right,
            bottom,
            confidence: score,
        });
    }

    detections
}

/// Greedy IoU suppression that preserves input order.
///
/// Survivors are chosen by confidence, but emitted in the order they were
/// decoded: the winner of an overlap must not jump ahead of unrelated
/// earlier detections, since callers treat position as meaningful.
fn suppress_overlaps(detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    let mut by_confidence: Vec<usize> = (0..detections.len()).collect();
    by_confidence.sort_by(|&a, &b| {
        detections[b]
            .confidence
            .partial_cmp(&detections[a].confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut suppressed = vec![false; detections.len()];
    for (rank, &i) in by_confidence.iter().enumerate() {
        if suppressed[i] {
            continue;
        }
        for &j in &by_confidence[rank + 1..] {
            if !suppressed[j] && iou(&detections[i], &detections[j]) > iou_threshold {
                suppressed[j] = true;
            }
        }
    }

    detections
        .into_iter()
        .enumerate()
        .filter_map(|(i, d)| (!suppressed[i]).then_some(d))
        .collect()
}

/// Intersection-over-Union of two detections.
fn iou(a: &Detection, b: &Detection) -> f32 {
    let x1 = a.left.max(b.left);
    let y1 = a.top.max(b.top);
    let x2 = a.right.min(b.right);
    let y2 = a.bottom.min(b.bottom);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let area_a = (a.right - a.left) * (a.bottom - a.top);
    let area_b = (b.right - b.left) * (b.bottom - b.top);
    let union = area_a + area_b - inter;

    if union > 0.0 {
        inter / union
    } else {
        0.0
    }
}
