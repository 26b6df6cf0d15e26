use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Length of a face descriptor vector.
pub const DESCRIPTOR_LEN: usize = 128;

/// Number of points in a landmark set.
pub const LANDMARK_COUNT: usize = 68;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("descriptor must have {DESCRIPTOR_LEN} values, got {0}")]
pub struct DescriptorLengthError(pub usize);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("landmark set must have {LANDMARK_COUNT} points, got {0}")]
pub struct LandmarkCountError(pub usize);

/// Face descriptor: a 128-dimensional identity embedding.
///
/// Serializes as a bare JSON array of floats, the format descriptor files
/// are stored in. Deserialization enforces the length, so a stored vector of
/// the wrong shape fails at parse time rather than during comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f32>", into = "Vec<f32>")]
pub struct Descriptor {
    values: Vec<f32>,
}

impl Descriptor {
    pub fn new(values: Vec<f32>) -> Result<Self, DescriptorLengthError> {
        if values.len() != DESCRIPTOR_LEN {
            return Err(DescriptorLengthError(values.len()));
        }
        Ok(Self { values })
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Euclidean distance to another descriptor.
    pub fn distance(&self, other: &Descriptor) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

impl TryFrom<Vec<f32>> for Descriptor {
    type Error = DescriptorLengthError;

    fn try_from(values: Vec<f32>) -> Result<Self, Self::Error> {
        Self::new(values)
    }
}

impl From<[f32; DESCRIPTOR_LEN]> for Descriptor {
    fn from(values: [f32; DESCRIPTOR_LEN]) -> Self {
        Self { values: values.to_vec() }
    }
}

impl From<Descriptor> for Vec<f32> {
    fn from(descriptor: Descriptor) -> Self {
        descriptor.values
    }
}

/// Face bounding region in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceRegion {
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
    pub left: i64,
}

impl FaceRegion {
    /// Clamp raw bounds to an image. Each edge clamps independently: top and
    /// left floor at zero, right and bottom cap at the image dimensions. One
    /// edge clamping never re-derives the opposite edge.
    pub fn clamped(top: i64, right: i64, bottom: i64, left: i64, width: u32, height: u32) -> Self {
        Self {
            top: top.max(0),
            right: right.min(width as i64),
            bottom: bottom.min(height as i64),
            left: left.max(0),
        }
    }

    pub fn width(&self) -> i64 {
        self.right - self.left
    }

    pub fn height(&self) -> i64 {
        self.bottom - self.top
    }
}

/// The 68 facial landmark points, in the predictor's canonical order
/// (jaw 0-16, brows 17-26, nose 27-35, eyes 36-47, lips 48-67).
/// Serializes as an array of `[x, y]` pairs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Landmarks {
    points: Vec<(i64, i64)>,
}

impl Landmarks {
    pub fn from_points(points: Vec<(i64, i64)>) -> Result<Self, LandmarkCountError> {
        if points.len() != LANDMARK_COUNT {
            return Err(LandmarkCountError(points.len()));
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[(i64, i64)] {
        &self.points
    }
}

impl From<[(i64, i64); LANDMARK_COUNT]> for Landmarks {
    fn from(points: [(i64, i64); LANDMARK_COUNT]) -> Self {
        Self { points: points.to_vec() }
    }
}

/// Outcome of comparing two descriptors under a tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub is_match: bool,
    pub distance: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor_with(dim0: f32, dim1: f32) -> Descriptor {
        let mut values = [0.0f32; DESCRIPTOR_LEN];
        values[0] = dim0;
        values[1] = dim1;
        Descriptor::from(values)
    }

    #[test]
    fn test_descriptor_length_enforced() {
        assert_eq!(Descriptor::new(vec![0.0; 127]), Err(DescriptorLengthError(127)));
        assert_eq!(Descriptor::new(vec![]), Err(DescriptorLengthError(0)));
        assert!(Descriptor::new(vec![0.0; DESCRIPTOR_LEN]).is_ok());
    }

    #[test]
    fn test_descriptor_distance_identical() {
        let a = descriptor_with(1.0, 2.0);
        assert_eq!(a.distance(&a), 0.0);
    }

    #[test]
    fn test_descriptor_distance_known_value() {
        // Differs by (3, 4) in two dimensions: distance is exactly 5.
        let a = descriptor_with(0.0, 0.0);
        let b = descriptor_with(3.0, 4.0);
        assert_eq!(a.distance(&b), 5.0);
    }

    #[test]
    fn test_descriptor_distance_symmetric() {
        let a = descriptor_with(0.25, -1.5);
        let b = descriptor_with(-0.75, 2.0);
        assert_eq!(a.distance(&b), b.distance(&a));
    }

    #[test]
    fn test_descriptor_json_is_bare_array() {
        let d = descriptor_with(1.5, 0.0);
        let json = serde_json::to_string(&d).unwrap();
        assert!(json.starts_with("[1.5,"), "expected bare array, got {json}");

        let back: Descriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(back, d);
    }

    #[test]
    fn test_descriptor_json_wrong_shape_rejected() {
        assert!(serde_json::from_str::<Descriptor>("[1.0, 2.0, 3.0]").is_err());
        assert!(serde_json::from_str::<Descriptor>("\"not numbers\"").is_err());
    }

    #[test]
    fn test_region_clamp_interior_untouched() {
        let r = FaceRegion::clamped(10, 90, 110, 20, 200, 200);
        assert_eq!(r, FaceRegion { top: 10, right: 90, bottom: 110, left: 20 });
    }

    #[test]
    fn test_region_clamp_per_edge() {
        // Only the edges that overflow move; the opposite edges stay put.
        let r = FaceRegion::clamped(-15, 90, 110, 20, 200, 200);
        assert_eq!(r, FaceRegion { top: 0, right: 90, bottom: 110, left: 20 });

        let r = FaceRegion::clamped(10, 250, 110, 20, 200, 200);
        assert_eq!(r, FaceRegion { top: 10, right: 200, bottom: 110, left: 20 });

        let r = FaceRegion::clamped(10, 90, 230, -5, 200, 200);
        assert_eq!(r, FaceRegion { top: 10, right: 90, bottom: 200, left: 0 });
    }

    #[test]
    fn test_region_bounds_invariant() {
        // Detections that intersect the image always clamp to ordered bounds
        // within [0, width] x [0, height].
        let cases = [
            (-20, 150, 260, -10),
            (5, 100, 120, 30),
            (0, 200, 200, 0),
            (-1, 201, 199, 1),
        ];
        for (top, right, bottom, left) in cases {
            let r = FaceRegion::clamped(top, right, bottom, left, 200, 200);
            assert!(0 <= r.top && r.top <= r.bottom && r.bottom <= 200, "{r:?}");
            assert!(0 <= r.left && r.left <= r.right && r.right <= 200, "{r:?}");
        }
    }

    #[test]
    fn test_region_dimensions() {
        let r = FaceRegion { top: 10, right: 90, bottom: 110, left: 20 };
        assert_eq!(r.width(), 70);
        assert_eq!(r.height(), 100);
    }

    #[test]
    fn test_landmark_count_enforced() {
        assert_eq!(
            Landmarks::from_points(vec![(0, 0); 5]),
            Err(LandmarkCountError(5))
        );
        let lm = Landmarks::from_points(vec![(3, 4); LANDMARK_COUNT]).unwrap();
        assert_eq!(lm.points().len(), LANDMARK_COUNT);
    }

    #[test]
    fn test_landmarks_serialize_as_pairs() {
        let lm = Landmarks::from([(7, 9); LANDMARK_COUNT]);
        let value = serde_json::to_value(&lm).unwrap();
        let array = value.as_array().unwrap();
        assert_eq!(array.len(), LANDMARK_COUNT);
        assert_eq!(array[0], serde_json::json!([7, 9]));
    }
}
