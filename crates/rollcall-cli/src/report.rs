//! Stdout JSON report shapes.
//!
//! All values are plain numeric fields; `confidence` carries the raw
//! descriptor distance. Verification failures ("no face", "invalid stored
//! descriptor") are reports with an `error` field, not process errors.

use chrono::{DateTime, Utc};
use rollcall_core::{FaceRegion, Landmarks};
use serde::Serialize;

#[derive(Serialize)]
pub struct FaceLocation {
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
    pub left: i64,
}

impl From<&FaceRegion> for FaceLocation {
    fn from(region: &FaceRegion) -> Self {
        Self {
            top: region.top,
            right: region.right,
            bottom: region.bottom,
            left: region.left,
        }
    }
}

fn landmark_pairs(landmarks: &Landmarks) -> Vec<[i64; 2]> {
    landmarks.points().iter().map(|&(x, y)| [x, y]).collect()
}

/// Report for `rollcall verify`.
#[derive(Serialize)]
pub struct VerifyReport {
    #[serde(rename = "match")]
    pub is_match: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    pub face_location: Option<FaceLocation>,
    pub landmarks: Option<Vec<[i64; 2]>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VerifyReport {
    pub fn decision(
        is_match: bool,
        distance: f32,
        region: &FaceRegion,
        landmarks: &Landmarks,
    ) -> Self {
        Self {
            is_match,
            confidence: Some(distance),
            face_location: Some(region.into()),
            landmarks: Some(landmark_pairs(landmarks)),
            error: None,
        }
    }

    pub fn failure(message: &str) -> Self {
        Self {
            is_match: false,
            confidence: None,
            face_location: None,
            landmarks: None,
            error: Some(message.to_string()),
        }
    }
}

/// Report for `rollcall encode`.
#[derive(Serialize)]
pub struct EncodeReport {
    pub output: String,
    pub generated_at: DateTime<Utc>,
    pub face_location: FaceLocation,
    pub landmarks: Vec<[i64; 2]>,
}

impl EncodeReport {
    pub fn new(output: String, region: &FaceRegion, landmarks: &Landmarks) -> Self {
        Self {
            output,
            generated_at: Utc::now(),
            face_location: region.into(),
            landmarks: landmark_pairs(landmarks),
        }
    }
}

/// Report for `rollcall compare`.
#[derive(Serialize)]
pub struct CompareReport {
    #[serde(rename = "match")]
    pub is_match: bool,
    pub distance: f32,
}

/// Report for `rollcall identify`.
#[derive(Serialize)]
pub struct IdentifyReport {
    #[serde(rename = "match")]
    pub is_match: bool,
    pub distance: f32,
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_core::LANDMARK_COUNT;

    #[test]
    fn test_verify_decision_wire_shape() {
        let region = FaceRegion { top: 5, right: 95, bottom: 105, left: 15 };
        let landmarks = Landmarks::from([(30, 40); LANDMARK_COUNT]);
        let report = VerifyReport::decision(true, 0.42, &region, &landmarks);

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["match"], serde_json::json!(true));
        assert!((value["confidence"].as_f64().unwrap() - 0.42).abs() < 1e-6);
        assert_eq!(value["face_location"]["top"], serde_json::json!(5));
        assert_eq!(value["face_location"]["left"], serde_json::json!(15));
        assert_eq!(value["landmarks"].as_array().unwrap().len(), LANDMARK_COUNT);
        assert_eq!(value["landmarks"][0], serde_json::json!([30, 40]));
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_verify_failure_wire_shape() {
        let report = VerifyReport::failure("No face detected in the image.");
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["match"], serde_json::json!(false));
        assert_eq!(value["error"], serde_json::json!("No face detected in the image."));
        assert_eq!(value["face_location"], serde_json::Value::Null);
        assert_eq!(value["landmarks"], serde_json::Value::Null);
        assert!(value.get("confidence").is_none());
    }

    #[test]
    fn test_compare_report_renames_match() {
        let report = CompareReport { is_match: false, distance: 0.9 };
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"match\":false"), "{json}");
    }
}
