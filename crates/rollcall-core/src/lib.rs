//! rollcall-core — Face verification pipeline.
//!
//! One fixed pipeline: detect a single face, predict its 68 landmarks,
//! encode a 128-dimensional descriptor, and compare descriptors by
//! Euclidean distance against a configured tolerance. All three model
//! stages run via ONNX Runtime for CPU inference.

pub mod alignment;
pub mod compare;
pub mod detector;
pub mod encoder;
pub mod extractor;
pub mod landmarks;
pub mod registry;
pub mod types;
pub mod verify;

pub use compare::{compare_descriptors, identify, GalleryEntry, GalleryMatch, ABSENT_DISTANCE};
pub use extractor::{ExtractError, Extraction, Extractor};
pub use registry::{default_model_dir, ModelLoadError, ModelPaths, ModelRegistry};
pub use types::{Descriptor, FaceRegion, Landmarks, MatchResult, DESCRIPTOR_LEN, LANDMARK_COUNT};
pub use verify::{verify, VerificationOutcome, VerifyError};
