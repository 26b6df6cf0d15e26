//! Descriptor comparison and gallery identification.

use crate::types::{Descriptor, MatchResult};

/// Distance reported when either descriptor is absent. A fixed sentinel,
/// not derived from the metric: it is finite and loggable, fails the usual
/// operating tolerances, and is deliberately neither the tolerance nor
/// infinity.
pub const ABSENT_DISTANCE: f32 = 1.0;

/// Compare a known descriptor against an unknown one under a tolerance.
///
/// Either side absent yields `(false, 1.0)` exactly. Otherwise the distance
/// is the Euclidean norm of the element-wise difference, and the threshold
/// is inclusive: `distance == tolerance` is a match.
pub fn compare_descriptors(
    known: Option<&Descriptor>,
    unknown: Option<&Descriptor>,
    tolerance: f32,
) -> MatchResult {
    let (Some(known), Some(unknown)) = (known, unknown) else {
        return MatchResult { is_match: false, distance: ABSENT_DISTANCE };
    };

    let distance = known.distance(unknown);
    MatchResult { is_match: distance <= tolerance, distance }
}

/// One enrolled identity in the gallery.
#[derive(Debug, Clone)]
pub struct GalleryEntry {
    pub label: String,
    pub descriptor: Descriptor,
}

/// Result of identifying a probe against the gallery.
#[derive(Debug, Clone, PartialEq)]
pub struct GalleryMatch {
    pub is_match: bool,
    pub distance: f32,
    /// Label of the closest entry when it falls within tolerance.
    pub label: Option<String>,
}

/// Identify a probe descriptor against every enrolled entry.
///
/// Full traversal with no early exit; the closest entry by Euclidean
/// distance wins, under the same inclusive tolerance as 1:1 comparison. An
/// empty gallery behaves like an absent comparison: `(false, 1.0, None)`.
pub fn identify(probe: &Descriptor, gallery: &[GalleryEntry], tolerance: f32) -> GalleryMatch {
    let mut best_distance = f32::INFINITY;
    let mut best_idx: Option<usize> = None;

    for (i, entry) in gallery.iter().enumerate() {
        let distance = probe.distance(&entry.descriptor);
        if distance < best_distance {
            best_distance = distance;
            best_idx = Some(i);
        }
    }

    match best_idx {
        Some(idx) if best_distance <= tolerance => GalleryMatch {
            is_match: true,
            distance: best_distance,
            label: Some(gallery[idx].label.clone()),
        },
        Some(_) => GalleryMatch {
            is_match: false,
            distance: best_distance,
            label: None,
        },
        None => GalleryMatch {
            is_match: false,
            distance: ABSENT_DISTANCE,
            label: None,
        },
    }
}
