//! Subcommand handlers: the CLI is a caller of the core, responsible for
//! decoding images, reading and writing descriptor files, and printing the
//! JSON reports.

use crate::config::Config;
use crate::report::{CompareReport, EncodeReport, IdentifyReport, VerifyReport};
use anyhow::{bail, Context, Result};
use image::RgbImage;
use rollcall_core::{
    compare_descriptors, identify, verify, Descriptor, Extractor, GalleryEntry, ModelPaths,
    ModelRegistry, VerificationOutcome, VerifyError,
};
use std::fs;
use std::path::{Path, PathBuf};

const NO_FACE_MESSAGE: &str = "No face detected in the image.";
const INVALID_STORED_MESSAGE: &str = "Invalid stored descriptor.";

/// Decode an image file into the RGB buffer the core expects. A file that
/// fails to decode is surfaced here, before any model runs.
fn load_rgb_image(path: &Path) -> Result<RgbImage> {
    let image = image::open(path)
        .with_context(|| format!("failed to decode image {}", path.display()))?;
    Ok(image.to_rgb8())
}

fn load_registry(config: &Config) -> Result<ModelRegistry> {
    let paths = ModelPaths::from_dir(&config.model_dir);
    ModelRegistry::load(&paths).context("failed to load models")
}

/// Read a descriptor file: a bare JSON array of 128 floats.
fn load_descriptor(path: &Path) -> Result<Descriptor> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read descriptor file {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("invalid descriptor file {}", path.display()))
}

fn print_report<T: serde::Serialize>(report: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

/// `rollcall encode`: extract one photograph's descriptor and write it as a
/// descriptor file. No face in the photograph is a command failure, since
/// nothing was produced.
pub fn encode(config: &Config, image_path: &Path, output: Option<PathBuf>) -> Result<()> {
    let image = load_rgb_image(image_path)?;
    let mut registry = load_registry(config)?;

    let Some(extraction) = registry.extract(&image)? else {
        bail!("{NO_FACE_MESSAGE}");
    };

    let output = output.unwrap_or_else(|| image_path.with_extension("json"));
    let json = serde_json::to_string(&extraction.descriptor)?;
    fs::write(&output, json)
        .with_context(|| format!("failed to write descriptor to {}", output.display()))?;
    tracing::info!(path = %output.display(), "descriptor written");

    print_report(&EncodeReport::new(
        output.display().to_string(),
        &extraction.region,
        &extraction.landmarks,
    ))
}

/// `rollcall verify`: the end-to-end verification of a live image against a
/// stored descriptor file. "No face" and "invalid stored descriptor" are
/// reports, not process errors, mirroring how a recording layer would
/// consume them.
pub fn verify_command(config: &Config, image_path: &Path, descriptor_path: &Path) -> Result<()> {
    let image = load_rgb_image(image_path)?;

    // Parsed as raw floats: shape validation belongs to the core, which
    // must reject a wrong-size vector before extraction runs.
    let stored: Vec<f32> = match fs::read_to_string(descriptor_path)
        .with_context(|| format!("failed to read descriptor file {}", descriptor_path.display()))
        .and_then(|text| serde_json::from_str(&text).context("non-numeric descriptor file"))
    {
        Ok(values) => values,
        Err(err) => {
            tracing::warn!(error = %err, "stored descriptor unreadable");
            return print_report(&VerifyReport::failure(INVALID_STORED_MESSAGE));
        }
    };

    let mut registry = load_registry(config)?;

    match verify(&mut registry, &stored, &image, config.tolerance) {
        Ok(VerificationOutcome::Decision { is_match, distance, region, landmarks }) => {
            print_report(&VerifyReport::decision(is_match, distance, &region, &landmarks))
        }
        Ok(VerificationOutcome::NoFace) => print_report(&VerifyReport::failure(NO_FACE_MESSAGE)),
        Err(VerifyError::InvalidStoredDescriptor(err)) => {
            tracing::warn!(error = %err, "stored descriptor has wrong shape");
            print_report(&VerifyReport::failure(INVALID_STORED_MESSAGE))
        }
        Err(err) => Err(err).context("verification failed"),
    }
}

/// `rollcall compare`: comparator only, two descriptor files in.
pub fn compare(config: &Config, known_path: &Path, candidate_path: &Path) -> Result<()> {
    let known = load_descriptor(known_path)?;
    let candidate = load_descriptor(candidate_path)?;

    let result = compare_descriptors(Some(&known), Some(&candidate), config.tolerance);
    print_report(&CompareReport { is_match: result.is_match, distance: result.distance })
}

/// `rollcall identify`: 1:N identification of a probe image against a
/// gallery directory of `<label>.json` descriptor files.
pub fn identify_command(config: &Config, image_path: &Path, gallery_dir: &Path) -> Result<()> {
    let gallery = load_gallery(gallery_dir)?;
    tracing::info!(entries = gallery.len(), dir = %gallery_dir.display(), "gallery loaded");

    let image = load_rgb_image(image_path)?;
    let mut registry = load_registry(config)?;

    let Some(extraction) = registry.extract(&image)? else {
        return print_report(&IdentifyReport {
            is_match: false,
            distance: rollcall_core::ABSENT_DISTANCE,
            label: None,
            error: Some(NO_FACE_MESSAGE.to_string()),
        });
    };

    let result = identify(&extraction.descriptor, &gallery, config.tolerance);
    print_report(&IdentifyReport {
        is_match: result.is_match,
        distance: result.distance,
        label: result.label,
        error: None,
    })
}

/// Load every `<label>.json` descriptor file in a directory. The file stem
/// is the entry's label. Order does not matter: identification is a full
/// minimum-distance traversal.
fn load_gallery(dir: &Path) -> Result<Vec<GalleryEntry>> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("failed to read gallery directory {}", dir.display()))?;

    let mut gallery = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let label = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        let descriptor = load_descriptor(&path)?;
        gallery.push(GalleryEntry { label, descriptor });
    }

    Ok(gallery)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_core::DESCRIPTOR_LEN;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("rollcall-test-{name}-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_load_descriptor_roundtrip() {
        let dir = temp_dir("descriptor");
        let path = dir.join("alice.json");
        let values: Vec<f32> = (0..DESCRIPTOR_LEN).map(|i| i as f32 / 100.0).collect();
        fs::write(&path, serde_json::to_string(&values).unwrap()).unwrap();

        let descriptor = load_descriptor(&path).unwrap();
        assert_eq!(descriptor.values().len(), DESCRIPTOR_LEN);
        assert!((descriptor.values()[5] - 0.05).abs() < 1e-6);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_descriptor_wrong_shape_fails() {
        let dir = temp_dir("badshape");
        let path = dir.join("bad.json");
        fs::write(&path, "[1.0, 2.0, 3.0]").unwrap();

        assert!(load_descriptor(&path).is_err());

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_gallery_labels_from_stems() {
        let dir = temp_dir("gallery");
        let values = vec![0.0f32; DESCRIPTOR_LEN];
        let json = serde_json::to_string(&values).unwrap();
        fs::write(dir.join("alice.json"), &json).unwrap();
        fs::write(dir.join("bob.json"), &json).unwrap();
        fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let mut gallery = load_gallery(&dir).unwrap();
        gallery.sort_by(|a, b| a.label.cmp(&b.label));
        let labels: Vec<&str> = gallery.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["alice", "bob"]);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_gallery_missing_dir_fails() {
        assert!(load_gallery(Path::new("/nonexistent/gallery")).is_err());
    }
}
