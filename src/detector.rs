//! Watermark detection capability.
//!
//! Detection itself is done by an external open-vocabulary model prompted with
//! text such as "watermark". The pipeline only needs the resulting boxes, so
//! detectors are a trait; the concrete ones here replay boxes recorded in JSON
//! detection files, in the layout the model's post-processing emits:
//!
//! ```json
//! {"<OPEN_VOCABULARY_DETECTION>": {"bboxes": [[12.0, 8.5, 140.2, 40.0]], "bboxes_labels": ["watermark"]}}
//! ```
//!
//! The unwrapped form `{"bboxes": [...]}` is accepted too.

use std::path::{Path, PathBuf};

use image::DynamicImage;
use serde::Deserialize;
use tracing::debug;

use crate::bbox::BoundingBox;
use crate::error::{Error, Result};

/// Task key under which open-vocabulary detection answers are stored.
pub const OPEN_VOCAB_TASK: &str = "<OPEN_VOCABULARY_DETECTION>";

/// Default text prompt for detection.
pub const DEFAULT_PROMPT: &str = "watermark";

/// Suffix appended to an image path to find its sidecar detection file.
pub const SIDECAR_SUFFIX: &str = "detections.json";

/// Pluggable detection backend.
pub trait Detector: Send + Sync {
    /// Return the boxes matching `prompt` in `image`. May be empty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Detection`] (or another crate error) if detection fails.
    fn detect(&self, image: &DynamicImage, prompt: &str) -> Result<Vec<BoundingBox>>;

    /// Like [`Detector::detect`], for an image loaded from `path`.
    ///
    /// Detectors that key their results by file override this.
    ///
    /// # Errors
    ///
    /// Same as [`Detector::detect`].
    fn detect_at(&self, _path: &Path, image: &DynamicImage, prompt: &str) -> Result<Vec<BoundingBox>> {
        self.detect(image, prompt)
    }
}

/// Boxes and labels from one detection answer.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Detections {
    /// Boxes as `[x1, y1, x2, y2]` in pixel coordinates.
    pub bboxes: Vec<[f32; 4]>,
    /// Optional label per box.
    #[serde(default, alias = "bboxes_labels")]
    pub labels: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DetectionDocument {
    Task {
        #[serde(rename = "<OPEN_VOCABULARY_DETECTION>")]
        answer: Detections,
    },
    Plain(Detections),
}

impl Detections {
    /// Parse a detection document from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the text is not a detection document.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(match serde_json::from_str(text)? {
            DetectionDocument::Task { answer } => answer,
            DetectionDocument::Plain(d) => d,
        })
    }

    /// Read and parse a detection file.
    ///
    /// # Errors
    ///
    /// Returns an I/O or JSON error.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    /// Convert to integer boxes, truncating coordinates.
    #[must_use]
    pub fn boxes(&self) -> Vec<BoundingBox> {
        self.bboxes.iter().copied().map(BoundingBox::from_f32).collect()
    }
}

/// Detector that reports the same boxes for every image.
#[derive(Debug, Clone, Default)]
pub struct FixedDetector {
    boxes: Vec<BoundingBox>,
}

impl FixedDetector {
    /// Create a detector reporting `boxes`.
    #[must_use]
    pub fn new(boxes: Vec<BoundingBox>) -> Self {
        Self { boxes }
    }

    /// Create a detector from a detection file.
    ///
    /// # Errors
    ///
    /// Returns an I/O or JSON error.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        Ok(Self::new(Detections::from_json_file(path)?.boxes()))
    }
}

impl Detector for FixedDetector {
    fn detect(&self, _image: &DynamicImage, prompt: &str) -> Result<Vec<BoundingBox>> {
        debug!(prompt, count = self.boxes.len(), "replaying fixed detections");
        Ok(self.boxes.clone())
    }
}

/// Detector reading `<image path>.detections.json` next to each image.
///
/// A missing sidecar means nothing was detected.
#[derive(Debug, Clone, Copy, Default)]
pub struct SidecarDetector;

impl SidecarDetector {
    /// Create a sidecar detector.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Sidecar path for `image_path`, e.g. `a/photo.jpg.detections.json`.
    #[must_use]
    pub fn sidecar_path(image_path: &Path) -> PathBuf {
        let mut name = image_path.as_os_str().to_owned();
        name.push(".");
        name.push(SIDECAR_SUFFIX);
        PathBuf::from(name)
    }
}

impl Detector for SidecarDetector {
    fn detect(&self, _image: &DynamicImage, _prompt: &str) -> Result<Vec<BoundingBox>> {
        Err(Error::Detection(
            "sidecar detections need the image file path".to_string(),
        ))
    }

    fn detect_at(&self, path: &Path, _image: &DynamicImage, prompt: &str) -> Result<Vec<BoundingBox>> {
        let sidecar = Self::sidecar_path(path);
        if !sidecar.is_file() {
            debug!(path = %sidecar.display(), "no sidecar detections");
            return Ok(Vec::new());
        }
        let detections = Detections::from_json_file(&sidecar)?;
        debug!(path = %sidecar.display(), prompt, count = detections.bboxes.len(), "loaded sidecar detections");
        Ok(detections.boxes())
    }
}
