//! Detection and removal pipeline.

use std::path::{Path, PathBuf};

use image::{DynamicImage, GrayImage};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::bbox::{self, BoundingBox};
use crate::composite::{self, Method};
use crate::config::ProcessingConfig;
use crate::detector::Detector;
use crate::error::{Error, Result};
use crate::format::{self, OutputFormat};
use crate::inpaint::Inpainter;
use crate::mask::{self, MaskStats};

/// File extensions picked up in batch mode.
pub const SUPPORTED_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "webp", "bmp", "tiff"];

/// Outcome of detecting watermarks in one image.
#[derive(Debug, Clone)]
pub struct DetectionReport {
    /// Boxes that passed the size filter, in detector order.
    pub boxes: Vec<BoundingBox>,
    /// Number of boxes dropped as oversized.
    pub rejected: usize,
    /// Binary mask of the accepted boxes.
    pub mask: GrayImage,
    /// Mask statistics.
    pub stats: MaskStats,
}

/// A processed image.
#[derive(Debug, Clone)]
pub struct Removal {
    /// The resulting image (the unmodified source when nothing was found).
    pub image: DynamicImage,
    /// Whether any watermark region was detected.
    pub watermark_found: bool,
    /// Whether the transparent method altered the image.
    pub transparent_applied: bool,
}

/// Result of processing a single image file.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessResult {
    /// Path of the input file.
    pub path: PathBuf,
    /// Path written, if any.
    pub output: Option<PathBuf>,
    /// Whether processing succeeded.
    pub success: bool,
    /// Whether the file was skipped (existing output or no watermark).
    pub skipped: bool,
    /// Share of pixels masked.
    pub detection_ratio: f64,
    /// Human-readable status message.
    pub message: String,
}

impl ProcessResult {
    fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            output: None,
            success: false,
            skipped: false,
            detection_ratio: 0.0,
            message: String::new(),
        }
    }

    fn failed(path: &Path, message: String) -> Self {
        Self {
            message,
            ..Self::new(path)
        }
    }
}

/// Watermark remover tying a detector and an optional inpainter together.
///
/// Create once and reuse for many images. The inpainter is only required
/// when the configured method is [`Method::Inpaint`].
pub struct WatermarkRemover {
    detector: Box<dyn Detector>,
    inpainter: Option<Box<dyn Inpainter>>,
    config: ProcessingConfig,
}

impl WatermarkRemover {
    /// Create a remover.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the configuration is out of range,
    /// or [`Error::MissingInpainter`] if inpainting is selected without an
    /// inpainter.
    pub fn new(
        detector: Box<dyn Detector>,
        inpainter: Option<Box<dyn Inpainter>>,
        config: ProcessingConfig,
    ) -> Result<Self> {
        config.validate()?;
        if config.method == Method::Inpaint && inpainter.is_none() {
            return Err(Error::MissingInpainter);
        }
        Ok(Self {
            detector,
            inpainter,
            config,
        })
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &ProcessingConfig {
        &self.config
    }

    /// Build the detection report from raw detector boxes.
    fn report(&self, image: &DynamicImage, raw: &[BoundingBox]) -> DetectionReport {
        let (w, h) = (image.width(), image.height());
        let boxes = bbox::filter_boxes(raw, w, h, self.config.max_bbox_percent);
        let mask = mask::rasterize(w, h, &boxes);
        let stats = MaskStats::from_mask(&mask);
        debug!(
            detected = raw.len(),
            accepted = boxes.len(),
            ratio = stats.detection_ratio,
            "built watermark mask"
        );
        DetectionReport {
            rejected: raw.len() - boxes.len(),
            boxes,
            mask,
            stats,
        }
    }

    /// Detect watermark regions in `image`.
    ///
    /// # Errors
    ///
    /// Returns any error reported by the detector.
    pub fn detect(&self, image: &DynamicImage) -> Result<DetectionReport> {
        let raw = self.detector.detect(image, &self.config.text_prompt)?;
        Ok(self.report(image, &raw))
    }

    /// Detect watermark regions in `image`, loaded from `path`.
    ///
    /// # Errors
    ///
    /// Returns any error reported by the detector.
    pub fn detect_at(&self, path: &Path, image: &DynamicImage) -> Result<DetectionReport> {
        let raw = self
            .detector
            .detect_at(path, image, &self.config.text_prompt)?;
        Ok(self.report(image, &raw))
    }

    /// Remove the regions marked by `mask` from `image`.
    ///
    /// # Errors
    ///
    /// Returns any compositing or inpainting error.
    pub fn apply(&self, image: &DynamicImage, mask: &GrayImage) -> Result<Removal> {
        let watermark_found = !mask::is_empty(mask);
        let result = composite::composite(
            self.config.method,
            image,
            mask,
            self.inpainter.as_deref(),
            &self.config.inpaint,
        )?;
        Ok(Removal {
            image: result,
            watermark_found,
            transparent_applied: watermark_found && self.config.is_transparent(),
        })
    }

    /// Detect and remove watermarks from `image`.
    ///
    /// # Errors
    ///
    /// Returns any detection, compositing or inpainting error.
    pub fn remove(&self, image: &DynamicImage) -> Result<Removal> {
        let report = self.detect(image)?;
        self.apply(image, &report.mask)
    }

    /// Output format for a result produced from `input`.
    #[must_use]
    pub fn output_format(&self, input: &Path, transparent_applied: bool) -> OutputFormat {
        let ext = input.extension().and_then(|e| e.to_str()).unwrap_or_default();
        format::resolve_output_format(self.config.force_format.as_deref(), transparent_applied, ext)
    }

    /// Process a single image file: load, detect, remove, save.
    ///
    /// The cleaned image takes the extension of the resolved output format.
    /// When no watermark is found the unmodified source is saved to `output`
    /// as is, in the format its extension names. Without `overwrite`, an
    /// existing file at either location skips the input.
    /// Returns a [`ProcessResult`] indicating success, skip, or failure.
    #[must_use]
    pub fn process_file(&self, input: &Path, output: &Path) -> ProcessResult {
        let mut result = ProcessResult::new(input);

        // A cleaned image lands at `target`, an unchanged copy at `output`.
        let out_format = self.output_format(input, self.config.is_transparent());
        let target = format::with_format_extension(output, out_format);

        if !self.config.overwrite {
            if let Some(existing) = [target.as_path(), output].into_iter().find(|p| p.exists()) {
                info!(path = %existing.display(), "skipping existing output");
                result.skipped = true;
                result.success = true;
                result.message = format!("Output exists: {}", existing.display());
                return result;
            }
        }

        info!(path = %input.display(), "processing image");
        let source = match image::open(input) {
            Ok(img) => DynamicImage::ImageRgb8(img.to_rgb8()),
            Err(e) => {
                result.message = format!("Failed to load: {e}");
                return result;
            }
        };

        let report = match self.detect_at(input, &source) {
            Ok(r) => r,
            Err(e) => {
                result.message = format!("Detection failed: {e}");
                return result;
            }
        };
        result.detection_ratio = report.stats.detection_ratio;

        if let Err(e) = ensure_parent(output) {
            result.message = format!("Failed to create output directory: {e}");
            return result;
        }

        if !report.stats.has_watermark {
            warn!(path = %input.display(), "no watermark detected");
            return match save_unchanged(&source, output) {
                Ok(()) => {
                    result.output = Some(output.to_path_buf());
                    result.success = true;
                    result.skipped = true;
                    result.message = "No watermark detected, copied unchanged".to_string();
                    result
                }
                Err(e) => {
                    result.message = format!("Failed to save: {e}");
                    result
                }
            };
        }

        let removal = match self.apply(&source, &report.mask) {
            Ok(r) => r,
            Err(e) => {
                result.message = format!("Removal failed: {e}");
                return result;
            }
        };

        match format::save_image(&removal.image, &target, out_format) {
            Ok(()) => {
                info!(path = %target.display(), format = %out_format, "saved result");
                result.output = Some(target);
                result.success = true;
                result.message = format!(
                    "Removed {} region(s) via {}",
                    report.boxes.len(),
                    self.config.method
                );
            }
            Err(e) => {
                result.message = format!("Failed to save: {e}");
            }
        }

        result
    }

    /// Process all supported images in a directory.
    ///
    /// Files are taken in name order. Uses parallel iteration when the `cli`
    /// feature is enabled (via rayon), with `config.threads` workers.
    /// Returns a [`ProcessResult`] for each image found.
    ///
    /// # Errors
    ///
    /// Returns an error if the input directory cannot be read, the output
    /// directory cannot be created, or no images are found.
    pub fn process_directory(&self, input_dir: &Path, output_dir: &Path) -> Result<Vec<ProcessResult>> {
        let images = collect_images(input_dir)?;
        if images.is_empty() {
            return Err(Error::NoImages(input_dir.to_path_buf()));
        }
        info!(count = images.len(), "found images");

        std::fs::create_dir_all(output_dir)?;

        let job = |input: &PathBuf| match input.file_name() {
            Some(name) => self.process_file(input, &output_dir.join(name)),
            None => ProcessResult::failed(input, "Not a file".to_string()),
        };

        #[cfg(feature = "cli")]
        {
            use rayon::prelude::*;
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.config.threads)
                .build()
                .map_err(|e| Error::InvalidConfig(format!("thread pool: {e}")))?;
            Ok(pool.install(|| images.par_iter().map(job).collect()))
        }

        #[cfg(not(feature = "cli"))]
        {
            Ok(images.iter().map(job).collect())
        }
    }
}

/// Save `image` to `path` in the format named by its extension.
fn save_unchanged(image: &DynamicImage, path: &Path) -> Result<()> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
    match OutputFormat::from_tag(ext) {
        Some(out_format) => format::save_image(image, path, out_format),
        None => Ok(image.save(path)?),
    }
}

fn ensure_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => {
            std::fs::create_dir_all(parent)
        }
        _ => Ok(()),
    }
}

/// Supported image files directly inside `dir`, sorted by path.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be read.
pub fn collect_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut images: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().map(|ft| ft.is_file()).unwrap_or(false))
        .map(|e| e.path())
        .filter(|p| is_supported_image(p))
        .collect();
    images.sort();
    Ok(images)
}

/// Check if a file has a supported image extension.
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => SUPPORTED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()),
        None => false,
    }
}

/// Generate a default output path from an input path.
///
/// Example: `"photo.jpg"` becomes `"photo_cleaned.jpg"`.
#[must_use]
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    let ext = input.extension().unwrap_or_default().to_string_lossy();
    let parent = input.parent().unwrap_or(Path::new("."));
    parent.join(format!("{stem}_cleaned.{ext}"))
}
