//! Detect watermark regions in images and remove them.
//!
//! A detector reports bounding boxes for a text prompt such as "watermark".
//! Oversized boxes are dropped, the rest are rasterized into a binary mask,
//! and the masked regions are either reconstructed by an inpainter or made
//! fully transparent. The output format is chosen from an explicit override,
//! the transparency requirement, or the input file's extension.
//!
//! # Quick Start
//!
//! ```no_run
//! use watermark_remover::{
//!     BoundingBox, FillInpainter, FixedDetector, ProcessingConfig, WatermarkRemover,
//! };
//!
//! let detector = FixedDetector::new(vec![BoundingBox::new(700, 520, 780, 580)]);
//! let remover = WatermarkRemover::new(
//!     Box::new(detector),
//!     Some(Box::new(FillInpainter::new())),
//!     ProcessingConfig::default(),
//! )
//! .expect("valid config");
//!
//! let img = image::open("photo.jpg").unwrap();
//! let removal = remover.remove(&img).unwrap();
//! removal.image.save("cleaned.png").unwrap();
//! ```
//!
//! # Detection only
//!
//! ```no_run
//! use watermark_remover::{FixedDetector, Method, ProcessingConfig, WatermarkRemover};
//!
//! let config = ProcessingConfig { method: Method::Transparent, ..ProcessingConfig::default() };
//! let remover = WatermarkRemover::new(Box::new(FixedDetector::default()), None, config).unwrap();
//! let report = remover.detect(&image::open("photo.jpg").unwrap()).unwrap();
//! println!("{} px masked ({:.4})", report.stats.detected_pixels, report.stats.detection_ratio);
//! ```

#![deny(missing_docs)]

pub mod bbox;
pub mod composite;
pub mod config;
pub mod detector;
mod engine;
pub mod error;
pub mod format;
pub mod inpaint;
#[cfg(feature = "cli")]
pub mod logging;
pub mod mask;
#[cfg(test)]
mod test_util;

pub use bbox::{filter_boxes, BoundingBox};
pub use composite::{composite, make_transparent, Method};
pub use config::ProcessingConfig;
pub use detector::{Detections, Detector, FixedDetector, SidecarDetector};
pub use engine::{
    collect_images, default_output_path, is_supported_image, DetectionReport, ProcessResult,
    Removal, WatermarkRemover, SUPPORTED_EXTENSIONS,
};
pub use error::{Error, Result};
pub use format::{resolve_output_format, OutputFormat};
pub use inpaint::{FillInpainter, InpaintConfig, Inpainter};
pub use mask::{rasterize, MaskStats};
