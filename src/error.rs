//! Error types for the watermark-remover crate.

use std::path::PathBuf;

/// Errors that can occur during watermark detection and removal.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An unrecognized removal method was requested.
    #[error("invalid removal method {0:?} (expected \"inpaint\", \"lama\" or \"transparent\")")]
    InvalidMethod(String),

    /// The configuration holds an out-of-range or inconsistent value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The detector failed to produce bounding boxes.
    #[error("detection failed: {0}")]
    Detection(String),

    /// The inpainting collaborator failed; its message is passed through as-is.
    #[error("inpainting failed: {0}")]
    Inpaint(String),

    /// The inpaint method was selected but no inpainter was supplied.
    #[error("inpaint method selected but no inpainter is configured")]
    MissingInpainter,

    /// The inpainter returned a buffer that does not match the source image.
    #[error("inpainter returned {actual} values, expected {expected} ({width}x{height}x3)")]
    InpaintShape {
        /// Source image width in pixels.
        width: u32,
        /// Source image height in pixels.
        height: u32,
        /// Expected number of channel values.
        expected: usize,
        /// Number of channel values actually returned.
        actual: usize,
    },

    /// The mask does not have the same dimensions as the image.
    #[error("mask is {mask_width}x{mask_height}, image is {width}x{height}")]
    MaskSize {
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
        /// Mask width in pixels.
        mask_width: u32,
        /// Mask height in pixels.
        mask_height: u32,
    },

    /// No supported image files were found in a batch input directory.
    #[error("no image files found in {}", .0.display())]
    NoImages(PathBuf),

    /// A JSON configuration or detection file could not be parsed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An error occurred during image processing (load, save, encode).
    #[error("image processing error: {0}")]
    Image(#[from] image::ImageError),
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
