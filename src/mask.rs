//! Binary mask rasterization and detection statistics.

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::bbox::BoundingBox;

/// Mask value marking a pixel to be altered.
pub const MASKED: u8 = 255;

/// Rasterize accepted boxes into a single-channel binary mask.
///
/// Every pixel with `x1 <= x < x2` and `y1 <= y < y2` of some box is set to
/// [`MASKED`]; all others stay 0. Overlapping boxes union their coverage.
/// Boxes reaching past the image edge are clipped to it.
#[must_use]
pub fn rasterize(width: u32, height: u32, boxes: &[BoundingBox]) -> GrayImage {
    let mut mask = GrayImage::new(width, height);
    let stride = width as usize;
    let buf: &mut [u8] = &mut mask;

    for bbox in boxes {
        let x1 = bbox.x1.min(width) as usize;
        let x2 = bbox.x2.min(width) as usize;
        let y1 = bbox.y1.min(height);
        let y2 = bbox.y2.min(height);
        if x1 >= x2 {
            continue;
        }
        for y in y1..y2 {
            let row = y as usize * stride;
            buf[row + x1..row + x2].fill(MASKED);
        }
    }

    mask
}

/// Whether the mask marks no pixel at all ("no watermark detected").
#[must_use]
pub fn is_empty(mask: &GrayImage) -> bool {
    mask.as_raw().iter().all(|&v| v == 0)
}

/// Summary of a detection mask.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaskStats {
    /// Number of nonzero mask pixels.
    pub detected_pixels: u64,
    /// Total number of pixels in the mask.
    pub total_pixels: u64,
    /// `detected_pixels / total_pixels` (0 for an empty image).
    pub detection_ratio: f64,
    /// Whether any pixel was detected.
    pub has_watermark: bool,
}

impl MaskStats {
    /// Compute statistics for a mask.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_mask(mask: &GrayImage) -> Self {
        let detected_pixels = mask.as_raw().iter().filter(|&&v| v != 0).count() as u64;
        let total_pixels = u64::from(mask.width()) * u64::from(mask.height());
        let detection_ratio = if total_pixels == 0 {
            0.0
        } else {
            detected_pixels as f64 / total_pixels as f64
        };

        Self {
            detected_pixels,
            total_pixels,
            detection_ratio,
            has_watermark: detection_ratio > 0.0,
        }
    }
}
