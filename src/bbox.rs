//! Bounding boxes and the oversized-box filter.
//!
//! Open-vocabulary detectors occasionally report a box covering most of the
//! frame when asked for "watermark". Masking such a box would erase the whole
//! picture, so every box is checked against a maximum share of the image area
//! before it reaches the mask.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Default maximum share of the image a single box may cover, in percent.
pub const DEFAULT_MAX_BBOX_PERCENT: f64 = 10.0;

/// Axis-aligned rectangle in pixel coordinates.
///
/// `(x1, y1)` is the inclusive top-left corner, `(x2, y2)` the exclusive
/// bottom-right corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge (inclusive).
    pub x1: u32,
    /// Top edge (inclusive).
    pub y1: u32,
    /// Right edge (exclusive).
    pub x2: u32,
    /// Bottom edge (exclusive).
    pub y2: u32,
}

impl BoundingBox {
    /// Create a box from its corner coordinates.
    #[must_use]
    pub const fn new(x1: u32, y1: u32, x2: u32, y2: u32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Build a box from detector output in floating-point pixel coordinates.
    ///
    /// Coordinates are truncated toward zero; negative values become 0.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_f32([x1, y1, x2, y2]: [f32; 4]) -> Self {
        Self::new(x1 as u32, y1 as u32, x2 as u32, y2 as u32)
    }

    /// Width in pixels (0 for a degenerate box).
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.x2.saturating_sub(self.x1)
    }

    /// Height in pixels (0 for a degenerate box).
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.y2.saturating_sub(self.y1)
    }

    /// Area in pixels.
    #[must_use]
    pub const fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    /// Percentage of an image of `image_area` pixels covered by this box.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn coverage_percent(&self, image_area: u64) -> f64 {
        (self.area() as f64 / image_area as f64) * 100.0
    }
}

impl std::fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}, {}, {}]", self.x1, self.y1, self.x2, self.y2)
    }
}

/// Keep the boxes covering at most `max_percent` of a `width` x `height` image.
///
/// Input order is preserved. Each box is checked on its own against the whole
/// image area, so several overlapping boxes can together cover more than
/// `max_percent`. Rejected boxes are logged at `warn` level and dropped.
#[must_use]
pub fn filter_boxes(
    boxes: &[BoundingBox],
    width: u32,
    height: u32,
    max_percent: f64,
) -> Vec<BoundingBox> {
    let image_area = u64::from(width) * u64::from(height);
    if image_area == 0 {
        return Vec::new();
    }

    boxes
        .iter()
        .filter(|bbox| {
            let percent = bbox.coverage_percent(image_area);
            let keep = percent <= max_percent;
            if !keep {
                warn!(bbox = %bbox, "skipping oversized bounding box covering {percent:.2}% of the image");
            }
            keep
        })
        .copied()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::capture_warnings;

    #[test]
    fn area_and_dimensions() {
        let b = BoundingBox::new(10, 20, 110, 70);
        assert_eq!(b.width(), 100);
        assert_eq!(b.height(), 50);
        assert_eq!(b.area(), 5000);
    }

    #[test]
    fn degenerate_box_has_zero_area() {
        let b = BoundingBox::new(50, 50, 40, 60);
        assert_eq!(b.width(), 0);
        assert_eq!(b.area(), 0);
    }

    #[test]
    fn from_f32_truncates_and_saturates() {
        let b = BoundingBox::from_f32([10.9, 20.2, 30.999, -4.0]);
        assert_eq!(b, BoundingBox::new(10, 20, 30, 0));
    }

    #[test]
    fn filter_keeps_boxes_at_or_below_threshold() {
        // 100x100 image, 10% = 1000 px
        let exact = BoundingBox::new(0, 0, 100, 10);
        let small = BoundingBox::new(0, 0, 10, 10);
        let big = BoundingBox::new(0, 0, 100, 11);

        let kept = filter_boxes(&[big, exact, small], 100, 100, 10.0);
        assert_eq!(kept, vec![exact, small]);
    }

    #[test]
    fn filter_preserves_input_order() {
        let a = BoundingBox::new(50, 50, 60, 60);
        let b = BoundingBox::new(0, 0, 5, 5);
        let c = BoundingBox::new(20, 20, 25, 30);
        let kept = filter_boxes(&[a, b, c], 200, 200, 10.0);
        assert_eq!(kept, vec![a, b, c]);
    }

    #[test]
    fn filter_partitions_by_threshold() {
        let (w, h) = (320u32, 240u32);
        let image_area = f64::from(w) * f64::from(h);
        let boxes: Vec<BoundingBox> = (1..40u32)
            .map(|i| BoundingBox::new(0, 0, i * 8, i * 6))
            .collect();

        for percent in [0.5, 5.0, 10.0, 37.5, 100.0] {
            let kept = filter_boxes(&boxes, w, h, percent);
            #[allow(clippy::cast_precision_loss)]
            for b in &boxes {
                let fits = b.area() as f64 <= percent / 100.0 * image_area;
                assert_eq!(kept.contains(b), fits, "box {b} at {percent}%");
            }
        }
    }

    #[test]
    fn filter_returns_empty_when_nothing_passes() {
        let kept = filter_boxes(&[BoundingBox::new(0, 0, 100, 100)], 100, 100, 10.0);
        assert!(kept.is_empty());
    }

    #[test]
    fn filter_warns_once_per_rejected_box() {
        let big = BoundingBox::new(0, 0, 100, 50);
        let bigger = BoundingBox::new(0, 0, 100, 80);
        let small = BoundingBox::new(0, 0, 10, 10);

        let (kept, logs) = capture_warnings(|| filter_boxes(&[big, small, bigger], 100, 100, 10.0));
        assert_eq!(kept, vec![small]);
        assert_eq!(logs.matches("skipping oversized").count(), 2, "{logs}");
        assert!(logs.contains("[0, 0, 100, 50]") && logs.contains("50.00%"), "{logs}");
        assert!(logs.contains("[0, 0, 100, 80]") && logs.contains("80.00%"), "{logs}");
    }

    #[test]
    fn filter_on_empty_image_keeps_nothing() {
        let kept = filter_boxes(&[BoundingBox::new(0, 0, 1, 1)], 0, 100, 100.0);
        assert!(kept.is_empty());
    }

    #[test]
    fn serializes_as_named_corners() {
        let json = serde_json::to_string(&BoundingBox::new(1, 2, 3, 4)).unwrap();
        assert_eq!(json, r#"{"x1":1,"y1":2,"x2":3,"y2":4}"#);
    }
}
