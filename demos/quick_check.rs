//! End-to-end check of detection, inpainting and transparency on a synthetic image.
//!
//! Usage:
//! ```sh
//! cargo run --example quick_check
//! ```

use std::process;
use std::time::Instant;

use image::{DynamicImage, Rgb, RgbImage};
use tracing::{error, info, warn};

use watermark_remover::{
    logging, BoundingBox, FillInpainter, FixedDetector, Method, ProcessingConfig, WatermarkRemover,
};

const BACKGROUND: Rgb<u8> = Rgb([240, 240, 240]);

/// Stamp positions of the synthetic watermark, 90x14 each.
const STAMPS: [(u32, u32); 3] = [(200, 200), (400, 300), (600, 400)];

fn stamp_boxes() -> Vec<BoundingBox> {
    STAMPS
        .iter()
        .map(|&(x, y)| BoundingBox::new(x, y, x + 90, y + 14))
        .collect()
}

/// Light background, a dark frame, and half-transparent red stamps.
fn synthetic_image(w: u32, h: u32) -> RgbImage {
    let mut img = RgbImage::from_pixel(w, h, BACKGROUND);
    for (x, y, px) in img.enumerate_pixels_mut() {
        let on_frame = (50..w - 50).contains(&x) && (50..h - 50).contains(&y)
            && (x < 53 || x >= w - 53 || y < 53 || y >= h - 53);
        if on_frame {
            *px = Rgb([100, 100, 100]);
        }
    }
    for b in stamp_boxes() {
        for y in b.y1..b.y2 {
            for x in b.x1..b.x2 {
                let px = img.get_pixel_mut(x, y);
                // 50% red over the background
                *px = Rgb([
                    ((u16::from(px[0]) + 255) / 2) as u8,
                    (u16::from(px[1]) / 2) as u8,
                    (u16::from(px[2]) / 2) as u8,
                ]);
            }
        }
    }
    img
}

fn build(method: Method) -> watermark_remover::Result<WatermarkRemover> {
    let config = ProcessingConfig {
        method,
        ..ProcessingConfig::default()
    };
    WatermarkRemover::new(
        Box::new(FixedDetector::new(stamp_boxes())),
        Some(Box::new(FillInpainter::new())),
        config,
    )
}

fn check_detection(img: &DynamicImage) -> watermark_remover::Result<bool> {
    let start = Instant::now();
    let report = build(Method::Inpaint)?.detect(img)?;
    info!(
        elapsed = ?start.elapsed(),
        has_watermark = report.stats.has_watermark,
        ratio = format!("{:.4}", report.stats.detection_ratio),
        pixels = report.stats.detected_pixels,
        "detection"
    );
    Ok(report.stats.has_watermark && report.stats.detected_pixels == 3 * 90 * 14)
}

fn check_inpaint(img: &DynamicImage) -> watermark_remover::Result<bool> {
    let start = Instant::now();
    let removal = build(Method::Inpaint)?.remove(img)?;
    info!(elapsed = ?start.elapsed(), "inpaint");
    let out = removal.image.to_rgb8();
    let ok = STAMPS.iter().all(|&(x, y)| {
        let px = out.get_pixel(x + 45, y + 7);
        px.0.iter()
            .zip(BACKGROUND.0.iter())
            .all(|(a, b)| a.abs_diff(*b) <= 2)
    });
    Ok(removal.watermark_found && ok)
}

fn check_transparent(img: &DynamicImage) -> watermark_remover::Result<bool> {
    let start = Instant::now();
    let removal = build(Method::Transparent)?.remove(img)?;
    info!(elapsed = ?start.elapsed(), "transparent");
    let out = removal.image.to_rgba8();
    let holes = STAMPS
        .iter()
        .all(|&(x, y)| out.get_pixel(x + 1, y + 1)[3] == 0);
    Ok(removal.transparent_applied && holes && out.get_pixel(10, 10)[3] == 255)
}

fn main() {
    if let Err(e) = logging::init(0, false) {
        eprintln!("Warning: failed to initialize logging: {e}");
    }

    info!("starting watermark removal quick check");
    let img = DynamicImage::ImageRgb8(synthetic_image(800, 600));

    let checks: [(&str, fn(&DynamicImage) -> watermark_remover::Result<bool>); 3] = [
        ("detection", check_detection),
        ("inpaint", check_inpaint),
        ("transparent", check_transparent),
    ];

    let mut passed = 0;
    for (name, check) in checks {
        match check(&img) {
            Ok(true) => {
                info!(check = name, "passed");
                passed += 1;
            }
            Ok(false) => warn!(check = name, "unexpected result"),
            Err(e) => error!(check = name, "failed: {e}"),
        }
    }

    if passed == checks.len() {
        info!("all checks passed ({passed}/{})", checks.len());
    } else {
        warn!("some checks failed ({passed}/{})", checks.len());
        process::exit(1);
    }
}
