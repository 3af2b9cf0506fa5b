//! Applying a detection mask to the source image.
//!
//! Two strategies exist: hand the masked regions to an [`Inpainter`] for
//! reconstruction, or punch them out by zeroing the alpha channel. Neither
//! touches the source image; both return a new one.

use std::fmt;
use std::str::FromStr;

use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::inpaint::{ChannelOrder, InpaintConfig, InpaintInput, Inpainter, PixelData};
use crate::mask;

/// How masked regions are removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    /// Reconstruct the regions with an inpainting model.
    #[default]
    #[serde(alias = "lama")]
    Inpaint,
    /// Make the regions fully transparent.
    Transparent,
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "inpaint" | "lama" => Ok(Self::Inpaint),
            "transparent" => Ok(Self::Transparent),
            _ => Err(Error::InvalidMethod(s.to_string())),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inpaint => f.write_str("inpaint"),
            Self::Transparent => f.write_str("transparent"),
        }
    }
}

fn check_size(width: u32, height: u32, mask: &GrayImage) -> Result<()> {
    if mask.dimensions() == (width, height) {
        Ok(())
    } else {
        Err(Error::MaskSize {
            width,
            height,
            mask_width: mask.width(),
            mask_height: mask.height(),
        })
    }
}

/// Make every masked pixel fully transparent.
///
/// Masked pixels keep their RGB values with alpha set to 0; all others are
/// copied unchanged (alpha 255 when the source has no alpha channel).
///
/// # Errors
///
/// Returns [`Error::MaskSize`] if the mask and image dimensions differ.
pub fn make_transparent(image: &DynamicImage, mask: &GrayImage) -> Result<RgbaImage> {
    check_size(image.width(), image.height(), mask)?;

    let mut out = image.to_rgba8();
    for (px, m) in out.pixels_mut().zip(mask.pixels()) {
        if m[0] != 0 {
            px[3] = 0;
        }
    }
    Ok(out)
}

/// Reconstruct the masked pixels of `image` with `inpainter`.
///
/// Float output is clamped to `0..=255` and BGR output is reordered to RGB.
/// Inpainter errors are returned unchanged.
///
/// # Errors
///
/// Returns [`Error::MaskSize`] on a mask/image mismatch,
/// [`Error::InpaintShape`] if the inpainter returns the wrong number of
/// values, or whatever error the inpainter itself reports.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn inpaint_regions(
    inpainter: &dyn Inpainter,
    image: &RgbImage,
    mask: &GrayImage,
    config: &InpaintConfig,
) -> Result<RgbImage> {
    let (width, height) = image.dimensions();
    check_size(width, height, mask)?;

    let output = inpainter.inpaint(
        InpaintInput {
            pixels: image.as_raw(),
            mask: mask.as_raw(),
            width,
            height,
        },
        config,
    )?;

    let expected = image.as_raw().len();
    let shape_err = |actual| Error::InpaintShape {
        width,
        height,
        expected,
        actual,
    };
    if output.data.len() != expected {
        return Err(shape_err(output.data.len()));
    }

    let mut raw = match output.data {
        PixelData::U8(v) => v,
        PixelData::F32(v) => v.into_iter().map(|c| c.clamp(0.0, 255.0) as u8).collect(),
    };

    if output.order == ChannelOrder::Bgr {
        for px in raw.chunks_exact_mut(3) {
            px.swap(0, 2);
        }
    }

    RgbImage::from_raw(width, height, raw).ok_or_else(|| shape_err(0))
}

/// Apply `method` to the masked regions of `image`.
///
/// An all-zero mask means nothing was detected: the source is returned as-is
/// for either method.
///
/// # Errors
///
/// Returns [`Error::MissingInpainter`] when inpainting without an inpainter,
/// plus any error from [`make_transparent`] or [`inpaint_regions`].
pub fn composite(
    method: Method,
    image: &DynamicImage,
    mask: &GrayImage,
    inpainter: Option<&dyn Inpainter>,
    config: &InpaintConfig,
) -> Result<DynamicImage> {
    check_size(image.width(), image.height(), mask)?;
    if mask::is_empty(mask) {
        return Ok(image.clone());
    }

    match method {
        Method::Transparent => make_transparent(image, mask).map(DynamicImage::ImageRgba8),
        Method::Inpaint => {
            let inpainter = inpainter.ok_or(Error::MissingInpainter)?;
            inpaint_regions(inpainter, &image.to_rgb8(), mask, config).map(DynamicImage::ImageRgb8)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bbox::BoundingBox;
    use crate::inpaint::InpaintOutput;
    use image::{Rgb, Rgba};

    /// Paints every hole pure red, emitting the whole frame as floats in `order`.
    struct RedFill {
        order: ChannelOrder,
        overshoot: bool,
    }

    impl Inpainter for RedFill {
        fn inpaint(&self, input: InpaintInput<'_>, _: &InpaintConfig) -> Result<InpaintOutput> {
            let red = if self.overshoot { 300.0 } else { 255.0 };
            let below = if self.overshoot { -20.0 } else { 0.0 };
            let mut data: Vec<f32> = input
                .pixels
                .chunks_exact(3)
                .flat_map(|px| {
                    let [r, g, b] = [px[0], px[1], px[2]].map(f32::from);
                    match self.order {
                        ChannelOrder::Rgb => [r, g, b],
                        ChannelOrder::Bgr => [b, g, r],
                    }
                })
                .collect();
            for (i, &m) in input.mask.iter().enumerate() {
                if m != 0 {
                    let px = match self.order {
                        ChannelOrder::Rgb => [red, below, below],
                        ChannelOrder::Bgr => [below, below, red],
                    };
                    data[i * 3..i * 3 + 3].copy_from_slice(&px);
                }
            }
            Ok(InpaintOutput {
                data: PixelData::F32(data),
                order: self.order,
            })
        }
    }

    struct Failing;

    impl Inpainter for Failing {
        fn inpaint(&self, _: InpaintInput<'_>, _: &InpaintConfig) -> Result<InpaintOutput> {
            Err(Error::Inpaint("out of memory".into()))
        }
    }

    struct Truncated;

    impl Inpainter for Truncated {
        fn inpaint(&self, _: InpaintInput<'_>, _: &InpaintConfig) -> Result<InpaintOutput> {
            Ok(InpaintOutput {
                data: PixelData::U8(vec![0; 5]),
                order: ChannelOrder::Rgb,
            })
        }
    }

    fn gradient(w: u32, h: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| Rgb([(x * 7) as u8, (y * 11) as u8, ((x + y) * 3) as u8]))
    }

    #[test]
    fn method_parses_names_and_aliases() {
        assert_eq!("inpaint".parse::<Method>().unwrap(), Method::Inpaint);
        assert_eq!("LaMa".parse::<Method>().unwrap(), Method::Inpaint);
        assert_eq!("transparent".parse::<Method>().unwrap(), Method::Transparent);
        assert!(matches!(
            "blur".parse::<Method>(),
            Err(Error::InvalidMethod(m)) if m == "blur"
        ));
    }

    #[test]
    fn method_deserializes_lama_alias() {
        let m: Method = serde_json::from_str("\"lama\"").unwrap();
        assert_eq!(m, Method::Inpaint);
        assert_eq!(serde_json::to_string(&Method::Transparent).unwrap(), "\"transparent\"");
    }

    #[test]
    fn transparent_zeroes_alpha_only_under_mask() {
        let src = DynamicImage::ImageRgb8(gradient(20, 10));
        let m = mask::rasterize(20, 10, &[BoundingBox::new(3, 2, 8, 6)]);
        let out = make_transparent(&src, &m).unwrap();
        let rgb = src.to_rgb8();

        for (x, y, px) in out.enumerate_pixels() {
            let s = rgb.get_pixel(x, y);
            assert_eq!(&px.0[..3], &s.0[..], "rgb at ({x},{y})");
            let expected_alpha = if m.get_pixel(x, y)[0] == 255 { 0 } else { 255 };
            assert_eq!(px[3], expected_alpha, "alpha at ({x},{y})");
        }
    }

    #[test]
    fn transparent_preserves_source_alpha_outside_mask() {
        let src = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([9, 8, 7, 120])));
        let m = mask::rasterize(4, 4, &[BoundingBox::new(0, 0, 1, 1)]);
        let out = make_transparent(&src, &m).unwrap();
        assert_eq!(*out.get_pixel(0, 0), Rgba([9, 8, 7, 0]));
        assert_eq!(*out.get_pixel(3, 3), Rgba([9, 8, 7, 120]));
    }

    #[test]
    fn transparent_output_is_rgba_for_luma_source() {
        let src = DynamicImage::ImageLuma8(GrayImage::from_pixel(3, 3, image::Luma([50])));
        let m = mask::rasterize(3, 3, &[BoundingBox::new(1, 1, 2, 2)]);
        let out = composite(Method::Transparent, &src, &m, None, &InpaintConfig::default()).unwrap();
        let DynamicImage::ImageRgba8(rgba) = out else {
            panic!("expected RGBA output");
        };
        assert_eq!(*rgba.get_pixel(1, 1), Rgba([50, 50, 50, 0]));
        assert_eq!(*rgba.get_pixel(0, 0), Rgba([50, 50, 50, 255]));
    }

    #[test]
    fn empty_mask_returns_source_for_both_methods() {
        let src = DynamicImage::ImageRgb8(gradient(12, 9));
        let m = mask::rasterize(12, 9, &[]);
        for method in [Method::Inpaint, Method::Transparent] {
            let out = composite(method, &src, &m, None, &InpaintConfig::default()).unwrap();
            assert_eq!(out, src, "{method}");
        }
    }

    #[test]
    fn inpaint_clamps_float_output() {
        let src = gradient(10, 10);
        let m = mask::rasterize(10, 10, &[BoundingBox::new(2, 2, 4, 4)]);
        let red = RedFill {
            order: ChannelOrder::Rgb,
            overshoot: true,
        };
        let out = inpaint_regions(&red, &src, &m, &InpaintConfig::default()).unwrap();
        assert_eq!(*out.get_pixel(2, 2), Rgb([255, 0, 0]));
        assert_eq!(out.get_pixel(5, 5), src.get_pixel(5, 5));
    }

    #[test]
    fn inpaint_reorders_bgr_output() {
        let src = gradient(10, 10);
        let m = mask::rasterize(10, 10, &[BoundingBox::new(0, 0, 3, 3)]);
        let red = RedFill {
            order: ChannelOrder::Bgr,
            overshoot: false,
        };
        let out = inpaint_regions(&red, &src, &m, &InpaintConfig::default()).unwrap();
        assert_eq!(*out.get_pixel(1, 1), Rgb([255, 0, 0]));
        for (x, y, px) in out.enumerate_pixels() {
            if m.get_pixel(x, y)[0] == 0 {
                assert_eq!(px, src.get_pixel(x, y), "pixel ({x},{y})");
            }
        }
    }

    #[test]
    fn inpaint_does_not_mutate_source() {
        let src = DynamicImage::ImageRgb8(gradient(10, 10));
        let before = src.clone();
        let m = mask::rasterize(10, 10, &[BoundingBox::new(0, 0, 5, 5)]);
        let red = RedFill {
            order: ChannelOrder::Rgb,
            overshoot: false,
        };
        let out = composite(Method::Inpaint, &src, &m, Some(&red), &InpaintConfig::default());
        assert!(out.is_ok());
        assert_eq!(src, before);
    }

    #[test]
    fn inpaint_errors_propagate_unchanged() {
        let src = DynamicImage::ImageRgb8(gradient(6, 6));
        let m = mask::rasterize(6, 6, &[BoundingBox::new(0, 0, 2, 2)]);
        let err =
            composite(Method::Inpaint, &src, &m, Some(&Failing), &InpaintConfig::default()).unwrap_err();
        assert!(matches!(err, Error::Inpaint(msg) if msg == "out of memory"));
    }

    #[test]
    fn inpaint_without_inpainter_fails() {
        let src = DynamicImage::ImageRgb8(gradient(6, 6));
        let m = mask::rasterize(6, 6, &[BoundingBox::new(0, 0, 2, 2)]);
        let err = composite(Method::Inpaint, &src, &m, None, &InpaintConfig::default()).unwrap_err();
        assert!(matches!(err, Error::MissingInpainter));
    }

    #[test]
    fn wrong_sized_output_is_rejected() {
        let src = gradient(4, 4);
        let m = mask::rasterize(4, 4, &[BoundingBox::new(0, 0, 2, 2)]);
        let err = inpaint_regions(&Truncated, &src, &m, &InpaintConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            Error::InpaintShape {
                expected: 48,
                actual: 5,
                ..
            }
        ));
    }

    #[test]
    fn mismatched_mask_is_rejected() {
        let src = DynamicImage::ImageRgb8(gradient(4, 4));
        let m = mask::rasterize(5, 4, &[]);
        let err = composite(Method::Transparent, &src, &m, None, &InpaintConfig::default()).unwrap_err();
        assert!(matches!(err, Error::MaskSize { mask_width: 5, .. }));
    }
}
