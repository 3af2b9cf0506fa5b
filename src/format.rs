//! Output format resolution and encoding.

use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Cursor, Seek, Write};
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};
use tracing::warn;

use crate::error::Result;

/// JPEG encoder quality for saved results.
pub const JPEG_QUALITY: u8 = 95;

/// Container formats the pipeline writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    /// Lossless, supports alpha.
    Png,
    /// Supports alpha.
    WebP,
    /// No alpha channel.
    Jpeg,
}

impl OutputFormat {
    /// Parse a format tag such as `"png"`, `".WEBP"` or `"jpg"`.
    ///
    /// `JPG` is an alias for `JPEG`. Returns `None` for anything else.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim_start_matches('.').to_ascii_uppercase().as_str() {
            "PNG" => Some(Self::Png),
            "WEBP" => Some(Self::WebP),
            "JPG" | "JPEG" => Some(Self::Jpeg),
            _ => None,
        }
    }

    /// Canonical upper-case tag.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Png => "PNG",
            Self::WebP => "WEBP",
            Self::Jpeg => "JPEG",
        }
    }

    /// File extension (without the dot).
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::WebP => "webp",
            Self::Jpeg => "jpeg",
        }
    }

    /// Whether the format can store an alpha channel.
    #[must_use]
    pub const fn supports_transparency(self) -> bool {
        !matches!(self, Self::Jpeg)
    }

    /// Matching `image` crate format.
    #[must_use]
    pub const fn image_format(self) -> ImageFormat {
        match self {
            Self::Png => ImageFormat::Png,
            Self::WebP => ImageFormat::WebP,
            Self::Jpeg => ImageFormat::Jpeg,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Decide the output format.
///
/// Precedence: an explicit `force` tag wins; otherwise transparency selects
/// PNG; otherwise the input extension is used. Unknown tags fall back to PNG,
/// and JPEG is replaced by PNG (with a warning) whenever `transparent` is set.
#[must_use]
pub fn resolve_output_format(force: Option<&str>, transparent: bool, input_ext: &str) -> OutputFormat {
    let resolved = match force {
        Some(tag) => OutputFormat::from_tag(tag).unwrap_or_else(|| {
            warn!(format = tag, "unsupported output format requested, using PNG");
            OutputFormat::Png
        }),
        None if transparent => OutputFormat::Png,
        None => OutputFormat::from_tag(input_ext).unwrap_or(OutputFormat::Png),
    };

    if transparent && resolved == OutputFormat::Jpeg {
        warn!("transparency applied, saving as PNG instead of JPEG to keep the alpha channel");
        return OutputFormat::Png;
    }
    resolved
}

/// Replace the extension of `path` with the one for `format`.
#[must_use]
pub fn with_format_extension(path: &Path, format: OutputFormat) -> PathBuf {
    path.with_extension(format.extension())
}

/// Encode `image` as `format` into `writer`.
///
/// JPEG output drops any alpha channel.
///
/// # Errors
///
/// Returns an error if encoding or writing fails.
pub fn write_image<W: Write + Seek>(
    image: &DynamicImage,
    writer: &mut W,
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Jpeg => {
            let rgb = image.to_rgb8();
            let mut encoder = JpegEncoder::new_with_quality(writer, JPEG_QUALITY);
            encoder.encode_image(&rgb)?;
        }
        OutputFormat::Png => image.write_to(writer, ImageFormat::Png)?,
        OutputFormat::WebP => {
            // The WebP encoder only takes 8-bit RGB or RGBA.
            let img = if image.color().has_alpha() {
                DynamicImage::ImageRgba8(image.to_rgba8())
            } else {
                DynamicImage::ImageRgb8(image.to_rgb8())
            };
            img.write_to(writer, ImageFormat::WebP)?;
        }
    }
    Ok(())
}

/// Encode `image` as `format` into a byte buffer.
///
/// # Errors
///
/// Returns an error if encoding fails.
pub fn encode_image(image: &DynamicImage, format: OutputFormat) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    write_image(image, &mut buf, format)?;
    Ok(buf.into_inner())
}

/// Save `image` to `path` as `format`.
///
/// # Errors
///
/// Returns an error if the file cannot be created or encoding fails.
pub fn save_image(image: &DynamicImage, path: &Path, format: OutputFormat) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_image(image, &mut writer, format)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::capture_warnings;
    use image::{Rgba, RgbaImage};

    #[test]
    fn transparency_forces_png_over_input_extension() {
        assert_eq!(resolve_output_format(None, true, ".jpg"), OutputFormat::Png);
    }

    #[test]
    fn explicit_override_wins() {
        assert_eq!(resolve_output_format(Some("WEBP"), false, ".png"), OutputFormat::WebP);
        assert_eq!(resolve_output_format(Some("jpg"), false, ".png"), OutputFormat::Jpeg);
    }

    #[test]
    fn jpeg_override_with_transparency_becomes_png() {
        assert_eq!(resolve_output_format(Some("JPG"), true, ".png"), OutputFormat::Png);
        assert_eq!(resolve_output_format(Some("jpeg"), true, ".png"), OutputFormat::Png);
    }

    #[test]
    fn jpeg_override_with_transparency_warns() {
        let (format, logs) =
            capture_warnings(|| resolve_output_format(Some("JPG"), true, ".png"));
        assert_eq!(format, OutputFormat::Png);
        assert!(logs.contains("instead of JPEG"), "{logs}");

        let (_, logs) = capture_warnings(|| resolve_output_format(Some("PNG"), true, ".png"));
        assert!(logs.is_empty(), "{logs}");
    }

    #[test]
    fn webp_override_with_transparency_is_kept() {
        assert_eq!(resolve_output_format(Some("webp"), true, ".jpg"), OutputFormat::WebP);
    }

    #[test]
    fn falls_back_to_input_extension() {
        assert_eq!(resolve_output_format(None, false, ".jpg"), OutputFormat::Jpeg);
        assert_eq!(resolve_output_format(None, false, "JPEG"), OutputFormat::Jpeg);
        assert_eq!(resolve_output_format(None, false, ".webp"), OutputFormat::WebP);
        assert_eq!(resolve_output_format(None, false, "png"), OutputFormat::Png);
    }

    #[test]
    fn unsupported_formats_default_to_png() {
        assert_eq!(resolve_output_format(None, false, ".bmp"), OutputFormat::Png);
        assert_eq!(resolve_output_format(None, false, ""), OutputFormat::Png);
        assert_eq!(resolve_output_format(Some("gif"), false, ".jpg"), OutputFormat::Png);
    }

    #[test]
    fn tags_and_extensions() {
        assert_eq!(OutputFormat::Jpeg.tag(), "JPEG");
        assert_eq!(OutputFormat::WebP.to_string(), "WEBP");
        assert_eq!(OutputFormat::Jpeg.extension(), "jpeg");
        assert!(!OutputFormat::Jpeg.supports_transparency());
        assert!(OutputFormat::WebP.supports_transparency());
        assert_eq!(
            with_format_extension(Path::new("out/photo.jpg"), OutputFormat::Png),
            PathBuf::from("out/photo.png")
        );
    }

    #[test]
    fn encodes_each_format_readably() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 6, Rgba([10, 200, 30, 0])));
        for format in [OutputFormat::Png, OutputFormat::WebP, OutputFormat::Jpeg] {
            let bytes = encode_image(&img, format).unwrap();
            assert_eq!(image::guess_format(&bytes).unwrap(), format.image_format());
            let decoded = image::load_from_memory(&bytes).unwrap();
            assert_eq!((decoded.width(), decoded.height()), (8, 6));
        }
    }

    #[test]
    fn png_keeps_alpha() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, Rgba([1, 2, 3, 0])));
        let bytes = encode_image(&img, OutputFormat::Png).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(*decoded.get_pixel(1, 1), Rgba([1, 2, 3, 0]));
    }
}
