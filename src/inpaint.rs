//! Inpainting capability and its configuration.
//!
//! The pipeline treats inpainting as an opaque collaborator: it hands over the
//! source pixels and the binary mask as flat row-major arrays and receives a
//! reconstructed pixel array back. [`FillInpainter`] is a small deterministic
//! implementation that needs no model weights.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Sampler used by diffusion-based inpainting models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sampler {
    /// Denoising diffusion implicit models.
    #[default]
    Ddim,
    /// Pseudo linear multi-step.
    Plms,
}

/// How an inpainter treats images larger than it handles natively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HdStrategy {
    /// Run on the full image at its original size.
    Original,
    /// Downscale to the resize limit, inpaint, scale back.
    Resize,
    /// Inpaint only crops around the masked regions, plus a margin.
    #[default]
    Crop,
}

/// Fixed parameters passed to every inpainting call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InpaintConfig {
    /// Number of denoising (or relaxation) steps.
    pub steps: u32,
    /// Sampler choice.
    pub sampler: Sampler,
    /// Large-image strategy.
    pub hd_strategy: HdStrategy,
    /// Context margin around each crop, in pixels.
    pub hd_strategy_crop_margin: u32,
    /// Longest side above which the crop strategy kicks in.
    pub hd_strategy_crop_trigger_size: u32,
    /// Longest side the resize strategy scales down to.
    pub hd_strategy_resize_limit: u32,
}

impl Default for InpaintConfig {
    fn default() -> Self {
        Self {
            steps: 50,
            sampler: Sampler::Ddim,
            hd_strategy: HdStrategy::Crop,
            hd_strategy_crop_margin: 64,
            hd_strategy_crop_trigger_size: 800,
            hd_strategy_resize_limit: 1600,
        }
    }
}

/// Channel ordering of an inpainter's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelOrder {
    /// Red, green, blue.
    #[default]
    Rgb,
    /// Blue, green, red.
    Bgr,
}

/// Source image and mask as flat row-major arrays.
#[derive(Debug, Clone, Copy)]
pub struct InpaintInput<'a> {
    /// Interleaved 3-channel RGB pixels, `width * height * 3` bytes.
    pub pixels: &'a [u8],
    /// Single-channel mask, `width * height` bytes; nonzero marks a hole.
    pub mask: &'a [u8],
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
}

/// Pixel values returned by an inpainter.
#[derive(Debug, Clone, PartialEq)]
pub enum PixelData {
    /// Integer channel values.
    U8(Vec<u8>),
    /// Floating-point channel values on the `0..=255` scale, possibly out of range.
    F32(Vec<f32>),
}

impl PixelData {
    /// Number of channel values.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::U8(v) => v.len(),
            Self::F32(v) => v.len(),
        }
    }

    /// Whether there are no channel values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Reconstructed image returned by an inpainter.
#[derive(Debug, Clone, PartialEq)]
pub struct InpaintOutput {
    /// Interleaved 3-channel pixel values, same size as the input.
    pub data: PixelData,
    /// Ordering of the three channels in `data`.
    pub order: ChannelOrder,
}

/// Pluggable inpainting backend.
///
/// Implementations either return a complete image or fail; the pipeline does
/// not retry.
pub trait Inpainter: Send + Sync {
    /// Reconstruct the masked pixels of `input`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Inpaint`] (or any other crate error) when the backend
    /// cannot process the image.
    fn inpaint(&self, input: InpaintInput<'_>, config: &InpaintConfig) -> Result<InpaintOutput>;
}

/// Rectangle `[x1, x2) x [y1, y2)` in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Region {
    x1: usize,
    y1: usize,
    x2: usize,
    y2: usize,
}

/// Deterministic inpainter that fills holes from their surroundings.
///
/// Holes are filled ring by ring from the boundary inward, each pixel taking
/// the mean of its already-known 8-neighbours, then smoothed with
/// `config.steps` Jacobi relaxation passes over the hole. With the crop
/// strategy, images whose longest side exceeds the trigger size are only
/// processed inside the mask's bounding rectangle grown by the crop margin.
/// The resize strategy is treated like the original-size one since the fill
/// runs in linear time.
#[derive(Debug, Clone, Copy, Default)]
pub struct FillInpainter;

impl FillInpainter {
    /// Create a fill inpainter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Inpainter for FillInpainter {
    fn inpaint(&self, input: InpaintInput<'_>, config: &InpaintConfig) -> Result<InpaintOutput> {
        let w = input.width as usize;
        let h = input.height as usize;
        if input.pixels.len() != w * h * 3 || input.mask.len() != w * h {
            return Err(Error::Inpaint(format!(
                "expected {}x{} image and mask, got {} pixel bytes and {} mask bytes",
                input.width,
                input.height,
                input.pixels.len(),
                input.mask.len()
            )));
        }

        let mut values: Vec<f32> = input.pixels.iter().map(|&v| f32::from(v)).collect();

        let Some(bounds) = mask_bounds(input.mask, w, h) else {
            return Ok(InpaintOutput {
                data: PixelData::F32(values),
                order: ChannelOrder::Rgb,
            });
        };

        let longest = input.width.max(input.height);
        let region = match config.hd_strategy {
            HdStrategy::Crop if longest > config.hd_strategy_crop_trigger_size => {
                let m = config.hd_strategy_crop_margin as usize;
                Region {
                    x1: bounds.x1.saturating_sub(m),
                    y1: bounds.y1.saturating_sub(m),
                    x2: (bounds.x2 + m).min(w),
                    y2: (bounds.y2 + m).min(h),
                }
            }
            _ => Region {
                x1: 0,
                y1: 0,
                x2: w,
                y2: h,
            },
        };

        let mut known: Vec<bool> = input.mask.iter().map(|&m| m == 0).collect();
        let holes: Vec<usize> = (region.y1..region.y2)
            .flat_map(|y| (region.x1..region.x2).map(move |x| y * w + x))
            .filter(|&i| !known[i])
            .collect();

        fill_rings(&mut values, &mut known, &holes, w, region);
        relax(&mut values, &holes, w, region, config.steps);

        Ok(InpaintOutput {
            data: PixelData::F32(values),
            order: ChannelOrder::Rgb,
        })
    }
}

/// Bounding rectangle of all nonzero mask pixels.
fn mask_bounds(mask: &[u8], w: usize, h: usize) -> Option<Region> {
    let mut bounds: Option<Region> = None;
    for y in 0..h {
        for x in 0..w {
            if mask[y * w + x] == 0 {
                continue;
            }
            let r = bounds.get_or_insert(Region {
                x1: x,
                y1: y,
                x2: x + 1,
                y2: y + 1,
            });
            r.x1 = r.x1.min(x);
            r.y1 = r.y1.min(y);
            r.x2 = r.x2.max(x + 1);
            r.y2 = r.y2.max(y + 1);
        }
    }
    bounds
}

/// Neighbour indices of `(x, y)` inside `region`, 8-connected.
fn neighbours(x: usize, y: usize, w: usize, region: Region) -> impl Iterator<Item = usize> {
    let ys = y.saturating_sub(1).max(region.y1)..(y + 2).min(region.y2);
    ys.flat_map(move |ny| {
        let xs = x.saturating_sub(1).max(region.x1)..(x + 2).min(region.x2);
        xs.map(move |nx| (nx, ny))
    })
    .filter(move |&(nx, ny)| nx != x || ny != y)
    .map(move |(nx, ny)| ny * w + nx)
}

/// Onion-peel fill: each ring of holes takes the mean of known neighbours.
fn fill_rings(values: &mut [f32], known: &mut [bool], holes: &[usize], w: usize, region: Region) {
    let mut remaining: Vec<usize> = holes.to_vec();

    while !remaining.is_empty() {
        let mut ring = Vec::new();
        let mut rest = Vec::new();

        for &i in &remaining {
            let (x, y) = (i % w, i / w);
            let mut sum = [0.0_f32; 3];
            let mut count = 0u32;
            for n in neighbours(x, y, w, region) {
                if known[n] {
                    for (acc, v) in sum.iter_mut().zip(&values[n * 3..n * 3 + 3]) {
                        *acc += v;
                    }
                    count += 1;
                }
            }
            if count == 0 {
                rest.push(i);
            } else {
                #[allow(clippy::cast_precision_loss)]
                let inv = 1.0 / count as f32;
                ring.push((i, [sum[0] * inv, sum[1] * inv, sum[2] * inv]));
            }
        }

        // Nothing known anywhere near the remaining holes.
        if ring.is_empty() {
            break;
        }

        for (i, px) in ring {
            values[i * 3..i * 3 + 3].copy_from_slice(&px);
            known[i] = true;
        }
        remaining = rest;
    }
}

/// Jacobi relaxation over the holes using 4-neighbours.
fn relax(values: &mut [f32], holes: &[usize], w: usize, region: Region, steps: u32) {
    if holes.is_empty() {
        return;
    }
    let mut next = vec![[0.0_f32; 3]; holes.len()];

    for _ in 0..steps {
        for (slot, &i) in next.iter_mut().zip(holes) {
            let (x, y) = (i % w, i / w);
            let mut sum = [0.0_f32; 3];
            let mut count = 0u32;
            let mut add = |n: usize| {
                for (acc, v) in sum.iter_mut().zip(&values[n * 3..n * 3 + 3]) {
                    *acc += v;
                }
                count += 1;
            };
            if x > region.x1 {
                add(i - 1);
            }
            if x + 1 < region.x2 {
                add(i + 1);
            }
            if y > region.y1 {
                add(i - w);
            }
            if y + 1 < region.y2 {
                add(i + w);
            }
            #[allow(clippy::cast_precision_loss)]
            let inv = 1.0 / count.max(1) as f32;
            *slot = [sum[0] * inv, sum[1] * inv, sum[2] * inv];
        }
        for (px, &i) in next.iter().zip(holes) {
            values[i * 3..i * 3 + 3].copy_from_slice(px);
        }
    }
}
