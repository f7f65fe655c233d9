//! Image difference processing.
//!
//! Both images are down-sampled to a coarse grid of 16x16-pixel cells and
//! reduced to a single luma channel before differencing, so sub-cell noise
//! and resampling artifacts do not register as mismatches. The grid also
//! drives the difference overlay drawn on report images.

use std::fs;
use std::path::{Path, PathBuf};

use image::{GrayImage, ImageEncoder, Luma, Rgba, RgbaImage};

use crate::result::{CotejarError, CotejarResult};
use crate::tag;

/// Edge length of one comparison cell, in pixels
pub const CELL_SIZE: u32 = 16;

/// Subdirectory of the output root holding baseline copies
const BASELINE_SUBDIR: &str = "baseline";

/// Highlight color for difference cells and ignore masks (dark magenta)
const HIGHLIGHT: Rgba<u8> = Rgba([139, 0, 139, 255]);

/// Alpha applied to the translucent difference fill (out of 255)
const FILL_ALPHA: u16 = 64;

/// Coarse per-cell difference magnitudes between two images.
///
/// A cell value of zero means the averaged luma of the corresponding
/// 16x16-pixel blocks was identical.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DifferenceGrid {
    width: u32,
    height: u32,
    cells: Vec<u8>,
}

impl DifferenceGrid {
    /// Grid width in cells
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Grid height in cells
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Difference magnitude of one cell
    #[must_use]
    pub fn cell(&self, x: u32, y: u32) -> u8 {
        self.cells[(y * self.width + x) as usize]
    }

    /// Number of cells with a non-zero difference
    #[must_use]
    pub fn differing_cells(&self) -> usize {
        self.cells.iter().filter(|&&c| c > 0).count()
    }

    /// Whether no cell differs at all
    #[must_use]
    pub fn matched_exactly(&self) -> bool {
        self.differing_cells() == 0
    }

    /// Fraction of differing cells, in `[0.0, 1.0]`
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn difference_percentage(&self) -> f32 {
        if self.cells.is_empty() {
            return 0.0;
        }
        self.differing_cells() as f32 / self.cells.len() as f32
    }

    /// Iterate over `(x, y, magnitude)` of all non-zero cells
    pub fn differing(&self) -> impl Iterator<Item = (u32, u32, u8)> + '_ {
        self.cells.iter().enumerate().filter_map(move |(i, &c)| {
            if c > 0 {
                let i = u32::try_from(i).unwrap_or(u32::MAX);
                Some((i % self.width, i / self.width, c))
            } else {
                None
            }
        })
    }
}

/// Normalizes, diffs, overlays and persists comparison images.
#[derive(Debug, Clone)]
pub struct DiffProcessor {
    output_dir: PathBuf,
}

impl DiffProcessor {
    /// Create a processor writing report images under the given root.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Report output root
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Produce a comparison-friendly version of an image: down-sampled to
    /// the target grid resolution by averaging each source block, using
    /// fixed `0.3 R + 0.59 G + 0.11 B` luma weighting. Deterministic, and
    /// each output pixel depends only on its own source block.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn prepare_for_comparison(
        &self,
        image: &RgbaImage,
        target_width: u32,
        target_height: u32,
    ) -> GrayImage {
        let (source_width, source_height) = image.dimensions();
        let mut gray = GrayImage::new(target_width, target_height);
        if target_width == 0 || target_height == 0 || source_width == 0 || source_height == 0 {
            return gray;
        }

        let scale = |index: u32, source: u32, target: u32| -> u32 {
            (u64::from(index) * u64::from(source) / u64::from(target)) as u32
        };

        for cy in 0..target_height {
            let y0 = scale(cy, source_height, target_height);
            let y1 = scale(cy + 1, source_height, target_height).max(y0 + 1);
            for cx in 0..target_width {
                let x0 = scale(cx, source_width, target_width);
                let x1 = scale(cx + 1, source_width, target_width).max(x0 + 1);

                let mut total: u64 = 0;
                for y in y0..y1 {
                    for x in x0..x1 {
                        total += u64::from(luma(*image.get_pixel(x, y)));
                    }
                }
                let count = u64::from(x1 - x0) * u64::from(y1 - y0);
                gray.put_pixel(cx, cy, Luma([(total / count) as u8]));
            }
        }
        gray
    }

    /// Compute the per-cell difference grid between a baseline and a capture.
    ///
    /// Grid dimensions derive solely from the baseline: `baseline.width /
    /// CELL_SIZE` by `baseline.height / CELL_SIZE` cells, both floored.
    ///
    /// # Errors
    ///
    /// Returns [`CotejarError::DimensionMismatch`] when the raw pixel
    /// dimensions differ and `ignore_size_mismatch` is false.
    pub fn difference_grid(
        &self,
        baseline: &RgbaImage,
        capture: &RgbaImage,
        ignore_size_mismatch: bool,
    ) -> CotejarResult<DifferenceGrid> {
        let (baseline_width, baseline_height) = baseline.dimensions();
        let (capture_width, capture_height) = capture.dimensions();

        if !ignore_size_mismatch
            && (baseline_width, baseline_height) != (capture_width, capture_height)
        {
            return Err(CotejarError::DimensionMismatch {
                baseline_width,
                baseline_height,
                capture_width,
                capture_height,
            });
        }

        let width = baseline_width / CELL_SIZE;
        let height = baseline_height / CELL_SIZE;

        if width == 0 || height == 0 {
            return Ok(DifferenceGrid {
                width,
                height,
                cells: Vec::new(),
            });
        }

        let a = self.prepare_for_comparison(baseline, width, height);
        let b = self.prepare_for_comparison(capture, width, height);

        let mut cells = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            for x in 0..width {
                let Luma([va]) = *a.get_pixel(x, y);
                let Luma([vb]) = *b.get_pixel(x, y);
                cells.push(va.abs_diff(vb));
            }
        }

        Ok(DifferenceGrid {
            width,
            height,
            cells,
        })
    }

    /// Return a copy of `base` with every differing grid cell highlighted:
    /// a translucent fill plus a solid border, scaled back to full pixel
    /// coordinates.
    #[must_use]
    pub fn render_difference_overlay(&self, base: &RgbaImage, grid: &DifferenceGrid) -> RgbaImage {
        let mut overlay = base.clone();
        let (width, height) = overlay.dimensions();

        for (cell_x, cell_y, _) in grid.differing() {
            let x0 = cell_x * CELL_SIZE;
            let y0 = cell_y * CELL_SIZE;
            let x1 = (x0 + CELL_SIZE).min(width);
            let y1 = (y0 + CELL_SIZE).min(height);

            for y in y0..y1 {
                for x in x0..x1 {
                    let on_border = x == x0 || y == y0 || x + 1 == x1 || y + 1 == y1;
                    let pixel = if on_border {
                        HIGHLIGHT
                    } else {
                        blend(*overlay.get_pixel(x, y), HIGHLIGHT, FILL_ALPHA)
                    };
                    overlay.put_pixel(x, y, pixel);
                }
            }
        }

        overlay
    }

    /// Draw an opaque mask rectangle onto the image at pixel coordinates,
    /// clipped to the image bounds. The mutated image is the canonical one.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn draw_ignore_region(&self, image: &mut RgbaImage, x: i32, y: i32, width: u32, height: u32) {
        let (image_width, image_height) = image.dimensions();

        let x0 = u32::try_from(x.max(0)).unwrap_or(0).min(image_width);
        let y0 = u32::try_from(y.max(0)).unwrap_or(0).min(image_height);
        let x1 = i64::from(x)
            .saturating_add(i64::from(width))
            .clamp(0, i64::from(image_width)) as u32;
        let y1 = i64::from(y)
            .saturating_add(i64::from(height))
            .clamp(0, i64::from(image_height)) as u32;

        for py in y0..y1 {
            for px in x0..x1 {
                image.put_pixel(px, py, HIGHLIGHT);
            }
        }
    }

    /// Write an image as a PNG under the output root and return its path.
    ///
    /// Baseline copies land in a `baseline/` subdirectory; the file name is
    /// the sanitized tag, so reported paths line up with store keys.
    ///
    /// # Errors
    ///
    /// Returns [`CotejarError::Configuration`] for an unusable tag and I/O or
    /// encoding errors for failed writes.
    pub fn persist(&self, image: &RgbaImage, tag: &str, is_baseline_copy: bool) -> CotejarResult<PathBuf> {
        let name = tag::sanitize_tag(tag)?;

        let dir = if is_baseline_copy {
            self.output_dir.join(BASELINE_SUBDIR)
        } else {
            self.output_dir.clone()
        };
        fs::create_dir_all(&dir)?;

        let path = dir.join(format!("{name}.png"));
        fs::write(&path, encode_png(image)?)?;

        Ok(path)
    }
}

/// Fixed luma weighting used for all comparisons.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn luma(pixel: Rgba<u8>) -> u8 {
    let Rgba([r, g, b, _]) = pixel;
    let value = 0.3 * f32::from(r) + 0.59 * f32::from(g) + 0.11 * f32::from(b);
    value.round().clamp(0.0, 255.0) as u8
}

/// Alpha-blend `top` over `base` with the given alpha (out of 255).
#[allow(clippy::cast_possible_truncation)]
fn blend(base: Rgba<u8>, top: Rgba<u8>, alpha: u16) -> Rgba<u8> {
    let mix = |b: u8, t: u8| -> u8 {
        ((u16::from(b) * (255 - alpha) + u16::from(t) * alpha) / 255) as u8
    };
    Rgba([
        mix(base[0], top[0]),
        mix(base[1], top[1]),
        mix(base[2], top[2]),
        base[3],
    ])
}

/// Encode an image as lossless PNG bytes.
///
/// # Errors
///
/// Returns [`CotejarError::ImageProcessing`] when encoding fails.
pub(crate) fn encode_png(image: &RgbaImage) -> CotejarResult<Vec<u8>> {
    let mut buffer = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut buffer);
    encoder
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ExtendedColorType::Rgba8,
        )
        .map_err(|e| CotejarError::ImageProcessing {
            message: format!("failed to encode PNG: {e}"),
        })?;
    Ok(buffer)
}

/// Decode PNG (or any supported format) bytes into an RGBA image.
///
/// # Errors
///
/// Returns [`CotejarError::ImageProcessing`] when decoding fails.
pub(crate) fn decode_png(bytes: &[u8]) -> CotejarResult<RgbaImage> {
    let image = image::load_from_memory(bytes).map_err(|e| CotejarError::ImageProcessing {
        message: format!("failed to decode image: {e}"),
    })?;
    Ok(image.to_rgba8())
}
