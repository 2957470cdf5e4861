//! Render adapter: grid snapshot to RGB frame.
//!
//! `render` is a pure function of a snapshot and the rule's per-cell color
//! mapping. The resulting `Frame` holds W×H float RGB triples in [0, 1];
//! the display side decides how to scale, show or record it. PNG export is
//! provided for headless runs without any windowing dependency.

use super::rule::Rule;
use super::ChannelGrid;
use image::error::{LimitError, LimitErrorKind};
use image::{ImageBuffer, ImageError, ImageResult, Rgb, RgbImage};
use std::path::Path;

/// W×H×3 float image, row-major, components in [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    width: usize,
    height: usize,
    pixels: Vec<[f32; 3]>,
}

impl Frame {
    /// Black frame.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![[0.0; 3]; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Color at `(x, y)`.
    pub fn get(&self, x: usize, y: usize) -> [f32; 3] {
        self.pixels[x + y * self.width]
    }

    pub fn pixels(&self) -> &[[f32; 3]] {
        &self.pixels
    }

    /// Convert to 8-bit RGB, one pixel per cell.
    pub fn to_rgb8(&self) -> ImageResult<RgbImage> {
        self.upscale(1)
    }

    /// Convert to 8-bit RGB with each cell drawn as a `pixel_size` square.
    ///
    /// Fails with a dimension limit error when the scaled image does not fit
    /// in `u32` pixels per side.
    pub fn upscale(&self, pixel_size: u32) -> ImageResult<RgbImage> {
        let pixel_size = pixel_size.max(1);
        let width = scaled_side(self.width, pixel_size)?;
        let height = scaled_side(self.height, pixel_size)?;

        Ok(ImageBuffer::from_fn(width, height, |px, py| {
            let color = self.get((px / pixel_size) as usize, (py / pixel_size) as usize);
            Rgb(color.map(to_byte))
        }))
    }

    /// Save as PNG with each cell drawn as a `pixel_size` square.
    pub fn save_png(&self, path: &Path, pixel_size: u32) -> ImageResult<()> {
        self.upscale(pixel_size)?.save(path)
    }
}

fn scaled_side(cells: usize, pixel_size: u32) -> ImageResult<u32> {
    u32::try_from(cells)
        .ok()
        .and_then(|cells| cells.checked_mul(pixel_size))
        .ok_or_else(|| ImageError::Limits(LimitError::from_kind(LimitErrorKind::DimensionError)))
}

#[inline]
fn to_byte(component: f32) -> u8 {
    (clamp_unit(component) * 255.0).round() as u8
}

#[inline]
fn clamp_unit(component: f32) -> f32 {
    if component.is_nan() {
        0.0
    } else {
        component.clamp(0.0, 1.0)
    }
}

/// Map every cell of `grid` to its display color.
pub fn render(grid: &ChannelGrid, rule: &dyn Rule) -> Frame {
    let pixels = grid
        .cells()
        .map(|cell| rule.color(cell).map(clamp_unit))
        .collect();
    Frame {
        width: grid.width(),
        height: grid.height(),
        pixels,
    }
}
