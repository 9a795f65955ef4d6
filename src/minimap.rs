//! Coarse biome grids for minimaps and debug views.

use std::collections::BTreeMap;
use std::path::Path;

use image::{ImageBuffer, Rgb, RgbImage};

use crate::biomes::Biome;
use crate::chunk::TileCoord;
use crate::export::ExportError;

/// Color for cells whose chunk has not arrived yet
pub const LOADING_COLOR: (u8, u8, u8) = (90, 90, 90);

/// A grid of sampled tiles, row-major. `None` marks a cell still loading.
#[derive(Clone, Debug, PartialEq)]
pub struct MinimapGrid {
    pub width: usize,
    pub height: usize,
    /// Tile sampled by the top-left cell
    pub origin: TileCoord,
    /// Tiles between neighbouring samples
    pub stride: f64,
    pub cells: Vec<Option<Biome>>,
}

impl MinimapGrid {
    pub fn get(&self, x: usize, y: usize) -> Option<Biome> {
        self.cells.get(y * self.width + x).copied().flatten()
    }

    pub fn color(&self, x: usize, y: usize) -> (u8, u8, u8) {
        self.get(x, y).map(|b| b.color()).unwrap_or(LOADING_COLOR)
    }

    /// Colors of every cell, row-major
    pub fn colors(&self) -> Vec<(u8, u8, u8)> {
        self.cells
            .iter()
            .map(|cell| cell.map(|b| b.color()).unwrap_or(LOADING_COLOR))
            .collect()
    }

    /// Count of cells per biome (loading cells are skipped)
    pub fn census(&self) -> BTreeMap<Biome, usize> {
        let mut counts = BTreeMap::new();
        for biome in self.cells.iter().flatten() {
            *counts.entry(*biome).or_insert(0) += 1;
        }
        counts
    }

    /// One character per cell, one line per row. Loading cells print as `?`.
    pub fn to_ascii(&self) -> String {
        let mut out = String::with_capacity((self.width + 1) * self.height);
        for row in self.cells.chunks(self.width.max(1)) {
            out.extend(row.iter().map(|cell| cell.map(|b| b.ascii_char()).unwrap_or('?')));
            out.push('\n');
        }
        out
    }

    /// Render with `cell_px × cell_px` pixels per cell.
    pub fn to_image(&self, cell_px: u32) -> RgbImage {
        let cell_px = cell_px.max(1);
        let mut img: RgbImage = ImageBuffer::new(self.width as u32 * cell_px, self.height as u32 * cell_px);
        for (px, py, pixel) in img.enumerate_pixels_mut() {
            let (r, g, b) = self.color((px / cell_px) as usize, (py / cell_px) as usize);
            *pixel = Rgb([r, g, b]);
        }
        img
    }

    pub fn save_png<P: AsRef<Path>>(&self, path: P, cell_px: u32) -> Result<(), ExportError> {
        self.to_image(cell_px).save(path)?;
        Ok(())
    }
}
