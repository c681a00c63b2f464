//! Tile grid planning.
//!
//! Fixed-size square tiles are spread evenly over each axis so the first tile
//! starts at 0 and the last ends exactly at the image edge. Interior tiles
//! overlap slightly whenever the length is not a multiple of the tile size.

use crate::error::{PipelineError, PipelineResult};
use crate::types::Anchor;

/// Compute the tile start offsets along one axis.
///
/// Returns `ceil(length / tile_size)` offsets. With more than one tile, offset
/// `i` is `round(i * (length - tile_size) / (count - 1))`, rounding halves up,
/// so the sequence starts at 0 and ends at `length - tile_size`. When the axis
/// fits in a single tile the result is `[0]`. A zero `tile_size` yields an
/// empty plan.
pub fn compute_axis_coords(length: u32, tile_size: u32) -> Vec<u32> {
    if tile_size == 0 {
        return Vec::new();
    }
    let count = length.div_ceil(tile_size).max(1);
    if count == 1 {
        return vec![0];
    }

    let span = u64::from(length - tile_size);
    let steps = u64::from(count - 1);
    (0..u64::from(count))
        .map(|i| ((2 * i * span + steps) / (2 * steps)) as u32)
        .collect()
}

/// The full 2-D set of tile anchors for one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileGrid {
    width: u32,
    height: u32,
    tile_size: u32,
    columns: Vec<u32>,
    rows: Vec<u32>,
}

impl TileGrid {
    /// Plan the grid for a `width × height` image.
    pub fn plan(width: u32, height: u32, tile_size: u32) -> PipelineResult<Self> {
        if width == 0 || height == 0 || tile_size == 0 {
            return Err(PipelineError::InvalidDimensions {
                width,
                height,
                tile_size,
            });
        }

        Ok(Self {
            width,
            height,
            tile_size,
            columns: compute_axis_coords(width, tile_size),
            rows: compute_axis_coords(height, tile_size),
        })
    }

    /// Anchors in row-major order: rows outer, columns inner.
    pub fn anchors(&self) -> impl Iterator<Item = Anchor> + '_ {
        self.rows
            .iter()
            .flat_map(move |&y| self.columns.iter().map(move |&x| Anchor::new(x, y)))
    }

    /// Number of tiles in the grid.
    pub fn len(&self) -> usize {
        self.columns.len() * self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Column offsets (x axis).
    pub fn columns(&self) -> &[u32] {
        &self.columns
    }

    /// Row offsets (y axis).
    pub fn rows(&self) -> &[u32] {
        &self.rows
    }
}
