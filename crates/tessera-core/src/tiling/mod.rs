//! Tiling primitives: grid planning, threshold selection and tile extraction.
//!
//! # Usage
//!
//! ```rust,ignore
//! use tessera_core::tiling::{extract_tile, TileGrid};
//!
//! let grid = TileGrid::plan(source.width(), source.height(), 640)?;
//! for (index, anchor) in grid.anchors().enumerate() {
//!     let tile = extract_tile(&source, anchor, grid.tile_size(), true)?;
//!     // tile.png is ready to upload
//! }
//! ```

pub mod extract;
pub mod grid;
pub mod threshold;

pub use extract::{binarize, encode_png, extract_region, extract_tile, EncodedTile};
pub use grid::{compute_axis_coords, TileGrid};
pub use threshold::{luminance, otsu_threshold, select_threshold, Histogram};
