//! Stitching processed tiles back into a full-size canvas.

use image::{imageops, Rgba, RgbaImage};

use crate::types::ProcessedTile;

/// Canvas background where no tile lands.
pub const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Paint `tiles` onto a white `width × height` canvas at their anchors.
///
/// Tiles are written in the order given, so later tiles win where they
/// overlap. Pixels are copied, not blended, and anything past the canvas
/// edge is clipped.
pub fn composite(width: u32, height: u32, tiles: &[ProcessedTile]) -> RgbaImage {
    let mut canvas = RgbaImage::from_pixel(width, height, BACKGROUND);
    for tile in tiles {
        imageops::replace(
            &mut canvas,
            &tile.image,
            i64::from(tile.anchor.x),
            i64::from(tile.anchor.y),
        );
    }
    canvas
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Anchor;

    fn solid(index: usize, x: u32, y: u32, size: u32, v: u8) -> ProcessedTile {
        ProcessedTile {
            index,
            anchor: Anchor::new(x, y),
            image: RgbaImage::from_pixel(size, size, Rgba([v, v, v, 255])),
        }
    }

    #[test]
    fn test_empty_canvas_is_white() {
        let canvas = composite(5, 3, &[]);
        assert_eq!(canvas.dimensions(), (5, 3));
        assert!(canvas.pixels().all(|p| *p == BACKGROUND));
    }

    #[test]
    fn test_later_tiles_overwrite_overlap() {
        // 10 px wide, tiles of 6 at x = 0 and x = 4 overlap on [4, 6).
        let tiles = [solid(0, 0, 0, 6, 10), solid(1, 4, 0, 6, 200)];
        let canvas = composite(10, 6, &tiles);
        assert_eq!(canvas.get_pixel(3, 0)[0], 10);
        assert_eq!(canvas.get_pixel(4, 0)[0], 200);
        assert_eq!(canvas.get_pixel(9, 5)[0], 200);
    }

    #[test]
    fn test_oversized_tile_is_clipped() {
        // Source smaller than the tile: the padded part falls off the canvas.
        let tiles = [solid(0, 0, 0, 16, 50)];
        let canvas = composite(7, 4, &tiles);
        assert_eq!(canvas.dimensions(), (7, 4));
        assert!(canvas.pixels().all(|p| p[0] == 50));
    }
}
