//! Tile extraction, binarization and PNG encoding.

use image::{imageops, ImageFormat, RgbaImage};
use std::io::Cursor;

use crate::error::{PipelineError, PipelineResult};
use crate::types::Anchor;

use super::threshold::{luminance, otsu_threshold, Histogram};

/// A tile encoded and ready to upload.
#[derive(Debug, Clone)]
pub struct EncodedTile {
    /// Where the tile was cut from
    pub anchor: Anchor,
    /// PNG bytes, always `tile_size × tile_size`
    pub png: Vec<u8>,
    /// Threshold used when the tile was binarized
    pub threshold: Option<u8>,
}

/// Copy the `tile_size × tile_size` region at `anchor` into a new buffer.
///
/// Parts of the tile that fall outside `source` stay transparent black.
pub fn extract_region(source: &RgbaImage, anchor: Anchor, tile_size: u32) -> RgbaImage {
    let region = imageops::crop_imm(source, anchor.x, anchor.y, tile_size, tile_size).to_image();
    if region.dimensions() == (tile_size, tile_size) {
        return region;
    }

    let mut tile = RgbaImage::new(tile_size, tile_size);
    imageops::replace(&mut tile, &region, 0, 0);
    tile
}

/// Reduce `tile` to pure black and white in place and return the threshold used.
///
/// Pixels whose luminance reaches the Otsu threshold become white, the rest
/// black. Alpha is left alone.
pub fn binarize(tile: &mut RgbaImage) -> u8 {
    let luma: Vec<u8> = tile
        .pixels()
        .map(|p| luminance(p[0], p[1], p[2]))
        .collect();
    let threshold = otsu_threshold(&Histogram::from_luma(luma.iter().copied()));

    for (pixel, &l) in tile.pixels_mut().zip(&luma) {
        let v = if l >= threshold { 255 } else { 0 };
        pixel[0] = v;
        pixel[1] = v;
        pixel[2] = v;
    }
    threshold
}

/// Encode an RGBA buffer as PNG.
pub fn encode_png(image: &RgbaImage) -> PipelineResult<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(|e| PipelineError::Encode(e.to_string()))?;
    Ok(buffer.into_inner())
}

/// Cut one tile, optionally binarize it, and encode it as PNG.
pub fn extract_tile(
    source: &RgbaImage,
    anchor: Anchor,
    tile_size: u32,
    apply_threshold: bool,
) -> PipelineResult<EncodedTile> {
    let mut tile = extract_region(source, anchor, tile_size);
    let threshold = apply_threshold.then(|| binarize(&mut tile));
    Ok(EncodedTile {
        anchor,
        png: encode_png(&tile)?,
        threshold,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn gradient(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8, 255])
        })
    }

    #[test]
    fn test_extract_region_copies_pixels() {
        let source = gradient(100, 80);
        let tile = extract_region(&source, Anchor::new(30, 20), 32);
        assert_eq!(tile.dimensions(), (32, 32));
        for y in 0..32 {
            for x in 0..32 {
                assert_eq!(tile.get_pixel(x, y), source.get_pixel(x + 30, y + 20));
            }
        }
    }

    #[test]
    fn test_extract_region_pads_small_source() {
        let source = RgbaImage::from_pixel(10, 6, Rgba([200, 100, 50, 255]));
        let tile = extract_region(&source, Anchor::new(0, 0), 16);
        assert_eq!(tile.dimensions(), (16, 16));
        assert_eq!(*tile.get_pixel(9, 5), Rgba([200, 100, 50, 255]));
        assert_eq!(*tile.get_pixel(10, 0), Rgba([0, 0, 0, 0]));
        assert_eq!(*tile.get_pixel(0, 6), Rgba([0, 0, 0, 0]));
        assert_eq!(*tile.get_pixel(15, 15), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn test_binarize_bimodal() {
        let mut tile = RgbaImage::from_fn(8, 8, |x, _| {
            if x < 4 {
                Rgba([20, 20, 20, 255])
            } else {
                Rgba([220, 220, 220, 128])
            }
        });
        let t = binarize(&mut tile);
        assert!(t > 20 && t < 220);
        for (x, _, p) in tile.enumerate_pixels() {
            if x < 4 {
                assert_eq!(*p, Rgba([0, 0, 0, 255]));
            } else {
                assert_eq!(*p, Rgba([255, 255, 255, 128]));
            }
        }
    }

    #[test]
    fn test_binarize_is_two_level() {
        let mut tile = gradient(64, 64);
        binarize(&mut tile);
        assert!(tile
            .pixels()
            .all(|p| (p[0] == 0 || p[0] == 255) && p[0] == p[1] && p[1] == p[2]));
    }

    #[test]
    fn test_extract_tile_without_threshold_round_trips() {
        let source = gradient(50, 50);
        let tile = extract_tile(&source, Anchor::new(10, 10), 32, false).unwrap();
        assert!(tile.threshold.is_none());
        assert_eq!(&tile.png[1..4], b"PNG");

        let decoded = image::load_from_memory(&tile.png).unwrap().to_rgba8();
        assert_eq!(decoded, extract_region(&source, Anchor::new(10, 10), 32));
    }

    #[test]
    fn test_extract_tile_with_threshold_reports_it() {
        let source = gradient(50, 50);
        let tile = extract_tile(&source, Anchor::new(0, 0), 32, true).unwrap();
        assert!(tile.threshold.is_some());

        let decoded = image::load_from_memory(&tile.png).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (32, 32));
        assert!(decoded.pixels().all(|p| p[0] == 0 || p[0] == 255));
    }
}
