//! Core data types shared by the tiling pipeline stages.

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::path::PathBuf;

/// Top-left pixel offset of a tile within the source image.
///
/// Anchors order row-major (by `y`, then `x`), the order tiles are planned in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Anchor {
    pub x: u32,
    pub y: u32,
}

impl Anchor {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

impl Ord for Anchor {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.y, self.x).cmp(&(other.y, other.x))
    }
}

impl PartialOrd for Anchor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A tile image returned by the detection service, paired with where it goes.
///
/// Always `tile_size × tile_size`; the pipeline rejects anything else before
/// one of these is built.
#[derive(Debug, Clone)]
pub struct ProcessedTile {
    /// Position in grid order
    pub index: usize,
    /// Where the tile is painted on the output canvas
    pub anchor: Anchor,
    /// Decoded response pixels
    pub image: RgbaImage,
}

/// Per-tile entry in a [`JobReport`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileRecord {
    /// Position in grid order
    pub index: usize,

    /// Top-left offset in the source image
    pub anchor: Anchor,

    /// Otsu threshold applied before upload (absent when binarization is off)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<u8>,

    /// Size of the encoded tile sent to the service
    pub payload_bytes: usize,

    /// Round-trip latency of the detection call
    pub latency_ms: u64,
}

/// Summary of one completed job, suitable for JSON output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    /// Source file, when the job was started from disk
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,

    /// BLAKE3 hash of the source file bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,

    /// Source width in pixels
    pub width: u32,

    /// Source height in pixels
    pub height: u32,

    /// Tile edge length used for the job
    pub tile_size: u32,

    /// Whether tiles were binarized before upload
    pub apply_threshold: bool,

    /// Number of tile columns
    pub columns: usize,

    /// Number of tile rows
    pub rows: usize,

    /// Per-tile records in grid order
    pub tiles: Vec<TileRecord>,

    /// Wall-clock time for the whole job
    pub elapsed_ms: u64,
}

impl JobReport {
    /// Total number of tiles in the job.
    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    /// Mean detection round-trip latency, or zero for an empty job.
    pub fn mean_latency_ms(&self) -> f64 {
        if self.tiles.is_empty() {
            return 0.0;
        }
        let total: u64 = self.tiles.iter().map(|t| t.latency_ms).sum();
        total as f64 / self.tiles.len() as f64
    }
}

/// The outcome of a successful job: the stitched image plus its report.
#[derive(Debug, Clone)]
pub struct JobResult {
    /// Composited canvas at the source's original dimensions
    pub image: RgbaImage,

    /// PNG encoding of `image`
    pub png: Vec<u8>,

    /// Job summary
    pub report: JobReport,
}
