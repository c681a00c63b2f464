//! Tessera Core - tiled image processing against a remote detection service.
//!
//! A large source image is cut into fixed-size square tiles, each tile is
//! optionally binarized with an Otsu threshold, sent to a detection server
//! one at a time, and the returned tiles are stitched back into an image of
//! the original size.
//!
//! # Architecture
//!
//! ```text
//! Image → Plan grid → [Extract → Threshold → Detect] × N → Composite → PNG
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use tessera_core::{Config, JobOptions, TilePipeline};
//!
//! #[tokio::main]
//! async fn main() -> tessera_core::Result<()> {
//!     let config = Config::load()?;
//!     let pipeline = TilePipeline::from_config(&config);
//!
//!     let result = pipeline
//!         .process_path("board.jpg".as_ref(), &JobOptions::default())
//!         .await?;
//!     std::fs::write("board_result.png", &result.png)?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod detect;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod tiling;
pub mod types;

pub use config::Config;
pub use detect::{DetectionService, HealthStatus, HttpDetector, TileRequest};
pub use error::{ConfigError, PipelineError, PipelineResult, Result, TesseraError};
pub use output::{OutputFormat, ReportWriter};
pub use pipeline::{JobOptions, JobState, JobStatus, Progress, TilePipeline};
pub use tiling::TileGrid;
pub use types::{Anchor, JobReport, JobResult, ProcessedTile, TileRecord};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_pipeline_from_default_config() {
        let config = Config::default();
        let pipeline = TilePipeline::from_config(&config);
        assert_eq!(pipeline.tile_size(), 640);
        assert_eq!(pipeline.detector().name(), "http");
        assert_eq!(pipeline.status().state, JobState::Idle);
    }
}
