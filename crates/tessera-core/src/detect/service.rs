//! Detection service trait and request type.

use async_trait::async_trait;

use crate::error::PipelineError;
use crate::types::Anchor;

/// One tile submitted for detection.
#[derive(Debug, Clone)]
pub struct TileRequest {
    /// Position in grid order
    pub index: usize,
    /// Where the tile was cut from
    pub anchor: Anchor,
    /// PNG-encoded tile bytes
    pub png: Vec<u8>,
}

impl TileRequest {
    /// File name sent alongside the upload, e.g. `tile_3.png`.
    pub fn file_name(&self) -> String {
        format!("tile_{}.png", self.index)
    }
}

/// An external service that annotates one tile at a time.
///
/// Uses `async_trait` so the pipeline can hold a `Box<dyn DetectionService>`.
#[async_trait]
pub trait DetectionService: Send + Sync {
    /// Service name for logging.
    fn name(&self) -> &str;

    /// Check whether the service is reachable and ready.
    async fn is_available(&self) -> bool;

    /// Submit one tile and return the encoded response image.
    ///
    /// Any non-success answer must come back as an error; the caller never
    /// inspects the bytes of a failed call.
    async fn detect(&self, request: &TileRequest) -> Result<Vec<u8>, PipelineError>;
}
