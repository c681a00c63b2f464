//! Error types for the Tessera tiling pipeline.
//!
//! Errors are organized by stage so a failed job reports which stage broke,
//! which file or tile was involved, and what the detection service said.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for Tessera operations.
#[derive(Error, Debug)]
pub enum TesseraError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Pipeline processing errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Pipeline processing errors, organized by stage.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Source image could not be decoded
    #[error("Decode error for {path}: {message}")]
    Decode { path: PathBuf, message: String },

    /// A tile or the final composite could not be encoded
    #[error("Encode error: {0}")]
    Encode(String),

    /// The detection service rejected a tile or could not be reached
    #[error("Detection failed for tile {tile_index}: {message}")]
    Detection {
        tile_index: usize,
        message: String,
        status_code: Option<u16>,
    },

    /// The detection service's health route failed or could not be reached
    #[error("Health check against {url} failed: {message}")]
    Health {
        url: String,
        message: String,
        status_code: Option<u16>,
    },

    /// The detection service returned a tile of the wrong size
    #[error(
        "Detection returned {actual_width}x{actual_height} for tile {tile_index}, expected {expected}x{expected}"
    )]
    DimensionMismatch {
        tile_index: usize,
        expected: u32,
        actual_width: u32,
        actual_height: u32,
    },

    /// Width, height or tile size is zero
    #[error("Invalid dimensions: {width}x{height} with tile size {tile_size}")]
    InvalidDimensions {
        width: u32,
        height: u32,
        tile_size: u32,
    },

    /// Operation timed out
    #[error("Timeout in {stage} stage for {path} after {timeout_ms}ms")]
    Timeout {
        path: PathBuf,
        stage: String,
        timeout_ms: u64,
    },

    /// File exceeds size limit
    #[error("File too large: {path} ({size_mb}MB > {max_mb}MB)")]
    FileTooLarge {
        path: PathBuf,
        size_mb: u64,
        max_mb: u64,
    },

    /// Image dimensions exceed limit
    #[error("Image too large: {path} ({width}x{height} > {max_dim})")]
    ImageTooLarge {
        path: PathBuf,
        width: u32,
        height: u32,
        max_dim: u32,
    },

    /// File not found
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),
}

impl PipelineError {
    /// Whether this error came from the remote detection service.
    ///
    /// Dimension mismatches count as remote failures.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            PipelineError::Detection { .. }
                | PipelineError::DimensionMismatch { .. }
                | PipelineError::Health { .. }
        )
    }
}

/// Convenience type alias for Tessera results.
pub type Result<T> = std::result::Result<T, TesseraError>;

/// Convenience type alias for pipeline-specific results.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
