//! Sub-configuration structs and their defaults.

use serde::{Deserialize, Serialize};

/// Tile grid and binarization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TilingConfig {
    /// Edge length of every square tile, in pixels
    pub tile_size: u32,

    /// Binarize each tile with an Otsu threshold before sending it
    pub apply_threshold: bool,
}

impl Default for TilingConfig {
    fn default() -> Self {
        Self {
            tile_size: 640,
            apply_threshold: true,
        }
    }
}

/// Detection service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Base URL of the detection service
    pub endpoint: String,

    /// Path of the tile detection route
    pub detect_path: String,

    /// Path of the health check route
    pub health_path: String,

    /// Multipart form field carrying the tile image
    pub form_field: String,

    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:5000".to_string(),
            detect_path: "/detect".to_string(),
            health_path: "/health".to_string(),
            form_field: "image".to_string(),
            timeout_ms: 60_000,
        }
    }
}

impl DetectorConfig {
    /// Join the endpoint with a route path, tolerating stray slashes on either side.
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.endpoint.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Input discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// File extensions picked up when a directory is given as input
    pub supported_formats: Vec<String>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            supported_formats: vec![
                "jpg".to_string(),
                "jpeg".to_string(),
                "png".to_string(),
                "webp".to_string(),
                "bmp".to_string(),
                "tif".to_string(),
                "tiff".to_string(),
                "gif".to_string(),
            ],
        }
    }
}

/// Resource limits to protect against problematic inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum file size in megabytes
    pub max_file_size_mb: u64,

    /// Maximum image dimension (width or height)
    pub max_image_dimension: u32,

    /// Decode timeout in milliseconds
    pub decode_timeout_ms: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: 200,
            max_image_dimension: 30_000,
            decode_timeout_ms: 30_000,
        }
    }
}

/// Job report settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Report format ("json" or "jsonl")
    pub report_format: String,

    /// Pretty-print JSON reports
    pub pretty: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            report_format: "json".to_string(),
            pretty: true,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
