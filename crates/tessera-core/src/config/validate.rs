//! Configuration validation with range checks.

use crate::error::ConfigError;
use crate::output::OutputFormat;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tiling.tile_size == 0 {
            return Err(ConfigError::ValidationError(
                "tiling.tile_size must be > 0".into(),
            ));
        }
        if self.detector.endpoint.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "detector.endpoint must not be empty".into(),
            ));
        }
        if self.detector.detect_path.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "detector.detect_path must not be empty".into(),
            ));
        }
        if self.detector.health_path.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "detector.health_path must not be empty".into(),
            ));
        }
        if self.detector.form_field.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "detector.form_field must not be empty".into(),
            ));
        }
        if self.detector.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "detector.timeout_ms must be > 0".into(),
            ));
        }
        if self.limits.max_file_size_mb == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_file_size_mb must be > 0".into(),
            ));
        }
        if self.limits.max_image_dimension == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_image_dimension must be > 0".into(),
            ));
        }
        if self.limits.decode_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "limits.decode_timeout_ms must be > 0".into(),
            ));
        }
        if OutputFormat::parse(&self.output.report_format).is_none() {
            return Err(ConfigError::ValidationError(format!(
                "output.report_format must be \"json\" or \"jsonl\", got \"{}\"",
                self.output.report_format
            )));
        }
        Ok(())
    }
}
