//! Cheap checks on a source file before it is decoded.

use std::io::Read;
use std::path::Path;

use crate::config::LimitsConfig;
use crate::error::PipelineError;

/// Leading bytes of the containers the decoder understands.
const SIGNATURES: &[(&str, &[u8])] = &[
    ("jpeg", &[0xFF, 0xD8, 0xFF]),
    ("png", &[0x89, b'P', b'N', b'G']),
    ("gif", b"GIF8"),
    ("bmp", b"BM"),
    ("tiff", &[b'I', b'I', 0x2A, 0x00]),
    ("tiff", &[b'M', b'M', 0x00, 0x2A]),
];

/// Validates source files before decoding.
pub struct Validator {
    limits: LimitsConfig,
}

impl Validator {
    /// Create a new validator with the given limits.
    pub fn new(limits: LimitsConfig) -> Self {
        Self { limits }
    }

    /// Check that `path` exists, fits the size limit and looks like an image.
    pub fn validate(&self, path: &Path) -> Result<(), PipelineError> {
        if !path.exists() {
            return Err(PipelineError::FileNotFound(path.to_path_buf()));
        }

        let metadata = std::fs::metadata(path).map_err(|e| PipelineError::Decode {
            path: path.to_path_buf(),
            message: format!("Cannot read metadata: {}", e),
        })?;

        let max_bytes = self.limits.max_file_size_mb * 1024 * 1024;
        if metadata.len() > max_bytes {
            return Err(PipelineError::FileTooLarge {
                path: path.to_path_buf(),
                size_mb: metadata.len() / (1024 * 1024),
                max_mb: self.limits.max_file_size_mb,
            });
        }

        let mut header = [0u8; 12];
        let bytes_read = std::fs::File::open(path)
            .and_then(|mut file| file.read(&mut header))
            .map_err(|e| PipelineError::Decode {
                path: path.to_path_buf(),
                message: format!("Cannot open file: {}", e),
            })?;

        if Self::sniff(&header[..bytes_read]).is_none() {
            return Err(PipelineError::Decode {
                path: path.to_path_buf(),
                message: "Unrecognized image format (invalid magic bytes)".to_string(),
            });
        }

        Ok(())
    }

    /// Name the container format from the first bytes of a file.
    pub fn sniff(header: &[u8]) -> Option<&'static str> {
        if let Some((name, _)) = SIGNATURES.iter().find(|(_, sig)| header.starts_with(sig)) {
            return Some(*name);
        }
        // WebP: RIFF....WEBP
        if header.len() >= 12 && header.starts_with(b"RIFF") && &header[8..12] == b"WEBP" {
            return Some("webp");
        }
        None
    }
}
