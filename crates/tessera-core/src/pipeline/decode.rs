//! Source image decoding with format sniffing, limits and a timeout.

use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader, Limits};
use std::io::Cursor;
use std::path::Path;
use std::time::Duration;
use tokio::time::timeout;

use crate::config::LimitsConfig;
use crate::error::PipelineError;

/// Image decoder with configurable limits and timeout.
pub struct ImageDecoder {
    limits: LimitsConfig,
}

/// A decoded source image plus what we learned while reading it.
pub struct DecodedImage {
    /// The decoded image data
    pub image: DynamicImage,
    /// Detected image format
    pub format: ImageFormat,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Original file size in bytes
    pub file_size: u64,
    /// BLAKE3 hash of the encoded bytes
    pub content_hash: String,
}

impl ImageDecoder {
    /// Create a new decoder with the given limits.
    pub fn new(limits: LimitsConfig) -> Self {
        Self { limits }
    }

    /// Read and decode an image file.
    pub async fn decode(&self, path: &Path) -> Result<DecodedImage, PipelineError> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PipelineError::FileNotFound(path.to_path_buf())
            } else {
                PipelineError::Decode {
                    path: path.to_path_buf(),
                    message: format!("Cannot read file: {e}"),
                }
            }
        })?;
        self.decode_from_bytes(bytes, path).await
    }

    /// Decode an image from an in-memory byte buffer with validation and timeout.
    ///
    /// `path` is only used for error messages and as a format hint.
    pub async fn decode_from_bytes(
        &self,
        bytes: Vec<u8>,
        path: &Path,
    ) -> Result<DecodedImage, PipelineError> {
        let path_owned = path.to_path_buf();
        let limits = self.limits.clone();
        let timeout_duration = Duration::from_millis(self.limits.decode_timeout_ms);

        let decode_result = timeout(timeout_duration, async {
            tokio::task::spawn_blocking(move || {
                Self::decode_bytes_sync(&bytes, &path_owned, &limits)
            })
            .await
        })
        .await;

        match decode_result {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(PipelineError::Decode {
                path: path.to_path_buf(),
                message: format!("Task join error: {}", e),
            }),
            Err(_) => Err(PipelineError::Timeout {
                path: path.to_path_buf(),
                stage: "decode".to_string(),
                timeout_ms: self.limits.decode_timeout_ms,
            }),
        }
    }

    /// Synchronous decode from bytes (runs in spawn_blocking).
    ///
    /// Dimensions are read from the header first, so an oversized image is
    /// rejected before any pixel buffer is allocated.
    fn decode_bytes_sync(
        bytes: &[u8],
        path: &Path,
        limits: &LimitsConfig,
    ) -> Result<DecodedImage, PipelineError> {
        let decode_error = |message: String| PipelineError::Decode {
            path: path.to_path_buf(),
            message,
        };

        let (width, height) = Self::reader(bytes, path, limits)?
            .0
            .into_dimensions()
            .map_err(|e| decode_error(format!("Cannot read image header: {e}")))?;

        if width > limits.max_image_dimension || height > limits.max_image_dimension {
            return Err(PipelineError::ImageTooLarge {
                path: path.to_path_buf(),
                width,
                height,
                max_dim: limits.max_image_dimension,
            });
        }
        if width == 0 || height == 0 {
            return Err(decode_error(format!("Image has no pixels ({width}x{height})")));
        }

        let (reader, format) = Self::reader(bytes, path, limits)?;
        let image = reader.decode().map_err(|e| decode_error(e.to_string()))?;

        Ok(DecodedImage {
            width: image.width(),
            height: image.height(),
            image,
            format,
            file_size: bytes.len() as u64,
            content_hash: blake3::hash(bytes).to_hex().to_string(),
        })
    }

    /// A reader over `bytes` with its format resolved and limits applied.
    fn reader<'a>(
        bytes: &'a [u8],
        path: &Path,
        limits: &LimitsConfig,
    ) -> Result<(ImageReader<Cursor<&'a [u8]>>, ImageFormat), PipelineError> {
        let mut reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| PipelineError::Decode {
                path: path.to_path_buf(),
                message: format!("Cannot detect image format: {}", e),
            })?;
        let format = match reader.format() {
            Some(f) => f,
            None => {
                let f = ImageFormat::from_path(path).map_err(|_| PipelineError::Decode {
                    path: path.to_path_buf(),
                    message: "Unrecognized image format".to_string(),
                })?;
                reader.set_format(f);
                f
            }
        };
        reader.limits(image_limits(limits));
        Ok((reader, format))
    }
}

/// Decoder limits matching `[limits]`.
///
/// The allocation cap fits a 16-bit RGBA image at the dimension limit, so the
/// dimension check is the one that trips first.
pub fn image_limits(limits: &LimitsConfig) -> Limits {
    let max_dim = limits.max_image_dimension;
    let mut image_limits = Limits::default();
    image_limits.max_image_width = Some(max_dim);
    image_limits.max_image_height = Some(max_dim);
    image_limits.max_alloc = Some(
        u64::from(max_dim)
            .saturating_mul(u64::from(max_dim))
            .saturating_mul(8),
    );
    image_limits
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([10, 20, 30, 255]));
        crate::tiling::encode_png(&img).unwrap()
    }

    #[tokio::test]
    async fn test_decode_png_bytes() {
        let decoder = ImageDecoder::new(LimitsConfig::default());
        let decoded = decoder
            .decode_from_bytes(png_bytes(40, 30), Path::new("board.png"))
            .await
            .unwrap();
        assert_eq!((decoded.width, decoded.height), (40, 30));
        assert_eq!(decoded.format, ImageFormat::Png);
        assert_eq!(decoded.content_hash.len(), 64);
    }

    #[tokio::test]
    async fn test_format_detected_by_content() {
        // PNG bytes under a .jpg name are still read as PNG.
        let decoder = ImageDecoder::new(LimitsConfig::default());
        let decoded = decoder
            .decode_from_bytes(png_bytes(8, 8), Path::new("misnamed.jpg"))
            .await
            .unwrap();
        assert_eq!(decoded.format, ImageFormat::Png);
    }

    #[tokio::test]
    async fn test_decode_garbage_fails() {
        let decoder = ImageDecoder::new(LimitsConfig::default());
        let err = decoder
            .decode_from_bytes(b"definitely not an image".to_vec(), Path::new("x.png"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, PipelineError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_decode_rejects_oversized_image() {
        let limits = LimitsConfig {
            max_image_dimension: 16,
            ..LimitsConfig::default()
        };
        let decoder = ImageDecoder::new(limits);
        let err = decoder
            .decode_from_bytes(png_bytes(32, 8), Path::new("big.png"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, PipelineError::ImageTooLarge { width: 32, .. }));
    }

    #[tokio::test]
    async fn test_oversized_rejected_before_pixel_data_is_read() {
        // Header intact, tail (image data CRC and IEND) corrupted.
        let mut header = png_bytes(120, 10);
        let len = header.len();
        header[len - 16..].fill(0);
        let limits = LimitsConfig {
            max_image_dimension: 100,
            ..LimitsConfig::default()
        };
        let err = ImageDecoder::new(limits)
            .decode_from_bytes(header, Path::new("scan.png"))
            .await
            .err()
            .unwrap();
        assert!(matches!(
            err,
            PipelineError::ImageTooLarge {
                width: 120,
                height: 10,
                max_dim: 100,
                ..
            }
        ));
    }

    #[test]
    fn test_limits_follow_dimension_limit() {
        let limits = image_limits(&LimitsConfig::default());
        assert_eq!(limits.max_image_width, Some(30_000));
        assert_eq!(limits.max_image_height, Some(30_000));
        // A 12000x12000 RGBA scan must fit, well past the decoder's 512 MiB default.
        let rgba_12k = 12_000u64 * 12_000 * 4;
        assert!(limits.max_alloc.unwrap() >= rgba_12k);
        assert!(limits.max_alloc.unwrap() >= 30_000u64 * 30_000 * 4);
    }

    #[tokio::test]
    async fn test_dimension_limit_is_inclusive() {
        let limits = LimitsConfig {
            max_image_dimension: 32,
            ..LimitsConfig::default()
        };
        let decoded = ImageDecoder::new(limits)
            .decode_from_bytes(png_bytes(32, 32), Path::new("edge.png"))
            .await
            .unwrap();
        assert_eq!((decoded.width, decoded.height), (32, 32));
    }

    #[tokio::test]
    async fn test_decode_missing_file() {
        let decoder = ImageDecoder::new(LimitsConfig::default());
        let err = decoder
            .decode(Path::new("/nonexistent/board.png"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, PipelineError::FileNotFound(_)));
    }
}
