//! Decode side of the codec adapter.

use image::{DynamicImage, ImageFormat, ImageReader};
use lumen_core::models::{MediaFormat, TransformLimits};
use lumen_core::AppError;
use std::io::Cursor;
use std::path::Path;

use crate::orientation::read_exif_orientation;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("failed to decode image: {0}")]
    Decode(String),

    #[error("failed to encode {format}: {message}")]
    Encode {
        format: MediaFormat,
        message: String,
    },

    #[error("source is {width}x{height}, beyond the configured image limits")]
    TooLarge { width: u32, height: u32 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<CodecError> for AppError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Decode(msg) => AppError::Decode(msg),
            CodecError::Encode { .. } => AppError::Internal(err.to_string()),
            CodecError::TooLarge { .. } => AppError::ConstraintViolation(err.to_string()),
            CodecError::Io(e) => AppError::Storage(e.to_string()),
        }
    }
}

/// A decoded source image along with what was learned while probing it.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub image: DynamicImage,
    /// Container format as sniffed from the bytes, normalized.
    pub source_format: MediaFormat,
    /// EXIF orientation tag, 1 when absent.
    pub orientation: u32,
}

impl DecodedImage {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

fn format_name(format: ImageFormat) -> Option<&'static str> {
    match format {
        ImageFormat::Jpeg => Some("jpeg"),
        ImageFormat::Png => Some("png"),
        ImageFormat::WebP => Some("webp"),
        ImageFormat::Avif => Some("avif"),
        _ => None,
    }
}

/// Decode an in-memory image, sniffing its format from the content.
pub fn decode_bytes(data: &[u8]) -> Result<DecodedImage, CodecError> {
    let reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| CodecError::Decode(e.to_string()))?;

    let detected = reader
        .format()
        .ok_or_else(|| CodecError::Decode("unrecognized image format".to_string()))?;
    let source_format = MediaFormat::normalize(format_name(detected));

    let image = reader
        .decode()
        .map_err(|e| CodecError::Decode(e.to_string()))?;

    Ok(DecodedImage {
        image,
        source_format,
        orientation: read_exif_orientation(data),
    })
}

/// Read only the header and reject sources beyond `limits` before any pixel
/// buffer is allocated.
pub fn check_dimensions(data: &[u8], limits: &TransformLimits) -> Result<(u32, u32), CodecError> {
    let (width, height) = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| CodecError::Decode(e.to_string()))?
        .into_dimensions()
        .map_err(|e| CodecError::Decode(e.to_string()))?;

    if width > limits.max_dimension
        || height > limits.max_dimension
        || u64::from(width) * u64::from(height) > limits.max_pixel_count
    {
        return Err(CodecError::TooLarge { width, height });
    }
    Ok((width, height))
}

/// Decode an image file after checking its header against `limits`. Blocking.
pub fn decode_file_within(path: &Path, limits: &TransformLimits) -> Result<DecodedImage, CodecError> {
    let data = std::fs::read(path)?;
    check_dimensions(&data, limits)?;
    decode_bytes(&data)
}

/// Decode an image file. Blocking; run it on the blocking pool from async code.
pub fn decode_file(path: &Path) -> Result<DecodedImage, CodecError> {
    let data = std::fs::read(path)?;
    decode_bytes(&data)
}
