use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

use crate::error::AppError;

/// Concrete container formats a master or variant can be encoded to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaFormat {
    Jpeg,
    Png,
    #[serde(rename = "webp")]
    WebP,
    Avif,
}

impl MediaFormat {
    /// Map a probed format name or file extension onto a supported format.
    /// Unknown or missing values fall back to JPEG.
    pub fn normalize(value: Option<&str>) -> Self {
        let Some(value) = value else {
            return MediaFormat::Jpeg;
        };
        match value.trim().trim_start_matches('.').to_lowercase().as_str() {
            "jpg" | "jpeg" => MediaFormat::Jpeg,
            "png" => MediaFormat::Png,
            "webp" => MediaFormat::WebP,
            "avif" => MediaFormat::Avif,
            _ => MediaFormat::Jpeg,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaFormat::Jpeg => "jpeg",
            MediaFormat::Png => "png",
            MediaFormat::WebP => "webp",
            MediaFormat::Avif => "avif",
        }
    }

    /// File extension including the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            MediaFormat::Jpeg => ".jpg",
            MediaFormat::Png => ".png",
            MediaFormat::WebP => ".webp",
            MediaFormat::Avif => ".avif",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            MediaFormat::Jpeg => "image/jpeg",
            MediaFormat::Png => "image/png",
            MediaFormat::WebP => "image/webp",
            MediaFormat::Avif => "image/avif",
        }
    }

    /// Lossless formats ignore quality settings and byte budgets.
    pub fn is_lossless(&self) -> bool {
        matches!(self, MediaFormat::Png)
    }
}

impl fmt::Display for MediaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Format requested on the read path; `auto` keeps the source format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestedFormat {
    Jpeg,
    Png,
    #[serde(rename = "webp")]
    WebP,
    Avif,
    Auto,
}

impl RequestedFormat {
    pub fn resolve(self, source: MediaFormat) -> MediaFormat {
        match self {
            RequestedFormat::Jpeg => MediaFormat::Jpeg,
            RequestedFormat::Png => MediaFormat::Png,
            RequestedFormat::WebP => MediaFormat::WebP,
            RequestedFormat::Avif => MediaFormat::Avif,
            RequestedFormat::Auto => source,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitStrategy {
    #[default]
    Cover,
    Contain,
    Fill,
    Inside,
    Outside,
}

/// Bounds applied to every transform request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformLimits {
    pub max_dimension: u32,
    pub max_pixel_count: u64,
}

impl Default for TransformLimits {
    fn default() -> Self {
        Self {
            max_dimension: 8192,
            max_pixel_count: 36_000_000,
        }
    }
}

/// Raw read-path query parameters.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TransformQuery {
    #[validate(range(min = 1))]
    pub width: Option<u32>,
    #[validate(range(min = 1))]
    pub height: Option<u32>,
    pub fit: Option<FitStrategy>,
    #[validate(range(min = 1, max = 100))]
    pub quality: Option<u8>,
    pub format: Option<RequestedFormat>,
    #[validate(range(min = 1, max = 50000))]
    pub max_kilobytes: Option<u32>,
}

impl TransformQuery {
    /// Validate against static ranges and the configured limits.
    pub fn into_request(self, limits: &TransformLimits) -> Result<TransformRequest, AppError> {
        self.validate()?;

        for (name, value) in [("width", self.width), ("height", self.height)] {
            if let Some(v) = value {
                if v > limits.max_dimension {
                    return Err(AppError::ConstraintViolation(format!(
                        "{} must be at most {}",
                        name, limits.max_dimension
                    )));
                }
            }
        }

        if let (Some(w), Some(h)) = (self.width, self.height) {
            if u64::from(w) * u64::from(h) > limits.max_pixel_count {
                return Err(AppError::ConstraintViolation(format!(
                    "width * height must be at most {} pixels",
                    limits.max_pixel_count
                )));
            }
        }

        Ok(TransformRequest {
            width: self.width,
            height: self.height,
            fit: self.fit.unwrap_or_default(),
            quality: self.quality,
            format: self.format,
            max_kilobytes: self.max_kilobytes,
        })
    }
}

/// A validated, immutable transform request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformRequest {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fit: FitStrategy,
    pub quality: Option<u8>,
    pub format: Option<RequestedFormat>,
    pub max_kilobytes: Option<u32>,
}

impl TransformRequest {
    pub fn has_dimensions(&self) -> bool {
        self.width.is_some() || self.height.is_some()
    }

    /// Output format for a master stored as `source`.
    pub fn output_format(&self, source: MediaFormat) -> MediaFormat {
        self.format
            .unwrap_or(RequestedFormat::Auto)
            .resolve(source)
    }
}
