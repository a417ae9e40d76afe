//! Encode side of the codec adapter.
//!
//! Defaults when no quality is requested: JPEG 85 (mozjpeg, progressive,
//! 4:2:0), WebP 82, AVIF 50. PNG is lossless and always written at maximum
//! compression with adaptive filtering, after dropping channels that carry no
//! information.

use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, ImageEncoder};
use lumen_core::models::MediaFormat;

use crate::codec::CodecError;

pub const JPEG_DEFAULT_QUALITY: u8 = 85;
pub const WEBP_DEFAULT_QUALITY: u8 = 82;
pub const AVIF_DEFAULT_QUALITY: u8 = 50;
/// Reported for lossless output.
pub const LOSSLESS_QUALITY: u8 = 100;
pub const AVIF_SPEED: u8 = 6;
/// Largest side libwebp accepts.
pub const WEBP_MAX_DIMENSION: u32 = 16383;

/// Quality used when the request does not pin one.
pub fn default_quality(format: MediaFormat) -> u8 {
    match format {
        MediaFormat::Jpeg => JPEG_DEFAULT_QUALITY,
        MediaFormat::WebP => WEBP_DEFAULT_QUALITY,
        MediaFormat::Avif => AVIF_DEFAULT_QUALITY,
        MediaFormat::Png => LOSSLESS_QUALITY,
    }
}

/// Encode `img` to `format`. `quality` falls back to [`default_quality`] and
/// is ignored for PNG.
pub fn encode(img: &DynamicImage, format: MediaFormat, quality: Option<u8>) -> Result<Vec<u8>, CodecError> {
    let quality = quality.unwrap_or_else(|| default_quality(format)).clamp(1, 100);
    match format {
        MediaFormat::Jpeg => encode_jpeg(img, quality),
        MediaFormat::Png => encode_png(img),
        MediaFormat::WebP => encode_webp(img, quality),
        MediaFormat::Avif => encode_avif(img, quality),
    }
}

fn encode_error(format: MediaFormat, err: impl std::fmt::Display) -> CodecError {
    CodecError::Encode {
        format,
        message: err.to_string(),
    }
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, CodecError> {
    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();

    let mut comp = mozjpeg::Compress::new(mozjpeg::ColorSpace::JCS_RGB);
    comp.set_size(width as usize, height as usize);
    comp.set_quality(f32::from(quality));
    comp.set_progressive_mode();
    comp.set_optimize_coding(true);
    comp.set_chroma_sampling_pixel_sizes((2, 2), (2, 2));

    let mut comp = comp
        .start_compress(Vec::new())
        .map_err(|e| encode_error(MediaFormat::Jpeg, e))?;
    comp.write_scanlines(&rgb)
        .map_err(|e| encode_error(MediaFormat::Jpeg, e))?;
    comp.finish().map_err(|e| encode_error(MediaFormat::Jpeg, e))
}

fn has_transparency(img: &DynamicImage) -> bool {
    img.color().has_alpha() && img.to_rgba8().pixels().any(|p| p[3] < 255)
}

fn is_grayscale(img: &DynamicImage) -> bool {
    img.to_rgb8().pixels().all(|p| p[0] == p[1] && p[1] == p[2])
}

/// Lossless color reduction: opaque images lose the alpha channel and
/// neutral images collapse to luma.
fn reduce_for_png(img: &DynamicImage) -> DynamicImage {
    let alpha = has_transparency(img);
    let gray = is_grayscale(img);
    match (gray, alpha) {
        (true, true) => DynamicImage::ImageLumaA8(img.to_luma_alpha8()),
        (true, false) => DynamicImage::ImageLuma8(img.to_luma8()),
        (false, true) => DynamicImage::ImageRgba8(img.to_rgba8()),
        (false, false) => DynamicImage::ImageRgb8(img.to_rgb8()),
    }
}

fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, CodecError> {
    let reduced = reduce_for_png(img);
    let mut buffer = Vec::new();
    let encoder = PngEncoder::new_with_quality(&mut buffer, CompressionType::Best, FilterType::Adaptive);
    encoder
        .write_image(
            reduced.as_bytes(),
            reduced.width(),
            reduced.height(),
            reduced.color().into(),
        )
        .map_err(|e| encode_error(MediaFormat::Png, e))?;
    Ok(buffer)
}

fn encode_webp(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, CodecError> {
    let (width, height) = (img.width(), img.height());
    if width > WEBP_MAX_DIMENSION || height > WEBP_MAX_DIMENSION {
        return Err(encode_error(
            MediaFormat::WebP,
            format!(
                "{}x{} exceeds the {}px WebP limit",
                width, height, WEBP_MAX_DIMENSION
            ),
        ));
    }

    // `Encoder::encode` unwraps libwebp failures; `encode_simple` reports them.
    let memory = if has_transparency(img) {
        let rgba = img.to_rgba8();
        webp::Encoder::from_rgba(&rgba, width, height).encode_simple(false, f32::from(quality))
    } else {
        let rgb = img.to_rgb8();
        webp::Encoder::from_rgb(&rgb, width, height).encode_simple(false, f32::from(quality))
    }
    .map_err(|e| encode_error(MediaFormat::WebP, format!("{:?}", e)))?;
    Ok(memory.to_vec())
}

fn encode_avif(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, CodecError> {
    let (width, height) = (img.width() as usize, img.height() as usize);
    let encoder = ravif::Encoder::new()
        .with_quality(f32::from(quality))
        .with_speed(AVIF_SPEED);

    let encoded = if has_transparency(img) {
        let rgba = img.to_rgba8();
        let pixels: Vec<rgb::RGBA8> = rgba
            .as_raw()
            .chunks_exact(4)
            .map(|c| rgb::RGBA8::new(c[0], c[1], c[2], c[3]))
            .collect();
        encoder.encode_rgba(ravif::Img::new(pixels.as_slice(), width, height))
    } else {
        let rgb = img.to_rgb8();
        let pixels: Vec<rgb::RGB8> = rgb
            .as_raw()
            .chunks_exact(3)
            .map(|c| rgb::RGB8::new(c[0], c[1], c[2]))
            .collect();
        encoder.encode_rgb(ravif::Img::new(pixels.as_slice(), width, height))
    }
    .map_err(|e| encode_error(MediaFormat::Avif, e))?;

    Ok(encoded.avif_file)
}
