//! Test fixtures: encoded images built with the `image` crate.

use axum_test::multipart::{MultipartForm, Part};
use image::{ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

/// A noisy RGB image, so encoders cannot shrink it to nothing.
pub fn create_test_image(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 7 % 256) as u8,
            (y * 13 % 256) as u8,
            ((x ^ y) * 3 % 256) as u8,
        ])
    });
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, format).expect("encode fixture");
    out.into_inner()
}

pub fn jpeg_form(bytes: Vec<u8>, file_name: &str) -> MultipartForm {
    let part = Part::bytes(bytes::Bytes::from(bytes))
        .file_name(file_name.to_string())
        .mime_type("image/jpeg");
    MultipartForm::new().add_part("file", part)
}
