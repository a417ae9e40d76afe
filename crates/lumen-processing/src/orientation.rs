use image::DynamicImage;
use std::io::Cursor;

/// Read the EXIF orientation tag from an encoded image.
/// Returns 1 (normal) when there is no EXIF block or no orientation tag.
pub fn read_exif_orientation(data: &[u8]) -> u32 {
    let mut cursor = Cursor::new(data);
    let exif = match exif::Reader::new().read_from_container(&mut cursor) {
        Ok(exif) => exif,
        Err(_) => return 1,
    };

    exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|field| field.value.get_uint(0))
        .filter(|value| (1..=8).contains(value))
        .unwrap_or(1)
}

/// Rotation (clockwise degrees) and horizontal flip needed to undo an EXIF orientation.
/// The rotation is applied before the flip.
pub fn orientation_transforms(orientation: u32) -> (Option<u16>, bool) {
    match orientation {
        2 => (None, true),
        3 => (Some(180), false),
        4 => (Some(180), true),
        5 => (Some(90), true),
        6 => (Some(90), false),
        7 => (Some(270), true),
        8 => (Some(270), false),
        _ => (None, false),
    }
}

/// Bake an EXIF orientation into the pixels.
pub fn apply_orientation(img: DynamicImage, orientation: u32) -> DynamicImage {
    let (rotate, flip_h) = orientation_transforms(orientation);
    if rotate.is_some() || flip_h {
        tracing::debug!(orientation, rotate = ?rotate, flip_horizontal = flip_h, "Applying EXIF orientation");
    }

    let img = match rotate {
        Some(90) => img.rotate90(),
        Some(180) => img.rotate180(),
        Some(270) => img.rotate270(),
        _ => img,
    };

    if flip_h {
        img.fliph()
    } else {
        img
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgba, RgbaImage};

    /// 2x1 image: red on the left, blue on the right.
    fn marker() -> DynamicImage {
        let mut img = RgbaImage::new(2, 1);
        img.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        img.put_pixel(1, 0, Rgba([0, 0, 255, 255]));
        DynamicImage::ImageRgba8(img)
    }

    #[test]
    fn test_no_exif_reads_as_normal() {
        let mut buf = Vec::new();
        marker()
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        assert_eq!(read_exif_orientation(&buf), 1);
        assert_eq!(read_exif_orientation(b"not an image"), 1);
    }

    #[test]
    fn test_rotations_swap_dimensions() {
        for orientation in [5, 6, 7, 8] {
            assert_eq!(
                apply_orientation(marker(), orientation).dimensions(),
                (1, 2),
                "orientation {orientation}"
            );
        }
        for orientation in [1, 2, 3, 4] {
            assert_eq!(apply_orientation(marker(), orientation).dimensions(), (2, 1));
        }
    }

    #[test]
    fn test_mirror_and_rotate() {
        let mirrored = apply_orientation(marker(), 2);
        assert_eq!(mirrored.get_pixel(0, 0), Rgba([0, 0, 255, 255]));

        // Orientation 6: stored rotated 90 CCW, so the left pixel ends up on top.
        let rotated = apply_orientation(marker(), 6);
        assert_eq!(rotated.get_pixel(0, 0), Rgba([255, 0, 0, 255]));

        // Orientation 5 is a transpose: the left pixel stays at the origin.
        let transposed = apply_orientation(marker(), 5);
        assert_eq!(transposed.get_pixel(0, 0), Rgba([255, 0, 0, 255]));
        assert_eq!(transposed.get_pixel(0, 1), Rgba([0, 0, 255, 255]));

        // Orientation 7 is a transverse: the right pixel lands at the origin.
        let transverse = apply_orientation(marker(), 7);
        assert_eq!(transverse.get_pixel(0, 0), Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn test_unknown_orientation_is_identity() {
        assert_eq!(orientation_transforms(0), (None, false));
        assert_eq!(orientation_transforms(42), (None, false));
    }
}
