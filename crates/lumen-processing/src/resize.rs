//! Resize geometry. Images are never enlarged.

use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgba, RgbaImage};
use lumen_core::models::FitStrategy;

/// Background used when `contain` pads the target box: white, fully transparent.
pub const PAD_BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 0]);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizePlan {
    /// Dimensions to scale the source to.
    pub scale_to: (u32, u32),
    /// Centered crop applied after scaling.
    pub crop_to: Option<(u32, u32)>,
    /// Canvas the scaled image is centered on.
    pub pad_to: Option<(u32, u32)>,
}

impl ResizePlan {
    pub fn output_dimensions(&self) -> (u32, u32) {
        self.pad_to.or(self.crop_to).unwrap_or(self.scale_to)
    }
}

fn scaled(len: u32, factor: f64) -> u32 {
    ((f64::from(len) * factor).round() as u32).max(1)
}

/// Compute the resize for a source of `src` dimensions.
/// Returns `None` when neither target dimension is set.
pub fn plan_resize(
    src: (u32, u32),
    width: Option<u32>,
    height: Option<u32>,
    fit: FitStrategy,
) -> Option<ResizePlan> {
    let (sw, sh) = (src.0.max(1), src.1.max(1));

    // A single dimension keeps the aspect ratio whatever the fit.
    let (tw, th, fit) = match (width, height) {
        (None, None) => return None,
        (Some(w), Some(h)) => (w.max(1), h.max(1), fit),
        (Some(w), None) => (
            w.max(1),
            scaled(sh, f64::from(w) / f64::from(sw)),
            FitStrategy::Inside,
        ),
        (None, Some(h)) => (
            scaled(sw, f64::from(h) / f64::from(sh)),
            h.max(1),
            FitStrategy::Inside,
        ),
    };

    let rx = f64::from(tw) / f64::from(sw);
    let ry = f64::from(th) / f64::from(sh);

    let plan = match fit {
        FitStrategy::Fill => ResizePlan {
            scale_to: (tw.min(sw), th.min(sh)),
            crop_to: None,
            pad_to: None,
        },
        FitStrategy::Inside => {
            let factor = rx.min(ry).min(1.0);
            ResizePlan {
                scale_to: (scaled(sw, factor), scaled(sh, factor)),
                crop_to: None,
                pad_to: None,
            }
        }
        FitStrategy::Contain => {
            let factor = rx.min(ry).min(1.0);
            let scale_to = (scaled(sw, factor), scaled(sh, factor));
            let canvas = (tw.min(sw).max(scale_to.0), th.min(sh).max(scale_to.1));
            ResizePlan {
                scale_to,
                crop_to: None,
                pad_to: (canvas != scale_to).then_some(canvas),
            }
        }
        FitStrategy::Outside => {
            let factor = rx.max(ry).min(1.0);
            ResizePlan {
                scale_to: (scaled(sw, factor), scaled(sh, factor)),
                crop_to: None,
                pad_to: None,
            }
        }
        FitStrategy::Cover => {
            let factor = rx.max(ry).min(1.0);
            let scale_to = (scaled(sw, factor), scaled(sh, factor));
            let crop = (tw.min(scale_to.0), th.min(scale_to.1));
            ResizePlan {
                scale_to,
                crop_to: (crop != scale_to).then_some(crop),
                pad_to: None,
            }
        }
    };

    Some(plan)
}

/// Apply a plan computed by [`plan_resize`].
pub fn apply_resize(img: DynamicImage, plan: &ResizePlan) -> DynamicImage {
    let (w, h) = plan.scale_to;
    let mut img = if (img.width(), img.height()) == (w, h) {
        img
    } else {
        img.resize_exact(w, h, FilterType::Lanczos3)
    };

    if let Some((cw, ch)) = plan.crop_to {
        let x = (img.width() - cw) / 2;
        let y = (img.height() - ch) / 2;
        img = img.crop_imm(x, y, cw, ch);
    }

    if let Some((pw, ph)) = plan.pad_to {
        let mut canvas = RgbaImage::from_pixel(pw, ph, PAD_BACKGROUND);
        let x = i64::from((pw - img.width()) / 2);
        let y = i64::from((ph - img.height()) / 2);
        imageops::overlay(&mut canvas, &img.to_rgba8(), x, y);
        img = DynamicImage::ImageRgba8(canvas);
    }

    img
}
