use image::{DynamicImage, GrayImage, Luma, RgbaImage};

/// Luma value at or above which a mask pixel counts as foreground.
pub const MASK_THRESHOLD: u8 = 128;

/// Normalize a model-produced mask into an exact binary mask at the source
/// image's native resolution: foreground 255, background 0.
///
/// The model is asked for pure white on black but routinely returns
/// anti-aliased or JPEG-ish values, and sometimes a different resolution.
pub fn normalize_mask(mask: &DynamicImage, width: u32, height: u32) -> GrayImage {
    let luma = mask.to_luma8();
    let resized = if luma.dimensions() != (width, height) {
        image::imageops::resize(&luma, width, height, image::imageops::FilterType::Triangle)
    } else {
        luma
    };
    binarize(&resized)
}

fn binarize(mask: &GrayImage) -> GrayImage {
    let mut out = mask.clone();
    for p in out.pixels_mut() {
        *p = if p[0] >= MASK_THRESHOLD {
            Luma([255])
        } else {
            Luma([0])
        };
    }
    out
}

/// Expand a grayscale mask into RGBA for display (white/black, fully opaque).
pub fn mask_preview_rgba(mask: &DynamicImage) -> RgbaImage {
    DynamicImage::ImageLuma8(mask.to_luma8()).to_rgba8()
}

/// Fraction of pixels marked as foreground.
pub fn coverage(mask: &GrayImage) -> f64 {
    let total = mask.width() as u64 * mask.height() as u64;
    if total == 0 {
        return 0.0;
    }
    let fg = mask.pixels().filter(|p| p[0] >= MASK_THRESHOLD).count() as u64;
    fg as f64 / total as f64
}
