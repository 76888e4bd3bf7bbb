// ============================================================================
// COMPOSE: stroking selection rectangles onto rasters
// ============================================================================

use image::{Rgba, RgbaImage};

use crate::selection::Rect;

/// Guidance stroke colour: bright green at 90% opacity.
pub const SELECTION_STROKE: Rgba<u8> = Rgba([74, 222, 128, 230]);

/// Stroke width used when burning a selection into a full-resolution copy.
/// Scales with the image so the model can still see it on large photos.
pub fn guidance_stroke_width(image_width: u32) -> f32 {
    (image_width as f32 / 200.0).max(2.0)
}

/// Return a copy of `source` with `rect` (native pixel space) outlined in
/// [`SELECTION_STROKE`]. This is what the segmentation model receives when the
/// user refines the mask by hand.
pub fn burn_selection(source: &RgbaImage, rect: Rect) -> RgbaImage {
    let mut out = source.clone();
    stroke_rect(
        &mut out,
        rect,
        guidance_stroke_width(source.width()),
        SELECTION_STROKE,
    );
    out
}

/// Outline `rect` with a line of `width` pixels centred on its edges,
/// alpha-blending `color` over whatever is already there.
pub fn stroke_rect(target: &mut RgbaImage, rect: Rect, width: f32, color: Rgba<u8>) {
    if rect.width <= 0.0 || rect.height <= 0.0 || width <= 0.0 {
        return;
    }
    let half = width / 2.0;
    let outer = (
        rect.x - half,
        rect.y - half,
        rect.x + rect.width + half,
        rect.y + rect.height + half,
    );
    let inner = (
        rect.x + half,
        rect.y + half,
        rect.x + rect.width - half,
        rect.y + rect.height - half,
    );
    let has_hole = inner.2 > inner.0 && inner.3 > inner.1;

    let (tw, th) = target.dimensions();
    let x0 = outer.0.floor().max(0.0) as u32;
    let y0 = outer.1.floor().max(0.0) as u32;
    let x1 = (outer.2.ceil().max(0.0) as u32).min(tw);
    let y1 = (outer.3.ceil().max(0.0) as u32).min(th);

    for y in y0..y1 {
        let cy = y as f32 + 0.5;
        if cy < outer.1 || cy >= outer.3 {
            continue;
        }
        for x in x0..x1 {
            let cx = x as f32 + 0.5;
            if cx < outer.0 || cx >= outer.2 {
                continue;
            }
            if has_hole && cx >= inner.0 && cx < inner.2 && cy >= inner.1 && cy < inner.3 {
                continue;
            }
            let dst = target.get_pixel_mut(x, y);
            *dst = blend_over(*dst, color);
        }
    }
}

/// Source-over compositing of straight (non-premultiplied) RGBA.
pub fn blend_over(dst: Rgba<u8>, src: Rgba<u8>) -> Rgba<u8> {
    let sa = src[3] as f32 / 255.0;
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }
    let mut out = [0u8; 4];
    for c in 0..3 {
        let v = (src[c] as f32 * sa + dst[c] as f32 * da * (1.0 - sa)) / out_a;
        out[c] = v.round().clamp(0.0, 255.0) as u8;
    }
    out[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
    Rgba(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba([100, 100, 100, 255]))
    }

    #[test]
    fn stroke_width_has_floor_of_two() {
        assert_eq!(guidance_stroke_width(100), 2.0);
        assert_eq!(guidance_stroke_width(1000), 5.0);
    }

    #[test]
    fn burn_paints_edges_and_leaves_interior() {
        let src = gray(60, 60);
        let out = burn_selection(
            &src,
            Rect {
                x: 10.0,
                y: 10.0,
                width: 30.0,
                height: 20.0,
            },
        );
        // On the top edge
        let edge = out.get_pixel(20, 10);
        assert!(edge[1] > 200, "edge should be green, got {:?}", edge);
        // Well inside and well outside stay untouched
        assert_eq!(out.get_pixel(25, 20), src.get_pixel(25, 20));
        assert_eq!(out.get_pixel(2, 2), src.get_pixel(2, 2));
        // The source is not modified
        assert_eq!(src.get_pixel(20, 10), &Rgba([100, 100, 100, 255]));
    }

    #[test]
    fn stroke_is_clipped_to_image_bounds() {
        let mut img = gray(10, 10);
        stroke_rect(
            &mut img,
            Rect {
                x: -5.0,
                y: -5.0,
                width: 40.0,
                height: 40.0,
            },
            2.0,
            SELECTION_STROKE,
        );
        assert_eq!(img.get_pixel(5, 5), &Rgba([100, 100, 100, 255]));
    }

    #[test]
    fn blend_over_transparent_keeps_source() {
        let out = blend_over(Rgba([0, 0, 0, 0]), Rgba([10, 20, 30, 128]));
        assert_eq!(out, Rgba([10, 20, 30, 128]));
    }

    #[test]
    fn blend_over_opaque_mixes_colors() {
        let out = blend_over(Rgba([0, 0, 0, 255]), Rgba([255, 255, 255, 128]));
        assert_eq!(out[3], 255);
        assert!(out[0] > 120 && out[0] < 135);
    }
}
