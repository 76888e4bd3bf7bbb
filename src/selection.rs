// ============================================================================
// SELECTION ENGINE: drag gestures on a scaled image surface
// ============================================================================
//
// One engine per image panel. Gestures are tracked in display coordinates
// (relative to the top-left of the rendered image) and converted to the
// image's native pixel space when the gesture ends.

use image::{Rgba, RgbaImage};

use crate::ops::compose::{SELECTION_STROKE, stroke_rect};

/// Native width and height must both exceed this for a drag to count.
pub const MIN_SELECTION_SIZE: f32 = 5.0;

/// Outline width of the live rectangle on the overlay, in display pixels.
const LIVE_STROKE_WIDTH: f32 = 2.0;

/// Opacity of the mask preview drawn under the live rectangle.
const MASK_OVERLAY_OPACITY: f32 = 0.5;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle. Which space it lives in (display or native) is
/// determined by where it came from.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    /// Normalized rectangle spanned by two corners, in any drag direction.
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            x: a.x.min(b.x),
            y: a.y.min(b.y),
            width: (a.x - b.x).abs(),
            height: (a.y - b.y).abs(),
        }
    }

    /// Scale x/width by `sx` and y/height by `sy` independently.
    pub fn scaled(&self, sx: f32, sy: f32) -> Self {
        Self {
            x: self.x * sx,
            y: self.y * sy,
            width: self.width * sx,
            height: self.height * sy,
        }
    }

    /// Parse `"x,y,w,h"`.
    pub fn parse(s: &str) -> Option<Self> {
        let parts: Vec<f32> = s
            .split(',')
            .map(|p| p.trim().parse::<f32>())
            .collect::<Result<_, _>>()
            .ok()?;
        match parts.as_slice() {
            [x, y, w, h] if *w >= 0.0 && *h >= 0.0 => Some(Self {
                x: *x,
                y: *y,
                width: *w,
                height: *h,
            }),
            _ => None,
        }
    }
}

/// Native image size versus the size it is currently rendered at.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceGeometry {
    pub native_width: u32,
    pub native_height: u32,
    pub display_width: f32,
    pub display_height: f32,
}

impl SurfaceGeometry {
    pub fn new(native: (u32, u32), display: (f32, f32)) -> Self {
        Self {
            native_width: native.0,
            native_height: native.1,
            display_width: display.0,
            display_height: display.1,
        }
    }

    /// Per-axis display → native factors. `None` while the surface has no size.
    pub fn scale_factors(&self) -> Option<(f32, f32)> {
        if self.display_width <= 0.0 || self.display_height <= 0.0 {
            return None;
        }
        Some((
            self.native_width as f32 / self.display_width,
            self.native_height as f32 / self.display_height,
        ))
    }

    pub fn to_native(&self, display: Rect) -> Option<Rect> {
        let (sx, sy) = self.scale_factors()?;
        Some(display.scaled(sx, sy))
    }

    /// Size of the overlay raster: the rendered box, not the native size.
    pub fn overlay_size(&self) -> (u32, u32) {
        (
            self.display_width.round().max(0.0) as u32,
            self.display_height.round().max(0.0) as u32,
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
    Middle,
}

/// What a pointer event amounted to.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GestureOutcome {
    /// Nothing happened (wrong button, no gesture in progress, ...).
    Ignored,
    /// The panel is inactive; the click asks for it to become the active one.
    Activate,
    /// A drag started.
    Started,
    /// A drag ended but was too small (or had no extent) to be a selection.
    Discarded,
    /// A drag ended with a usable selection in native pixel coordinates.
    Selected(Rect),
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct OverlayKey {
    mask_id: Option<u64>,
    rect: Option<Rect>,
    size: (u32, u32),
}

/// Gesture capture and coordinate normalization for one image surface.
#[derive(Debug, Default)]
pub struct SelectionEngine {
    active: bool,
    selecting: bool,
    start: Option<Point>,
    live_rect: Option<Rect>,
    geometry: Option<SurfaceGeometry>,
    overlay: Option<RgbaImage>,
    overlay_key: Option<OverlayKey>,
    overlay_generation: u64,
}

impl SelectionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Only the active panel captures gestures. Deactivating drops any drag
    /// in progress.
    pub fn set_active(&mut self, active: bool) {
        if self.active && !active {
            self.reset_capture();
        }
        self.active = active;
    }

    pub fn is_selecting(&self) -> bool {
        self.selecting
    }

    /// Live rectangle in display coordinates.
    pub fn live_rect(&self) -> Option<Rect> {
        self.live_rect
    }

    /// Record the surface's current layout. Call whenever the image or the
    /// rendered box changes; the overlay follows the rendered size.
    pub fn set_geometry(&mut self, geometry: SurfaceGeometry) {
        self.geometry = Some(geometry);
    }

    pub fn clear_geometry(&mut self) {
        self.geometry = None;
        self.reset_capture();
    }

    pub fn pointer_down(&mut self, pos: Point, button: PointerButton) -> GestureOutcome {
        if !self.active {
            return GestureOutcome::Activate;
        }
        if button != PointerButton::Primary {
            return GestureOutcome::Ignored;
        }
        self.start = Some(pos);
        self.live_rect = None;
        self.selecting = true;
        GestureOutcome::Started
    }

    /// Touch input only ever starts a gesture with the primary touch.
    pub fn touch_start(&mut self, pos: Point) -> GestureOutcome {
        self.pointer_down(pos, PointerButton::Primary)
    }

    pub fn pointer_move(&mut self, pos: Point) -> Option<Rect> {
        if !self.active || !self.selecting {
            return None;
        }
        let start = self.start?;
        let rect = Rect::from_corners(start, pos);
        self.live_rect = Some(rect);
        Some(rect)
    }

    pub fn pointer_up(&mut self) -> GestureOutcome {
        self.finish_gesture()
    }

    /// Leaving the surface mid-drag ends the gesture exactly like releasing.
    pub fn pointer_leave(&mut self) -> GestureOutcome {
        self.finish_gesture()
    }

    fn finish_gesture(&mut self) -> GestureOutcome {
        if !self.active || !self.selecting {
            return GestureOutcome::Ignored;
        }
        let display_rect = self.live_rect;
        self.reset_capture();

        let Some(display_rect) = display_rect else {
            return GestureOutcome::Discarded;
        };
        let Some(native) = self.geometry.and_then(|g| g.to_native(display_rect)) else {
            return GestureOutcome::Discarded;
        };
        if native.width > MIN_SELECTION_SIZE && native.height > MIN_SELECTION_SIZE {
            GestureOutcome::Selected(native)
        } else {
            log::debug!(
                "[Selection] discarded {:.1}x{:.1} drag (below {} px)",
                native.width,
                native.height,
                MIN_SELECTION_SIZE
            );
            GestureOutcome::Discarded
        }
    }

    fn reset_capture(&mut self) {
        self.selecting = false;
        self.start = None;
        self.live_rect = None;
    }

    /// Bumped every time the overlay raster is re-rendered.
    pub fn overlay_generation(&self) -> u64 {
        self.overlay_generation
    }

    /// Current overlay raster, re-rendered only when the mask, the live
    /// rectangle or the surface size changed. `mask` is `(handle id, pixels)`.
    pub fn overlay(&mut self, mask: Option<(u64, &RgbaImage)>) -> Option<&RgbaImage> {
        let geometry = self.geometry?;
        let size = geometry.overlay_size();
        if size.0 == 0 || size.1 == 0 {
            return None;
        }
        let key = OverlayKey {
            mask_id: mask.map(|(id, _)| id),
            rect: self.live_rect,
            size,
        };
        if self.overlay_key != Some(key) || self.overlay.is_none() {
            self.overlay = Some(render_overlay(size, mask.map(|(_, m)| m), self.live_rect));
            self.overlay_key = Some(key);
            self.overlay_generation += 1;
        }
        self.overlay.as_ref()
    }
}

/// Render the overlay from scratch: the mask at 50% opacity stretched to
/// `size`, with the live rectangle outlined on top.
pub fn render_overlay(size: (u32, u32), mask: Option<&RgbaImage>, rect: Option<Rect>) -> RgbaImage {
    let (w, h) = size;
    let mut out = RgbaImage::from_pixel(w, h, Rgba([0, 0, 0, 0]));

    if let Some(mask) = mask {
        let scaled;
        let mask = if mask.dimensions() != size {
            scaled = image::imageops::resize(mask, w, h, image::imageops::FilterType::Triangle);
            &scaled
        } else {
            mask
        };
        for (dst, src) in out.pixels_mut().zip(mask.pixels()) {
            let alpha = (src[3] as f32 * MASK_OVERLAY_OPACITY).round() as u8;
            *dst = Rgba([src[0], src[1], src[2], alpha]);
        }
    }

    if let Some(rect) = rect {
        stroke_rect(&mut out, rect, LIVE_STROKE_WIDTH, SELECTION_STROKE);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(native: (u32, u32), display: (f32, f32)) -> SelectionEngine {
        let mut e = SelectionEngine::new();
        e.set_active(true);
        e.set_geometry(SurfaceGeometry::new(native, display));
        e
    }

    fn drag(e: &mut SelectionEngine, from: (f32, f32), to: (f32, f32)) -> GestureOutcome {
        e.pointer_down(Point::new(from.0, from.1), PointerButton::Primary);
        e.pointer_move(Point::new(to.0, to.1));
        e.pointer_up()
    }

    #[test]
    fn display_rect_scales_per_axis() {
        let g = SurfaceGeometry::new((400, 800), (200.0, 400.0));
        let native = g
            .to_native(Rect {
                x: 10.0,
                y: 10.0,
                width: 20.0,
                height: 30.0,
            })
            .unwrap();
        assert_eq!(
            native,
            Rect {
                x: 20.0,
                y: 20.0,
                width: 40.0,
                height: 60.0
            }
        );
    }

    #[test]
    fn non_uniform_scale_is_respected() {
        let g = SurfaceGeometry::new((300, 100), (100.0, 100.0));
        let native = g
            .to_native(Rect {
                x: 10.0,
                y: 10.0,
                width: 10.0,
                height: 10.0,
            })
            .unwrap();
        assert_eq!((native.x, native.width), (30.0, 30.0));
        assert_eq!((native.y, native.height), (10.0, 10.0));
    }

    #[test]
    fn every_drag_direction_yields_same_rect() {
        let corners = [
            ((10.0, 10.0), (50.0, 40.0)),
            ((50.0, 40.0), (10.0, 10.0)),
            ((50.0, 10.0), (10.0, 40.0)),
            ((10.0, 40.0), (50.0, 10.0)),
        ];
        let mut results = Vec::new();
        for (from, to) in corners {
            let mut e = engine((100, 100), (100.0, 100.0));
            results.push(drag(&mut e, from, to));
        }
        let expected = GestureOutcome::Selected(Rect {
            x: 10.0,
            y: 10.0,
            width: 40.0,
            height: 30.0,
        });
        assert!(results.iter().all(|r| *r == expected), "{:?}", results);
    }

    #[test]
    fn small_drags_are_discarded() {
        let mut e = engine((100, 100), (100.0, 100.0));
        assert_eq!(drag(&mut e, (0.0, 0.0), (5.0, 50.0)), GestureOutcome::Discarded);
        assert_eq!(drag(&mut e, (0.0, 0.0), (50.0, 5.0)), GestureOutcome::Discarded);
        assert!(matches!(
            drag(&mut e, (0.0, 0.0), (5.5, 5.5)),
            GestureOutcome::Selected(_)
        ));
    }

    #[test]
    fn threshold_applies_in_native_space() {
        // 4 display px is 8 native px on a half-size surface
        let mut e = engine((200, 200), (100.0, 100.0));
        assert!(matches!(
            drag(&mut e, (0.0, 0.0), (4.0, 4.0)),
            GestureOutcome::Selected(_)
        ));
        // 4 display px is 2 native px on a double-size surface
        let mut e = engine((50, 50), (100.0, 100.0));
        assert_eq!(drag(&mut e, (0.0, 0.0), (4.0, 4.0)), GestureOutcome::Discarded);
    }

    #[test]
    fn gesture_end_always_resets_capture() {
        let mut e = engine((100, 100), (100.0, 100.0));
        e.pointer_down(Point::new(1.0, 1.0), PointerButton::Primary);
        e.pointer_move(Point::new(2.0, 2.0));
        assert!(e.is_selecting());
        assert_eq!(e.pointer_leave(), GestureOutcome::Discarded);
        assert!(!e.is_selecting());
        assert!(e.live_rect().is_none());

        // Press and release without moving
        e.pointer_down(Point::new(1.0, 1.0), PointerButton::Primary);
        assert_eq!(e.pointer_up(), GestureOutcome::Discarded);
        assert!(!e.is_selecting());
        assert_eq!(e.pointer_up(), GestureOutcome::Ignored);
    }

    #[test]
    fn leave_mid_drag_still_emits_selection() {
        let mut e = engine((100, 100), (100.0, 100.0));
        e.pointer_down(Point::new(10.0, 10.0), PointerButton::Primary);
        e.pointer_move(Point::new(60.0, 60.0));
        assert!(matches!(e.pointer_leave(), GestureOutcome::Selected(_)));
    }

    #[test]
    fn only_primary_button_starts_gesture() {
        let mut e = engine((100, 100), (100.0, 100.0));
        assert_eq!(
            e.pointer_down(Point::new(1.0, 1.0), PointerButton::Secondary),
            GestureOutcome::Ignored
        );
        assert!(!e.is_selecting());
        assert_eq!(
            e.pointer_down(Point::new(1.0, 1.0), PointerButton::Middle),
            GestureOutcome::Ignored
        );
        assert_eq!(e.touch_start(Point::new(1.0, 1.0)), GestureOutcome::Started);
        assert!(e.is_selecting());
    }

    #[test]
    fn inactive_panel_turns_clicks_into_activation() {
        let mut e = SelectionEngine::new();
        e.set_geometry(SurfaceGeometry::new((100, 100), (100.0, 100.0)));
        assert_eq!(
            e.pointer_down(Point::new(1.0, 1.0), PointerButton::Primary),
            GestureOutcome::Activate
        );
        assert!(!e.is_selecting());
        assert!(e.pointer_move(Point::new(50.0, 50.0)).is_none());
        assert_eq!(e.pointer_up(), GestureOutcome::Ignored);
    }

    #[test]
    fn deactivation_drops_drag_in_progress() {
        let mut e = engine((100, 100), (100.0, 100.0));
        e.pointer_down(Point::new(1.0, 1.0), PointerButton::Primary);
        e.pointer_move(Point::new(30.0, 30.0));
        e.set_active(false);
        assert!(!e.is_selecting());
        assert!(e.live_rect().is_none());
    }

    #[test]
    fn overlay_follows_rendered_size() {
        let mut e = engine((1000, 500), (200.0, 100.0));
        assert_eq!(e.overlay(None).unwrap().dimensions(), (200, 100));
        let first = e.overlay_generation();

        // Unchanged inputs reuse the cached raster
        e.overlay(None);
        assert_eq!(e.overlay_generation(), first);

        e.set_geometry(SurfaceGeometry::new((1000, 500), (400.0, 200.0)));
        assert_eq!(e.overlay(None).unwrap().dimensions(), (400, 200));
        assert!(e.overlay_generation() > first);
    }

    #[test]
    fn overlay_rerenders_when_rect_or_mask_changes() {
        let mut e = engine((100, 100), (100.0, 100.0));
        e.overlay(None);
        let g0 = e.overlay_generation();
        e.pointer_down(Point::new(10.0, 10.0), PointerButton::Primary);
        e.pointer_move(Point::new(40.0, 40.0));
        e.overlay(None);
        let g1 = e.overlay_generation();
        assert!(g1 > g0);

        let mask = RgbaImage::from_pixel(10, 10, Rgba([255, 255, 255, 255]));
        e.overlay(Some((7, &mask)));
        assert!(e.overlay_generation() > g1);
    }

    #[test]
    fn overlay_draws_half_opacity_mask_and_outline() {
        let mask = RgbaImage::from_pixel(50, 50, Rgba([255, 255, 255, 255]));
        let rect = Rect {
            x: 10.0,
            y: 10.0,
            width: 20.0,
            height: 20.0,
        };
        let out = render_overlay((100, 100), Some(&mask), Some(rect));
        assert_eq!(out.dimensions(), (100, 100));
        let interior = out.get_pixel(50, 80);
        assert_eq!(interior[3], 128);
        let edge = out.get_pixel(20, 10);
        assert!(edge[1] > edge[0], "outline should be green: {:?}", edge);
        assert!(edge[3] > 128);
    }

    #[test]
    fn overlay_without_mask_or_rect_is_clear() {
        let out = render_overlay((8, 8), None, None);
        assert!(out.pixels().all(|p| p[3] == 0));
    }

    #[test]
    fn rect_parses_from_cli_form() {
        assert_eq!(
            Rect::parse("1, 2,30,40"),
            Some(Rect {
                x: 1.0,
                y: 2.0,
                width: 30.0,
                height: 40.0
            })
        );
        assert_eq!(Rect::parse("1,2,3"), None);
        assert_eq!(Rect::parse("a,b,c,d"), None);
        assert_eq!(Rect::parse("0,0,-1,4"), None);
    }
}
