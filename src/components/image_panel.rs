use eframe::egui;
use egui::{Color32, Pos2, Rect as ScreenRect, Sense, Stroke, TextureHandle, TextureOptions, Vec2};
use image::RgbaImage;

use crate::io::ImageHandle;
use crate::ops::mask::mask_preview_rgba;
use crate::selection::{GestureOutcome, Point, PointerButton, SelectionEngine, SurfaceGeometry};
use crate::session::ActiveEditor;

/// What the user did to a panel this frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PanelEvent {
    /// Click on an inactive panel.
    Activate(ActiveEditor),
    /// Finished drag, native pixel coordinates.
    Selected(ActiveEditor, crate::selection::Rect),
}

/// Pixels to show in a panel, keyed by the owning handle's id.
pub struct PanelImage<'a> {
    pub id: u64,
    pub pixels: &'a RgbaImage,
}

/// One of the two image views. Owns its own selection engine and textures;
/// replacing a texture drops the previous one, which frees it on the GPU.
pub struct ImagePanel {
    editor: ActiveEditor,
    engine: SelectionEngine,
    image_tex: Option<(u64, TextureHandle)>,
    overlay_tex: Option<(u64, TextureHandle)>,
    mask_cache: Option<(u64, RgbaImage)>,
}

impl ImagePanel {
    pub fn new(editor: ActiveEditor) -> Self {
        Self {
            editor,
            engine: SelectionEngine::new(),
            image_tex: None,
            overlay_tex: None,
            mask_cache: None,
        }
    }

    pub fn show(
        &mut self,
        ui: &mut egui::Ui,
        image: Option<PanelImage<'_>>,
        mask: Option<&ImageHandle>,
        is_active: bool,
        busy: bool,
    ) -> Option<PanelEvent> {
        self.engine.set_active(is_active);

        ui.label(egui::RichText::new(self.editor.label()).strong());
        let avail = ui.available_rect_before_wrap();

        let Some(image) = image else {
            self.release();
            let (rect, _) = ui.allocate_exact_size(avail.size(), Sense::hover());
            ui.painter().rect_stroke(rect, 6.0, Stroke::new(1.0, Color32::from_gray(90)));
            let hint = match self.editor {
                ActiveEditor::Original => "Drop an image here or click Open",
                ActiveEditor::Edited => "The edited image appears here",
            };
            ui.painter().text(
                rect.center(),
                egui::Align2::CENTER_CENTER,
                hint,
                egui::FontId::proportional(14.0),
                Color32::GRAY,
            );
            return None;
        };

        let (w, h) = image.pixels.dimensions();
        let display_rect = fit_rect(avail, w, h);
        ui.allocate_rect(avail, Sense::click_and_drag());
        self.engine.set_geometry(SurfaceGeometry::new(
            (w, h),
            (display_rect.width(), display_rect.height()),
        ));

        self.refresh_image_texture(ui.ctx(), &image);
        let event = self.handle_pointer(ui, avail, display_rect);

        let painter = ui.painter_at(avail);
        let uv = ScreenRect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0));
        if let Some((_, tex)) = &self.image_tex {
            painter.image(tex.id(), display_rect, uv, Color32::WHITE);
        }

        self.refresh_mask_cache(mask);
        let mask_arg = self.mask_cache.as_ref().map(|(id, m)| (*id, m));
        let has_overlay = self.engine.overlay(mask_arg).is_some();
        let generation = self.engine.overlay_generation();
        if !has_overlay {
            self.overlay_tex = None;
        } else if self.overlay_tex.as_ref().is_none_or(|(g, _)| *g != generation)
            && let Some(overlay) = self.engine.overlay(mask_arg)
        {
            let color = egui::ColorImage::from_rgba_unmultiplied(
                [overlay.width() as usize, overlay.height() as usize],
                overlay.as_raw(),
            );
            let tex = ui.ctx().load_texture(
                format!("{}_overlay", self.editor.label()),
                color,
                TextureOptions::LINEAR,
            );
            self.overlay_tex = Some((generation, tex));
        }
        if let Some((_, tex)) = &self.overlay_tex {
            painter.image(tex.id(), display_rect, uv, Color32::WHITE);
        }

        let frame_stroke = if is_active {
            Stroke::new(2.0, ui.visuals().selection.bg_fill)
        } else {
            Stroke::new(1.0, Color32::from_gray(80))
        };
        painter.rect_stroke(display_rect.expand(1.0), 2.0, frame_stroke);

        if busy {
            painter.rect_filled(display_rect, 0.0, Color32::from_black_alpha(120));
            let spinner_rect = ScreenRect::from_center_size(display_rect.center(), Vec2::splat(32.0));
            ui.put(spinner_rect, egui::Spinner::new().size(32.0));
        }

        event
    }

    fn handle_pointer(
        &mut self,
        ui: &egui::Ui,
        avail: ScreenRect,
        display_rect: ScreenRect,
    ) -> Option<PanelEvent> {
        let (pressed, released, pos) = ui.input(|i| {
            let pressed = if i.pointer.button_pressed(egui::PointerButton::Primary) {
                Some(PointerButton::Primary)
            } else if i.pointer.button_pressed(egui::PointerButton::Secondary) {
                Some(PointerButton::Secondary)
            } else if i.pointer.button_pressed(egui::PointerButton::Middle) {
                Some(PointerButton::Middle)
            } else {
                None
            };
            (pressed, i.pointer.any_released(), i.pointer.interact_pos())
        });
        let area = hit_area(self.engine.is_active(), avail, display_rect);
        let inside = pos.filter(|p| area.contains(*p));
        let local = |p: Pos2| Point::new(p.x - display_rect.min.x, p.y - display_rect.min.y);

        let mut outcome = GestureOutcome::Ignored;
        if let (Some(button), Some(p)) = (pressed, inside) {
            outcome = self.engine.pointer_down(local(p), button);
        }
        if self.engine.is_selecting() {
            match inside {
                Some(p) => {
                    self.engine.pointer_move(local(p));
                    if released {
                        outcome = self.engine.pointer_up();
                    }
                }
                None => outcome = self.engine.pointer_leave(),
            }
        }

        match outcome {
            GestureOutcome::Activate => Some(PanelEvent::Activate(self.editor)),
            GestureOutcome::Selected(rect) => Some(PanelEvent::Selected(self.editor, rect)),
            _ => None,
        }
    }

    fn refresh_image_texture(&mut self, ctx: &egui::Context, image: &PanelImage<'_>) {
        if self.image_tex.as_ref().is_some_and(|(id, _)| *id == image.id) {
            return;
        }
        let (w, h) = image.pixels.dimensions();
        let color = egui::ColorImage::from_rgba_unmultiplied(
            [w as usize, h as usize],
            image.pixels.as_raw(),
        );
        let tex = ctx.load_texture(
            format!("{}_image_{}", self.editor.label(), image.id),
            color,
            TextureOptions::LINEAR,
        );
        self.image_tex = Some((image.id, tex));
    }

    fn refresh_mask_cache(&mut self, mask: Option<&ImageHandle>) {
        let Some(mask) = mask else {
            self.mask_cache = None;
            return;
        };
        if self.mask_cache.as_ref().is_some_and(|(id, _)| *id == mask.id()) {
            return;
        }
        self.mask_cache = match mask.decode() {
            Ok(decoded) => Some((mask.id(), mask_preview_rgba(&decoded))),
            Err(e) => {
                log::warn!("[UI] could not decode mask for display: {}", e);
                None
            }
        };
    }

    fn release(&mut self) {
        self.image_tex = None;
        self.overlay_tex = None;
        self.mask_cache = None;
        self.engine.clear_geometry();
    }
}

/// Where pointer presses count. An inactive panel activates on a click
/// anywhere, letterbox included; the active one only selects on the image.
fn hit_area(active: bool, avail: ScreenRect, display_rect: ScreenRect) -> ScreenRect {
    if active { display_rect } else { avail }
}

/// Largest rect with the image's aspect ratio that fits `avail`, centred.
/// Images are never upscaled.
fn fit_rect(avail: ScreenRect, width: u32, height: u32) -> ScreenRect {
    if width == 0 || height == 0 {
        return ScreenRect::from_center_size(avail.center(), Vec2::ZERO);
    }
    let scale = (avail.width() / width as f32)
        .min(avail.height() / height as f32)
        .min(1.0)
        .max(0.0);
    let size = Vec2::new(width as f32 * scale, height as f32 * scale);
    ScreenRect::from_center_size(avail.center(), size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_keeps_aspect_and_centres() {
        let avail = ScreenRect::from_min_size(Pos2::ZERO, Vec2::new(400.0, 400.0));
        let r = fit_rect(avail, 800, 400);
        assert_eq!(r.size(), Vec2::new(400.0, 200.0));
        assert_eq!(r.center(), avail.center());
    }

    #[test]
    fn inactive_panel_accepts_clicks_in_letterbox() {
        let avail = ScreenRect::from_min_size(Pos2::ZERO, Vec2::new(400.0, 400.0));
        let display = fit_rect(avail, 800, 400);
        let letterbox = Pos2::new(200.0, 20.0);
        assert!(!display.contains(letterbox));
        assert!(hit_area(false, avail, display).contains(letterbox));
        assert!(!hit_area(true, avail, display).contains(letterbox));
        assert!(hit_area(true, avail, display).contains(display.center()));
    }

    #[test]
    fn small_images_are_not_upscaled() {
        let avail = ScreenRect::from_min_size(Pos2::ZERO, Vec2::new(400.0, 400.0));
        assert_eq!(fit_rect(avail, 100, 50).size(), Vec2::new(100.0, 50.0));
    }
}
