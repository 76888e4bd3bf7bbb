use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use eframe::egui;
use image::RgbaImage;

use crate::components::controls::{self, ControlAction};
use crate::components::{ImagePanel, PanelEvent, PanelImage};
use crate::io::read_image_file;
use crate::model::{GeminiClient, ImageModel, UnavailableModel};
use crate::session::{ActiveEditor, EditSession, SessionMode};
use crate::settings::AppSettings;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "bmp"];

/// Build the model described by `settings`, falling back to one that
/// reports the configuration problem on every call.
pub fn model_from_settings(settings: &AppSettings) -> Arc<dyn ImageModel> {
    match GeminiClient::from_settings(settings) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            log::warn!("[AI] model not configured: {}", e);
            Arc::new(UnavailableModel::new(e))
        }
    }
}

pub struct BackdropApp {
    session: EditSession,
    settings: AppSettings,

    original_panel: ImagePanel,
    edited_panel: ImagePanel,
    /// Decoded edited image, keyed by its handle id.
    edited_preview: Option<(u64, Arc<RgbaImage>)>,

    /// One-off message for things outside the session (export, file reads).
    notice: Option<String>,

    show_settings: bool,
    api_key_input: String,
}

impl BackdropApp {
    pub fn new(cc: &eframe::CreationContext<'_>, session: EditSession, settings: AppSettings) -> Self {
        cc.egui_ctx.set_visuals(egui::Visuals::dark());
        let api_key_input = settings.api_key.clone();
        Self {
            session,
            settings,
            original_panel: ImagePanel::new(ActiveEditor::Original),
            edited_panel: ImagePanel::new(ActiveEditor::Edited),
            edited_preview: None,
            notice: None,
            show_settings: false,
            api_key_input,
        }
    }

    fn open_path(&mut self, path: PathBuf) {
        match read_image_file(&path) {
            Ok((name, bytes)) => {
                self.notice = None;
                self.session.upload_image(name, bytes);
            }
            Err(e) => {
                log::warn!("[IO] could not read {}: {}", path.display(), e);
                self.notice = Some(format!("Could not read {}: {}", path.display(), e));
            }
        }
    }

    fn pick_and_open(&mut self) {
        if let Some(path) = rfd::FileDialog::new()
            .add_filter("Image", IMAGE_EXTENSIONS)
            .pick_file()
        {
            self.open_path(path);
        }
    }

    fn download(&mut self) {
        let stem = self
            .session
            .source()
            .and_then(|s| {
                std::path::Path::new(&s.name)
                    .file_stem()
                    .map(|st| st.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| "image".to_string());
        let Some(path) = rfd::FileDialog::new()
            .add_filter("PNG", &["png"])
            .set_file_name(&format!("{}_edited.png", stem))
            .save_file()
        else {
            return;
        };
        self.notice = match self.session.export_edited(&path) {
            Ok(()) => Some(format!("Saved {}", path.display())),
            Err(e) => Some(e.to_string()),
        };
    }

    /// Decode the current edited image when its handle changed.
    fn refresh_edited_preview(&mut self) {
        let Some(handle) = self.session.current().edited_image.clone() else {
            self.edited_preview = None;
            return;
        };
        if self
            .edited_preview
            .as_ref()
            .is_some_and(|(id, _)| *id == handle.id())
        {
            return;
        }
        self.edited_preview = match handle.decode_rgba() {
            Ok(pixels) => Some((handle.id(), Arc::new(pixels))),
            Err(e) => {
                log::warn!("[UI] could not decode edited image: {}", e);
                None
            }
        };
    }

    fn handle_dropped_files(&mut self, ctx: &egui::Context) {
        let dropped: Vec<egui::DroppedFile> = ctx.input(|i| i.raw.dropped_files.clone());
        // Only the last supported file counts; there is one source image
        let path = dropped.into_iter().filter_map(|f| f.path).rfind(|p| {
            let ext = p
                .extension()
                .map(|e| e.to_string_lossy().to_lowercase())
                .unwrap_or_default();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        });
        if let Some(path) = path {
            self.open_path(path);
        }
    }

    fn handle_shortcuts(&mut self, ctx: &egui::Context) {
        let (undo, redo, escape) = ctx.input(|i| {
            let cmd = i.modifiers.command;
            (
                cmd && !i.modifiers.shift && i.key_pressed(egui::Key::Z),
                cmd && (i.key_pressed(egui::Key::Y) || (i.modifiers.shift && i.key_pressed(egui::Key::Z))),
                i.key_pressed(egui::Key::Escape),
            )
        });
        if ctx.wants_keyboard_input() {
            return;
        }
        if undo {
            self.session.undo();
        }
        if redo {
            self.session.redo();
        }
        if escape && self.session.mode() == SessionMode::Processing {
            self.session.cancel();
        }
    }

    fn settings_window(&mut self, ctx: &egui::Context) {
        let mut open = self.show_settings;
        let mut save = false;
        egui::Window::new("Settings")
            .open(&mut open)
            .collapsible(false)
            .resizable(false)
            .show(ctx, |ui| {
                egui::Grid::new("settings_grid").num_columns(2).show(ui, |ui| {
                    ui.label("API key");
                    ui.add(egui::TextEdit::singleline(&mut self.api_key_input).password(true));
                    ui.end_row();

                    ui.label("Model");
                    ui.text_edit_singleline(&mut self.settings.model);
                    ui.end_row();

                    ui.label("Timeout (s)");
                    ui.add(egui::DragValue::new(&mut self.settings.request_timeout_secs).clamp_range(5..=600));
                    ui.end_row();

                    ui.label("Auto mask on upload");
                    ui.checkbox(&mut self.settings.auto_mask_on_upload, "");
                    ui.end_row();
                });
                if let Some(path) = crate::logger::log_path() {
                    ui.add_space(4.0);
                    ui.label(egui::RichText::new(format!("Log: {}", path.display())).weak().small());
                }
                ui.add_space(6.0);
                if ui.button("Save").clicked() {
                    save = true;
                }
            });

        if save {
            self.settings.api_key = self.api_key_input.trim().to_string();
            let bg = self.session.background();
            self.settings.solid_color = bg.solid;
            self.settings.gradient_start = bg.gradient_top;
            self.settings.gradient_end = bg.gradient_bottom;
            self.settings.save();
            self.session.set_model(model_from_settings(&self.settings));
            self.session.set_auto_mask_on_upload(self.settings.auto_mask_on_upload);
            open = false;
        }
        self.show_settings = open;
    }
}

impl eframe::App for BackdropApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.session.poll();
        self.handle_dropped_files(ctx);
        self.handle_shortcuts(ctx);
        self.refresh_edited_preview();

        let mut action = None;
        egui::TopBottomPanel::top("tool_row").show(ctx, |ui| {
            ui.add_space(4.0);
            action = controls::tool_row(ui, &mut self.session);
            ui.add_space(4.0);
        });

        egui::SidePanel::right("options_panel")
            .resizable(false)
            .exact_width(300.0)
            .show(ctx, |ui| {
                ui.add_space(6.0);
                controls::options_panel(ui, &mut self.session);
            });

        let mut events: Vec<PanelEvent> = Vec::new();
        egui::CentralPanel::default().show(ctx, |ui| {
            controls::error_banner(ui, &mut self.session);
            if let Some(notice) = self.notice.clone() {
                ui.horizontal(|ui| {
                    ui.label(egui::RichText::new(notice).weak());
                    if ui.small_button("✕").clicked() {
                        self.notice = None;
                    }
                });
            }

            let state = self.session.current().clone();
            let source = self.session.source().cloned();
            let active = state.active_editor;
            let mode = self.session.mode();
            let original_busy = self.session.is_generating_mask_for(ActiveEditor::Original);
            let edited_busy = self.session.is_generating_mask_for(ActiveEditor::Edited)
                || mode == SessionMode::Processing;
            let edited_preview = self.edited_preview.clone();

            let original_panel = &mut self.original_panel;
            let edited_panel = &mut self.edited_panel;
            ui.columns(2, |cols| {
                let image = source.as_ref().map(|s| PanelImage {
                    id: s.encoded.id(),
                    pixels: &s.preview,
                });
                if let Some(e) = original_panel.show(
                    &mut cols[0],
                    image,
                    state.original_mask.as_ref(),
                    active == ActiveEditor::Original,
                    original_busy,
                ) {
                    events.push(e);
                }

                let image = edited_preview.as_ref().map(|(id, pixels)| PanelImage {
                    id: *id,
                    pixels,
                });
                if let Some(e) = edited_panel.show(
                    &mut cols[1],
                    image,
                    state.edited_mask.as_ref(),
                    active == ActiveEditor::Edited,
                    edited_busy,
                ) {
                    events.push(e);
                }
            });
        });

        for event in events {
            match event {
                PanelEvent::Activate(editor) => {
                    self.session.activate_editor(editor);
                }
                PanelEvent::Selected(_, rect) => self.session.request_mask_for_selection(rect),
            }
        }

        match action {
            Some(ControlAction::OpenImage) => self.pick_and_open(),
            Some(ControlAction::Download) => self.download(),
            Some(ControlAction::OpenSettings) => self.show_settings = true,
            None => {}
        }
        if self.show_settings {
            self.settings_window(ctx);
        }

        // Keep polling while jobs run
        if self.session.pending_jobs() > 0 {
            ctx.request_repaint_after(Duration::from_millis(100));
        }
    }
}
