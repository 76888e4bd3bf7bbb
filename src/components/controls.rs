// ============================================================================
// CONTROLS: tool row, background options, instruction field, error banner
// ============================================================================

use eframe::egui;
use egui::{Color32, RichText};

use crate::error::{ErrorKind, SessionError};
use crate::prompt::{FillMode, chip_label};
use crate::session::{EditSession, SessionMode};

/// Requests the controls cannot fulfil on their own (they need dialogs).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlAction {
    OpenImage,
    Download,
    OpenSettings,
}

/// Open / clear selection / undo / redo / download.
pub fn tool_row(ui: &mut egui::Ui, session: &mut EditSession) -> Option<ControlAction> {
    let mut action = None;
    ui.horizontal(|ui| {
        if ui.button("📂 Open").clicked() {
            action = Some(ControlAction::OpenImage);
        }
        ui.separator();

        let has_mask = session.current().active_mask().is_some();
        if ui
            .add_enabled(has_mask, egui::Button::new("✖ Clear selection"))
            .clicked()
        {
            session.clear_mask();
        }
        if ui
            .add_enabled(session.can_undo(), egui::Button::new("↶ Undo"))
            .on_hover_text("Ctrl+Z")
            .clicked()
        {
            session.undo();
        }
        if ui
            .add_enabled(session.can_redo(), egui::Button::new("↷ Redo"))
            .on_hover_text("Ctrl+Y")
            .clicked()
        {
            session.redo();
        }
        ui.separator();

        let has_result = session.current().edited_image.is_some();
        if ui
            .add_enabled(has_result, egui::Button::new("💾 Download"))
            .clicked()
        {
            action = Some(ControlAction::Download);
        }

        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            if ui.button("⚙").on_hover_text("Settings").clicked() {
                action = Some(ControlAction::OpenSettings);
            }
            match session.mode() {
                SessionMode::Idle => {}
                SessionMode::GeneratingMask => {
                    ui.label(RichText::new("Generating mask…").weak());
                    ui.spinner();
                }
                SessionMode::Processing => {
                    ui.label(RichText::new("Processing…").weak());
                    ui.spinner();
                }
            }
        });
    });
    action
}

/// Background mode, colours, instruction, apply/cancel and recent prompts.
pub fn options_panel(ui: &mut egui::Ui, session: &mut EditSession) {
    ui.heading("Background");
    ui.add_space(4.0);
    {
        let bg = session.background_mut();
        ui.horizontal(|ui| {
            for mode in [FillMode::Transparent, FillMode::Solid, FillMode::Gradient] {
                ui.selectable_value(&mut bg.mode, mode, mode.label());
            }
        });
        match bg.mode {
            FillMode::Transparent => {}
            FillMode::Solid => {
                ui.horizontal(|ui| {
                    ui.label("Color");
                    ui.color_edit_button_srgb(&mut bg.solid.0);
                    ui.label(RichText::new(bg.solid.to_string()).monospace().weak());
                });
            }
            FillMode::Gradient => {
                ui.horizontal(|ui| {
                    ui.label("Top");
                    ui.color_edit_button_srgb(&mut bg.gradient_top.0);
                    ui.label(RichText::new(bg.gradient_top.to_string()).monospace().weak());
                });
                ui.horizontal(|ui| {
                    ui.label("Bottom");
                    ui.color_edit_button_srgb(&mut bg.gradient_bottom.0);
                    ui.label(RichText::new(bg.gradient_bottom.to_string()).monospace().weak());
                });
            }
        }
    }

    ui.add_space(10.0);
    ui.label("Extra instruction (optional)");
    let response = ui.add(
        egui::TextEdit::singleline(session.prompt_mut())
            .hint_text("e.g. add a soft shadow under the subject")
            .desired_width(f32::INFINITY),
    );
    let submitted = response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));

    ui.add_space(6.0);
    let processing = session.mode() == SessionMode::Processing;
    ui.horizontal(|ui| {
        if processing {
            if ui.button("⏹ Cancel").clicked() {
                session.cancel();
            }
            ui.spinner();
        } else {
            let apply = ui.add_enabled(session.can_apply(), egui::Button::new("✨ Apply"));
            if apply.clicked() || (submitted && session.can_apply()) {
                session.apply_edit();
            }
        }
    });

    if !session.prompt_history().is_empty() {
        ui.add_space(10.0);
        ui.label(RichText::new("Recent").weak());
        let mut picked = None;
        ui.horizontal_wrapped(|ui| {
            for (i, prompt) in session.prompt_history().entries().enumerate() {
                if ui
                    .small_button(chip_label(prompt))
                    .on_hover_text(prompt)
                    .clicked()
                {
                    picked = Some(i);
                }
            }
        });
        if let Some(i) = picked {
            session.use_recent_prompt(i);
        }
    }
}

/// Dismissible banner for the session's current error.
pub fn error_banner(ui: &mut egui::Ui, session: &mut EditSession) {
    let Some(error) = session.error() else { return };
    let (fill, text_color) = banner_colors(error);
    let message = error.to_string();

    let mut dismiss = false;
    egui::Frame::none()
        .fill(fill)
        .rounding(4.0)
        .inner_margin(egui::Margin::symmetric(8.0, 6.0))
        .show(ui, |ui| {
            ui.horizontal(|ui| {
                ui.label(RichText::new(message).color(text_color));
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.small_button("✕").clicked() {
                        dismiss = true;
                    }
                });
            });
        });
    if dismiss {
        session.dismiss_error();
    }
}

fn banner_colors(error: &SessionError) -> (Color32, Color32) {
    match error.kind() {
        ErrorKind::CollaboratorFailure => (Color32::from_rgb(90, 30, 30), Color32::from_rgb(255, 210, 210)),
        ErrorKind::UserInput | ErrorKind::EmptyResult => {
            (Color32::from_rgb(85, 70, 25), Color32::from_rgb(255, 240, 200))
        }
        ErrorKind::Cancelled => (Color32::from_gray(60), Color32::from_gray(220)),
    }
}
