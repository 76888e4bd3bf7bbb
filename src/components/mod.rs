pub mod controls;
pub mod image_panel;

pub use controls::ControlAction;
pub use image_panel::{ImagePanel, PanelEvent, PanelImage};
