//! Backdrop: AI-assisted background removal and replacement.
//!
//! The library holds everything but the window: the edit session and its
//! undo/redo history, selection handling, the model client, and the egui
//! front end used by the `Backdrop` binary.

pub mod app;
pub mod cli;
pub mod components;
pub mod error;
pub mod history;
pub mod io;
pub mod logger;
pub mod model;
pub mod ops;
pub mod prompt;
pub mod selection;
pub mod session;
pub mod settings;

pub use error::{ErrorKind, SessionError};
pub use history::HistoryStore;
pub use model::{ImageModel, ModelError};
pub use session::{ActiveEditor, EditSession, EditorState, SessionMode, SessionOptions};
