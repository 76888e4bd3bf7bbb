//! Raster operations used by the edit session.

pub mod compose;
pub mod mask;
