//! The generative image model the edit session talks to.
//!
//! Three calls: segment every salient subject, segment the object inside a
//! rectangle burned into the image, and edit the image under an instruction.
//! An `Ok(None)` means the model answered without an image ("nothing found",
//! "could not do it"); `Err` is reserved for transport and model failures.

pub mod gemini;

use thiserror::Error;

use crate::io::EncodedImage;

pub use gemini::GeminiClient;

/// Shown when a failure carries no message of its own.
pub const GENERIC_FAILURE: &str = "could not reach the AI model; check the API key and network";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("no API key configured (set GEMINI_API_KEY or add api_key to the settings file)")]
    MissingApiKey,
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("{}", transport_message(.0))]
    Transport(String),
    #[error("model returned HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("malformed model response: {0}")]
    MalformedResponse(String),
    #[error("model returned an image that could not be decoded: {0}")]
    UndecodableImage(String),
    #[error("model job panicked: {0}")]
    JobPanicked(String),
}

fn transport_message(message: &str) -> String {
    if message.trim().is_empty() {
        GENERIC_FAILURE.to_string()
    } else {
        format!("{} ({})", GENERIC_FAILURE, message)
    }
}

/// Remote (or scripted) image model.
pub trait ImageModel: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Binary mask of every salient subject in `image`.
    fn segment_subjects(&self, image: &EncodedImage) -> Result<Option<EncodedImage>, ModelError>;

    /// Binary mask of the object inside the rectangle drawn on `composite`.
    fn segment_selection(&self, composite: &EncodedImage)
    -> Result<Option<EncodedImage>, ModelError>;

    /// Edit the background of `image`. White areas of `mask` are protected.
    fn edit_image(
        &self,
        image: &EncodedImage,
        instruction: &str,
        mask: Option<&EncodedImage>,
    ) -> Result<Option<EncodedImage>, ModelError>;
}

/// Stands in when no real model could be configured (typically a missing
/// API key). Every call fails with the configuration error, so the session
/// surfaces it in the error slot instead of the app refusing to start.
pub struct UnavailableModel {
    reason: ModelError,
}

impl UnavailableModel {
    pub fn new(reason: ModelError) -> Self {
        Self { reason }
    }
}

impl ImageModel for UnavailableModel {
    fn name(&self) -> &str {
        "unavailable"
    }

    fn segment_subjects(&self, _: &EncodedImage) -> Result<Option<EncodedImage>, ModelError> {
        Err(self.reason.clone())
    }

    fn segment_selection(&self, _: &EncodedImage) -> Result<Option<EncodedImage>, ModelError> {
        Err(self.reason.clone())
    }

    fn edit_image(
        &self,
        _: &EncodedImage,
        _: &str,
        _: Option<&EncodedImage>,
    ) -> Result<Option<EncodedImage>, ModelError> {
        Err(self.reason.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_transport_error_uses_fallback() {
        assert_eq!(ModelError::Transport(String::new()).to_string(), GENERIC_FAILURE);
        let msg = ModelError::Transport("connection refused".into()).to_string();
        assert!(msg.starts_with(GENERIC_FAILURE));
        assert!(msg.contains("connection refused"));
    }

    #[test]
    fn unavailable_model_reports_its_reason() {
        let model = UnavailableModel::new(ModelError::MissingApiKey);
        let image = EncodedImage::new(vec![1], "image/png");
        assert_eq!(model.segment_subjects(&image), Err(ModelError::MissingApiKey));
        assert_eq!(
            model.edit_image(&image, "x", None),
            Err(ModelError::MissingApiKey)
        );
    }

    #[test]
    fn status_error_keeps_server_message() {
        let e = ModelError::Status {
            status: 403,
            message: "API key not valid".into(),
        };
        assert_eq!(e.to_string(), "model returned HTTP 403: API key not valid");
    }
}
