use thiserror::Error;

use crate::model::ModelError;

/// Coarse category of a session error, used by front ends to pick styling
/// and by the CLI to pick an exit status.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Nothing to operate on; fix the input and try again.
    UserInput,
    /// The model answered but produced nothing usable.
    EmptyResult,
    /// Transport or model failure.
    CollaboratorFailure,
    /// The user aborted the operation.
    Cancelled,
}

/// Everything that can land in the session's error slot.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("upload an image first")]
    NoActiveImage,
    #[error("could not read the image: {0}")]
    InvalidImage(String),
    #[error("no subject was detected automatically; drag a rectangle to select it manually")]
    NoSubjectDetected,
    #[error("could not find an object in the selection; try selecting a different area")]
    NoObjectInSelection,
    #[error("could not process the image; try a different prompt or selection")]
    EditUnavailable,
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("cancelled")]
    Cancelled,
    #[error("could not export the image: {0}")]
    Export(String),
    #[error("could not start background workers: {0}")]
    WorkerPool(String),
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::NoActiveImage
            | SessionError::InvalidImage(_)
            | SessionError::Export(_) => ErrorKind::UserInput,
            SessionError::NoSubjectDetected
            | SessionError::NoObjectInSelection
            | SessionError::EditUnavailable => ErrorKind::EmptyResult,
            SessionError::Model(_) | SessionError::WorkerPool(_) => ErrorKind::CollaboratorFailure,
            SessionError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(SessionError::NoActiveImage.kind(), ErrorKind::UserInput);
        assert_eq!(SessionError::NoSubjectDetected.kind(), ErrorKind::EmptyResult);
        assert_eq!(SessionError::EditUnavailable.kind(), ErrorKind::EmptyResult);
        assert_eq!(
            SessionError::from(ModelError::Transport(String::new())).kind(),
            ErrorKind::CollaboratorFailure
        );
        assert_eq!(SessionError::Cancelled.kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn model_errors_display_their_own_message() {
        let e = SessionError::from(ModelError::Status {
            status: 429,
            message: "quota".into(),
        });
        assert_eq!(e.to_string(), "model returned HTTP 429: quota");
    }
}
