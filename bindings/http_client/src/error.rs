use gale_core::prelude::TransportError;

/// A form could not be submitted at all. A submission that reached the server and was refused is
/// not an error, see [crate::prelude::SubmissionOutcome].
#[derive(Debug, thiserror::Error)]
pub enum FormError {
    #[error("Could not encode form: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Transport(#[from] TransportError),
}
