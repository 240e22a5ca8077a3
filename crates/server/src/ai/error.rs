//! Failure taxonomy for the chat orchestration path.
//!
//! Every variant's Display string is the user-facing `response` text; these
//! never cross the HTTP boundary as an error status.

use thiserror::Error;

use crate::error::AppError;

#[derive(Debug, Error)]
pub enum ChatError {
    /// The model produced no content for the extraction call.
    #[error("AI agent could not extract information. Please try rephrasing.")]
    NoContent,

    /// No HCP name was found in the structured response or the raw text.
    #[error("Could not identify HCP name from your input. Please specify the HCP (e.g., 'Dr. John Doe').")]
    NoHcpName,

    /// The named HCP does not exist (log path).
    #[error("HCP '{0}' not found")]
    HcpNotFound(String),

    /// The named HCP does not exist (edit path).
    #[error("HCP '{0}' not found for editing interaction. Please create it first.")]
    HcpNotFoundForEdit(String),

    /// The referenced interaction id does not exist.
    #[error("Interaction with ID {0} not found.")]
    InteractionNotFound(i32),

    /// The 30-second budget for model calls was exceeded.
    #[error("AI processing timed out. Please try again or simplify your request.")]
    Timeout,

    /// Anything else: model transport failures, store errors.
    #[error("An unexpected error occurred: {0}. Please check backend logs.")]
    Unexpected(String),
}

impl From<AppError> for ChatError {
    fn from(err: AppError) -> Self {
        ChatError::Unexpected(err.to_string())
    }
}
