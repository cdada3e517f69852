use std::io;

use crate::config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The request never reached the server or its response never arrived intact
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The server refused the submission (missing field, bad upload, ...)
    #[error("Rejected by server ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    /// Draft failed client-side checks; nothing was sent
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("User profile is not set")]
    ProfileUnset,

    #[error("A submission is already in progress")]
    SubmissionInFlight,

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Template rendering error: {0}")]
    Template(#[from] tera::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Text shown to the user for this error.
    ///
    /// Transport failures collapse to a generic retry hint, server rejections
    /// pass the server's own message through, and not-found errors keep their
    /// subject so the user knows what disappeared.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Network(_) => "Network error, please check your connection and retry".to_string(),
            AppError::Rejected { message, .. } => message.clone(),
            AppError::NotFound(what) => format!("{} does not exist", what),
            AppError::Validation(reason) => reason.clone(),
            AppError::ProfileUnset => {
                "Set your name and email first (profile --name NAME --email EMAIL)".to_string()
            }
            AppError::SubmissionInFlight => "Still sending, please wait".to_string(),
            AppError::Config(e) => e.to_string(),
            _ => {
                tracing::error!("Internal error: {:?}", self);
                "Something went wrong, please retry".to_string()
            }
        }
    }

    /// Whether the failure happened in transport rather than in the application
    pub fn is_transport(&self) -> bool {
        matches!(self, AppError::Network(_))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
