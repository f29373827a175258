use thiserror::Error;

use crate::models::ErrorPayload;

/// Message shown when a failure carries nothing more useful for the user.
pub const GENERIC_FAILURE: &str = "Something went wrong. Please try again.";

/// Top-level client error. Every variant resolves to a visible message;
/// none of them is fatal to the application.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    // ── Authorization ────────────────────────────────────────────────────────
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Session expired. Please login again.")]
    SessionExpired,

    // ── Backend-reported failures ────────────────────────────────────────────
    #[error("Quota exceeded: {detail}")]
    QuotaExceeded { detail: String },

    #[error("Not found: {detail}")]
    NotFound { detail: String },

    #[error("Backend returned {status}: {detail}")]
    Backend { status: u16, detail: String },

    // ── Transport / decoding ─────────────────────────────────────────────────
    #[error("Network error: {message}")]
    Transport { message: String },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    // ── Validation errors ────────────────────────────────────────────────────
    #[error("Field '{field_name}' cannot be empty")]
    EmptyField { field_name: String },

    #[error("Field '{field_name}' exceeds max length of {max_length} (actual: {actual_length})")]
    FieldTooLong { field_name: String, max_length: usize, actual_length: usize },

    // ── Client state ─────────────────────────────────────────────────────────
    #[error("Invalid state: {message}")]
    InvalidState { message: String },

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    /// Maps a non-success HTTP status and its body to an error.
    ///
    /// The body is expected to be the backend's `{"detail": ...}` payload; any
    /// other body is used verbatim (trimmed) as the detail.
    pub fn from_status(status: u16, body: &str) -> Self {
        let detail = ErrorPayload::detail_from_body(body);
        match status {
            401 => AppError::Unauthorized,
            429 => AppError::QuotaExceeded {
                detail: detail.unwrap_or_else(|| "Rate limit exceeded".to_string()),
            },
            404 => AppError::NotFound {
                detail: detail.unwrap_or_else(|| "Not found".to_string()),
            },
            _ => AppError::Backend { status, detail: detail.unwrap_or_default() },
        }
    }

    /// Error for a failed credential exchange (login, register). Here a 401
    /// means bad credentials, so the backend's detail is kept for the user.
    pub fn credential_rejected(status: u16, body: &str) -> Self {
        AppError::Backend {
            status,
            detail: ErrorPayload::detail_from_body(body)
                .unwrap_or_else(|| "Authentication failed".to_string()),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        AppError::Transport { message: message.into() }
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        AppError::InvalidResponse { message: message.into() }
    }

    pub fn empty_field(field_name: &str) -> Self {
        AppError::EmptyField { field_name: field_name.to_string() }
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        AppError::InvalidState { message: message.into() }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, AppError::Unauthorized | AppError::SessionExpired)
    }

    pub fn is_quota(&self) -> bool {
        matches!(self, AppError::QuotaExceeded { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, AppError::EmptyField { .. } | AppError::FieldTooLong { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound { .. })
    }

    /// Text to put in front of the user for this failure.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Unauthorized | AppError::SessionExpired => {
                "Session expired. Please login again.".to_string()
            }
            AppError::QuotaExceeded { detail } => detail.clone(),
            AppError::NotFound { detail } => detail.clone(),
            AppError::Backend { detail, .. } if !detail.is_empty() => detail.clone(),
            AppError::EmptyField { .. } | AppError::FieldTooLong { .. } => self.to_string(),
            AppError::Backend { .. }
            | AppError::Transport { .. }
            | AppError::InvalidResponse { .. }
            | AppError::InvalidState { .. }
            | AppError::Unexpected(_) => GENERIC_FAILURE.to_string(),
        }
    }
}

/// Errors raised while assembling a [`crate::config::ClientConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid value for the variable {0}: {1}")]
    InvalidValue(String, String),
}
