//! Normalized API errors.
//!
//! DESIGN
//! ======
//! Every failure an endpoint call can produce lands in one [`ApiError`]
//! variant, chosen from the HTTP status (or from the absence of a response).
//! `Display` is always safe to show to a user; internal detail is only
//! reachable through [`ApiError::detail`] for logging.
//!
//! TRADE-OFFS
//! ==========
//! 502/503/504 are grouped with connection failures as `Transport`: the
//! backend could not serve the request, which says nothing about the token.

use super::types::{Detail, ErrorResponse, FieldError};

pub const NETWORK_ERROR_MESSAGE: &str = "Network error. Please check your connection.";
pub const UNEXPECTED_ERROR_MESSAGE: &str = "An unexpected error occurred.";

/// Coarse error classification, used by callers that only need to branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Auth,
    Conflict,
    NotFound,
    Transport,
    Unexpected,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    /// Malformed input (400, 422).
    #[error("{message}")]
    Validation { status: u16, message: String, fields: Vec<FieldError> },

    /// Missing, invalid, or expired credentials (401, 403).
    #[error("{message}")]
    Auth { status: u16, message: String },

    /// Domain rule violation such as a duplicate account (409).
    #[error("{message}")]
    Conflict { message: String },

    #[error("{message}")]
    NotFound { message: String },

    /// The backend could not be reached or could not serve the request.
    #[error("{message}")]
    Transport { status: Option<u16>, message: String, detail: String },

    /// Anything else. `detail` is never shown to the user.
    #[error("An unexpected error occurred.")]
    Unexpected { status: Option<u16>, detail: String },
}

impl ApiError {
    /// Classify a non-success response from its status and raw body.
    #[must_use]
    pub fn from_response(status: u16, body: &str) -> Self {
        let parsed = serde_json::from_str::<ErrorResponse>(body).ok();
        let (detail_message, fields) = match parsed.map(|r| r.detail) {
            Some(Detail::Message(msg)) => (Some(msg), Vec::new()),
            Some(Detail::Fields(fields)) => (None, fields),
            None => (None, Vec::new()),
        };
        let message = detail_message
            .or_else(|| fields.first().map(|f| f.msg.clone()))
            .unwrap_or_else(|| fallback_message(status).to_owned());

        match status {
            400 | 422 => Self::Validation { status, message, fields },
            401 | 403 => Self::Auth { status, message },
            404 => Self::NotFound { message },
            409 => Self::Conflict { message },
            502..=504 => Self::Transport { status: Some(status), message, detail: body.to_owned() },
            _ => Self::Unexpected { status: Some(status), detail: body.to_owned() },
        }
    }

    /// A request that never produced a response (connect failure, timeout, broken body).
    #[must_use]
    pub fn transport(detail: impl Into<String>) -> Self {
        Self::Transport { status: None, message: NETWORK_ERROR_MESSAGE.to_owned(), detail: detail.into() }
    }

    #[must_use]
    pub fn unexpected(status: Option<u16>, detail: impl Into<String>) -> Self {
        Self::Unexpected { status, detail: detail.into() }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Auth { .. } => ErrorKind::Auth,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Transport { .. } => ErrorKind::Transport,
            Self::Unexpected { .. } => ErrorKind::Unexpected,
        }
    }

    /// HTTP status, when the backend answered at all.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Validation { status, .. } | Self::Auth { status, .. } => Some(*status),
            Self::Conflict { .. } => Some(409),
            Self::NotFound { .. } => Some(404),
            Self::Transport { status, .. } | Self::Unexpected { status, .. } => *status,
        }
    }

    #[must_use]
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }

    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// Field-level failures for inline display; empty for other kinds.
    #[must_use]
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            Self::Validation { fields, .. } => fields,
            _ => &[],
        }
    }

    /// Diagnostic text for logs. Not user-facing.
    #[must_use]
    pub fn detail(&self) -> &str {
        match self {
            Self::Transport { detail, .. } | Self::Unexpected { detail, .. } => detail,
            Self::Validation { message, .. }
            | Self::Auth { message, .. }
            | Self::Conflict { message }
            | Self::NotFound { message } => message,
        }
    }
}

fn fallback_message(status: u16) -> &'static str {
    match status {
        401 => "Authentication required. Please sign in.",
        404 => "Resource not found.",
        409 => "This email is already registered.",
        502..=504 => "Service temporarily unavailable. Please try again.",
        _ => UNEXPECTED_ERROR_MESSAGE,
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
