//! Authentication and authorization errors
//!
//! [`AuthError`] is the single taxonomy surfaced at the middleware boundary.
//! Every variant maps to exactly one HTTP status through
//! [`AuthError::status_code`], and the `IntoResponse` impl turns it into a
//! terminal JSON response so no handler runs past a failed check.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::jwt::JwksError;

/// Result alias used across the crate
pub type AuthResult<T> = Result<T, AuthError>;

/// Authentication and authorization errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    /// Credential missing, malformed, expired, mis-addressed or badly signed
    #[error("invalid session: {0}")]
    InvalidSession(String),

    /// No credential could be recovered from any carrier
    #[error("no valid authentication credential found")]
    SessionNotFound,

    /// The local account backing the identity is disabled
    #[error("account is inactive")]
    IdentityInactive,

    /// The identity is valid but has no local account yet
    #[error("identity {identity_id} needs registration")]
    NeedsRegistration {
        /// Identity id that has no local account
        identity_id: String,
    },

    /// Role, family or ownership requirement not met
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Request context expected from an earlier middleware is absent
    #[error("missing authentication context: {0}")]
    MissingContext(&'static str),

    /// OpenID discovery failed while constructing a validator
    #[error("discovery failed: {0}")]
    Discovery(String),

    /// Infrastructure failure (persistence unavailable, etc.)
    #[error("internal auth error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Shorthand for [`AuthError::InvalidSession`]
    pub fn invalid_session(reason: impl Into<String>) -> Self {
        Self::InvalidSession(reason.into())
    }

    /// Shorthand for [`AuthError::Forbidden`]
    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden(reason.into())
    }

    /// HTTP status this error is reported with
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidSession(_) | Self::SessionNotFound | Self::MissingContext(_) => {
                StatusCode::UNAUTHORIZED
            }
            Self::NeedsRegistration { .. } => StatusCode::NOT_FOUND,
            Self::IdentityInactive | Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Discovery(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidSession(_) | Self::SessionNotFound | Self::MissingContext(_) => {
                "unauthorized"
            }
            Self::NeedsRegistration { .. } => "needs_registration",
            Self::IdentityInactive => "account_inactive",
            Self::Forbidden(_) => "forbidden",
            Self::Discovery(_) | Self::Internal(_) => "internal_error",
        }
    }

    /// Whether this is an authentication gap (401) rather than a denial
    pub fn is_unauthenticated(&self) -> bool {
        self.status_code() == StatusCode::UNAUTHORIZED
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            // Callers only ever learn that authentication failed, never why
            Self::InvalidSession(_) | Self::SessionNotFound | Self::MissingContext(_) => json!({
                "error": self.code(),
                "message": "authentication required",
            }),
            Self::NeedsRegistration { .. } => json!({
                "error": self.code(),
                "message": "account registration required",
                "needsRegistration": true,
            }),
            Self::IdentityInactive => json!({
                "error": self.code(),
                "message": "account is inactive",
            }),
            Self::Forbidden(reason) => json!({
                "error": self.code(),
                "message": reason,
            }),
            Self::Discovery(_) | Self::Internal(_) => json!({
                "error": self.code(),
                "message": "internal server error",
            }),
        };

        (status, Json(body)).into_response()
    }
}

impl From<JwksError> for AuthError {
    fn from(err: JwksError) -> Self {
        // Key-set failures never let a request through
        Self::InvalidSession(err.to_string())
    }
}
