//! Error types with HTTP status code mapping.
//!
//! [`GuiError`] covers failures that are reported over the plain HTTP error
//! channel: undecodable request bodies and failed navigation. Failures of a
//! decoded action call are not HTTP errors; they travel inside the
//! [`Update`](crate::domain::Update) as an `UpdateError`.
//!
//! [`RegistrationError`] is raised while building the
//! [`Registry`](crate::domain::Registry) and is fatal at startup.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2001,
///     "message": "page not found: /nope"
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// HTTP-level error enum with status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category        | HTTP Status               |
/// |-----------|-----------------|---------------------------|
/// | 1000–1999 | Validation      | 400 Bad Request           |
/// | 2000–2999 | Not Found       | 404 Not Found             |
/// | 3000–3999 | Server          | 500 Internal Server Error |
#[derive(Debug, thiserror::Error)]
pub enum GuiError {
    /// The request body could not be decoded.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The navigation URL could not be parsed.
    #[error("invalid url {url:?}: {reason}")]
    InvalidUrl {
        /// The URL as sent by the client.
        url: String,
        /// Parser message.
        reason: String,
    },

    /// No registered page matches the path.
    #[error("page not found: {0}")]
    PageNotFound(String),

    /// A page handler, document render or update failed.
    #[error("page {path} failed: {reason}")]
    PageFailed {
        /// Registered page pattern.
        path: String,
        /// Failure message.
        reason: String,
    },
}

impl GuiError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::InvalidUrl { .. } => 1002,
            Self::PageNotFound(_) => 2001,
            Self::PageFailed { .. } => 3001,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::InvalidUrl { .. } => StatusCode::BAD_REQUEST,
            Self::PageNotFound(_) => StatusCode::NOT_FOUND,
            Self::PageFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GuiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

/// Rejected registration. Raised by
/// [`RegistryBuilder::build`](crate::domain::RegistryBuilder::build).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    /// An action, stream or component was registered without a name.
    #[error("registration name must not be empty")]
    EmptyName,

    /// Two actions share a name.
    #[error("action {0:?} is already registered")]
    DuplicateAction(String),

    /// Two stream sources share a name.
    #[error("stream {0:?} is already registered")]
    DuplicateStream(String),

    /// Two pages share a path.
    #[error("page {0:?} is already registered")]
    DuplicatePage(String),

    /// A page path would route the same requests as an earlier page.
    #[error("page {path:?} conflicts with {existing:?}")]
    ConflictingPage {
        /// The rejected path.
        path: String,
        /// The page registered first.
        existing: String,
    },

    /// A page path collides with a route the engine serves itself.
    #[error("page {path:?} collides with reserved route {reserved:?}")]
    ReservedPath {
        /// The rejected path.
        path: String,
        /// The engine route.
        reserved: String,
    },

    /// A page path is malformed.
    #[error("invalid page path {path:?}: {reason}")]
    InvalidPagePath {
        /// The rejected path.
        path: String,
        /// Why it was rejected.
        reason: String,
    },
}
