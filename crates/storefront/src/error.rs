//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::backend::ApiError;
use crate::checkout::{SelectionError, SubmitRejected};

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Backend API call failed.
    #[error("Backend error: {0}")]
    Backend(#[from] ApiError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request understood but cannot be acted on as is.
    #[error("Unprocessable: {0}")]
    Unprocessable(String),

    /// Conflicts with work already in progress.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Backend requires a signed-in shopper.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Something the request needs is not ready yet.
    #[error("Unavailable: {0}")]
    Unavailable(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<SubmitRejected> for AppError {
    fn from(e: SubmitRejected) -> Self {
        match e {
            SubmitRejected::Missing(missing) => Self::Unprocessable(missing.to_string()),
            SubmitRejected::Busy(_) => Self::Conflict("A checkout is already in progress".into()),
        }
    }
}

impl From<SelectionError> for AppError {
    fn from(e: SelectionError) -> Self {
        match e {
            SelectionError::Backend(e) => Self::Backend(e),
            unknown => Self::Unprocessable(unknown.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        let server_side = match &self {
            Self::Internal(_) => true,
            Self::Backend(err) => !matches!(
                err,
                ApiError::Unauthorized | ApiError::Validation { .. } | ApiError::RateLimited(_)
            ),
            _ => false,
        };
        if server_side {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = match &self {
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Backend(err) => match err {
                ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
                ApiError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                ApiError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
                _ => StatusCode::BAD_GATEWAY,
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Internal(_) => "Internal server error".to_string(),
            Self::Backend(err) => match err {
                ApiError::Unauthorized => "Please sign in to continue".to_string(),
                ApiError::Validation {
                    detail: Some(detail),
                } => detail.clone(),
                ApiError::Validation { detail: None } => "Request was rejected".to_string(),
                ApiError::RateLimited(_) => "Too many requests, please slow down".to_string(),
                _ => "External service error".to_string(),
            },
            Self::NotFound(msg)
            | Self::BadRequest(msg)
            | Self::Unprocessable(msg)
            | Self::Conflict(msg)
            | Self::Unauthorized(msg)
            | Self::Unavailable(msg) => msg.clone(),
        };

        (status, message).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Add a breadcrumb for shopper actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("checkout", "Order submitted", Some(&[("session", "…")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
