//! API error type with HTTP status mapping.
//!
//! Every handler returns `Result<_, ApiError>`. The response body always has
//! the shape
//!
//! ```json
//! { "error": { "code": "validation", "message": "...", "fields": {}, "form": [] } }
//! ```
//!
//! with `fields` and `form` present only for validation failures.

use std::collections::BTreeMap;

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::error;

use barter_types::api::ValidationErrors;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<BTreeMap<String, Vec<String>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form: Option<Vec<String>>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Input failed form validation. Nothing was written.
    #[error("{message}")]
    Validation {
        message: String,
        errors: ValidationErrors,
    },

    /// The request could not be read: bad JSON, wrong content type, or a
    /// path or query value of the wrong shape.
    #[error("{message}")]
    BadRequest { status: StatusCode, message: String },

    #[error("{0} not found")]
    NotFound(&'static str),

    /// The entity exists but the caller may not act on it.
    #[error("{0}")]
    Forbidden(String),

    #[error("authentication required")]
    Unauthorized,

    #[error("{0}")]
    Conflict(String),

    /// Storage or runtime failure. The cause is logged, never returned.
    #[error("internal error")]
    Internal(anyhow::Error),
}

impl ApiError {
    pub fn validation(errors: ValidationErrors) -> Self {
        Self::Validation {
            message: "Please correct the errors below.".to_string(),
            errors,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation",
            Self::BadRequest { .. } => "bad_request",
            Self::NotFound(_) => "not_found",
            Self::Forbidden(_) => "forbidden",
            Self::Unauthorized => "unauthorized",
            Self::Conflict(_) => "conflict",
            Self::Internal(_) => "internal",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::BadRequest { status, .. } => *status,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        Self::validation(errors)
    }
}

macro_rules! from_rejection {
    ($($rejection:ty),*) => {
        $(impl From<$rejection> for ApiError {
            fn from(rejection: $rejection) -> Self {
                Self::BadRequest {
                    status: rejection.status(),
                    message: rejection.body_text(),
                }
            }
        })*
    };
}

from_rejection!(JsonRejection, PathRejection, QueryRejection);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Internal(cause) = &self {
            error!("Internal error: {:#}", cause);
        }

        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();
        let (fields, form) = match self {
            Self::Validation { errors, .. } => (Some(errors.fields), Some(errors.form)),
            _ => (None, None),
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code,
                message,
                fields,
                form,
            },
        };
        (status, Json(body)).into_response()
    }
}
