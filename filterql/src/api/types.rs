//! Shared API types
//!
//! Error responses for endpoints that accept filter parameters.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::filters::FilterError;

/// Standard API error response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    BadRequest {
        code: String,
        title: String,
        message: String,
        parameter: Option<String>,
    },
    Internal {
        code: String,
        title: String,
        message: String,
        parameter: Option<String>,
    },
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// JSON body: `{error, code, title, message, parameter}`
    pub fn body(&self) -> serde_json::Value {
        let (error_type, code, title, message, parameter) = match self {
            Self::BadRequest {
                code,
                title,
                message,
                parameter,
            } => ("bad_request", code, title, message, parameter),
            Self::Internal {
                code,
                title,
                message,
                parameter,
            } => ("internal_error", code, title, message, parameter),
        };
        json!({
            "error": error_type,
            "code": code,
            "title": title,
            "message": message,
            "parameter": parameter,
        })
    }
}

impl From<FilterError> for ApiError {
    fn from(e: FilterError) -> Self {
        let code = e.code().to_string();
        let title = e.title().to_string();
        let parameter = e.parameter().map(str::to_string);
        let message = e.to_string();

        if e.status().is_server_error() {
            tracing::error!(error = %e, code = %code, "Filter resolution failed");
            Self::Internal {
                code,
                title,
                message,
                parameter,
            }
        } else {
            tracing::debug!(error = %e, code = %code, "Rejected filter input");
            Self::BadRequest {
                code,
                title,
                message,
                parameter,
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}
