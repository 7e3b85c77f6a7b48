//! HTTP error envelope.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;

use crate::error::{PersistenceError, QueryError};

/// One rejected request field.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{message}")]
    BadRequest {
        message: &'static str,
        errors: Vec<FieldError>,
    },

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("Failed to generate export file: {0}")]
    Export(String),

    #[error("Failed to fetch chat history: {0}")]
    History(#[from] PersistenceError),
}

impl ApiError {
    pub fn missing_field(field: &'static str, message: &'static str) -> Self {
        Self::BadRequest {
            message,
            errors: vec![FieldError { field, message }],
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Query(e) => {
                StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            Self::Export(_) | Self::History(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::BadRequest { message, errors } => json!({
                "success": false,
                "message": message,
                "errors": errors,
            }),
            Self::Unauthorized(_) | Self::Forbidden(_) | Self::NotFound(_) => json!({
                "success": false,
                "message": self.to_string(),
            }),
            Self::Query(e) => json!({
                "success": false,
                "message": e.to_string(),
                "error": e.to_string(),
            }),
            Self::Export(e) => json!({
                "success": false,
                "message": "Failed to generate export file",
                "error": e,
            }),
            Self::History(e) => json!({
                "success": false,
                "message": "Failed to fetch chat history",
                "error": e.to_string(),
            }),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PolicyViolation;

    #[test]
    fn statuses() {
        assert_eq!(
            ApiError::missing_field("query", "Query is required").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::Unauthorized("x").status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::from(QueryError::from(PolicyViolation::new("nope"))).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::NotFound("Route GET /x not found".into()).status(),
            StatusCode::NOT_FOUND
        );
    }
}
