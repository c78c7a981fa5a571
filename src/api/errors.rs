use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::errors::ConsoleError;

impl IntoResponse for ConsoleError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            ConsoleError::InvalidArgument(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ConsoleError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ConsoleError::ResolutionConflict { .. } => (StatusCode::CONFLICT, self.to_string()),
            ConsoleError::HttpStatus { status, body, .. } => (
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY),
                body.clone(),
            ),
            ConsoleError::Configuration(_)
            | ConsoleError::Connectivity { .. }
            | ConsoleError::Timeout { .. } => {
                (StatusCode::SERVICE_UNAVAILABLE, "Backend unavailable".to_string())
            }
            ConsoleError::Protocol(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
        };

        (status, Json(json!({"error": message}))).into_response()
    }
}
