//! The one wire-facing error type every handler converges on. Each
//! subsystem error already carries an `ErrorKind` (§7); this just turns
//! that kind into the HTTP status + JSON body the surface promises.

use axum::Json;
use axum::response::{IntoResponse, Response};
use sumo_types::ErrorKind;

pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthenticated, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if matches!(self.kind, ErrorKind::Internal | ErrorKind::OrchestratorUnavailable) {
            tracing::error!(kind = %self.kind, message = %self.message, "request failed");
        }
        let body = Json(serde_json::json!({
            "error": self.kind.wire_name(),
            "message": self.message,
        }));
        (self.kind.status_code(), body).into_response()
    }
}

impl From<sumo_store::Error> for ApiError {
    fn from(e: sumo_store::Error) -> Self {
        Self::new(e.kind(), e.to_string())
    }
}

impl From<sumo_orchestrator::Error> for ApiError {
    fn from(e: sumo_orchestrator::Error) -> Self {
        Self::new(e.kind(), e.to_string())
    }
}

impl From<sumo_submission::Error> for ApiError {
    fn from(e: sumo_submission::Error) -> Self {
        Self::new(e.kind(), e.to_string())
    }
}
