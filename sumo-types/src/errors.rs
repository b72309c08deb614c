//! Wire-visible error kinds shared across the controller's subsystems.
//!
//! Every subsystem crate (orchestrator, store, submission, ...) defines its
//! own `thiserror` error enum at its seam, but each reports one of these
//! kinds so the controller binary can map any subsystem error to an HTTP
//! status and wire body without depending on the concrete enum it came from.

use std::fmt;

use http::StatusCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    Unauthenticated,
    NotFound,
    PayloadTooLarge,
    Conflict,
    TooManyJobs,
    OrchestratorUnavailable,
    Internal,
}

impl ErrorKind {
    pub fn status_code(self) -> StatusCode {
        match self {
            ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::TooManyJobs => StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::OrchestratorUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn wire_name(self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "invalid-input",
            ErrorKind::Unauthenticated => "unauthenticated",
            ErrorKind::NotFound => "not-found",
            ErrorKind::PayloadTooLarge => "payload-too-large",
            ErrorKind::Conflict => "conflict",
            ErrorKind::TooManyJobs => "too-many-jobs",
            ErrorKind::OrchestratorUnavailable => "orchestrator-unavailable",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_has_a_distinct_wire_name() {
        let kinds = [
            ErrorKind::InvalidInput,
            ErrorKind::Unauthenticated,
            ErrorKind::NotFound,
            ErrorKind::PayloadTooLarge,
            ErrorKind::Conflict,
            ErrorKind::TooManyJobs,
            ErrorKind::OrchestratorUnavailable,
            ErrorKind::Internal,
        ];
        let names: std::collections::HashSet<_> = kinds.iter().map(|k| k.wire_name()).collect();
        assert_eq!(names.len(), kinds.len());
    }

    #[test]
    fn status_codes_match_http_semantics() {
        assert_eq!(ErrorKind::InvalidInput.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorKind::TooManyJobs.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            ErrorKind::OrchestratorUnavailable.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
