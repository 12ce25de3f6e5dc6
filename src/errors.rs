//! REST error surface
//!
//! Every layer error (model, path, parser, SQL) converts into a `RestError`
//! at the dispatch boundary. The variant decides the HTTP status; the
//! precondition pair additionally carries the ETag and Vary headers that
//! RFC 7232 requires on 304/412 responses.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum RestError {
    #[error("Bad syntax: {0}")]
    BadSyntax(String),
    #[error("Bad data: {0}")]
    BadData(String),
    #[error("{0}")]
    ConflictModel(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Precondition failed")]
    PreconditionFailed { etag: String, vary: String },
    #[error("Not modified")]
    NotModified { etag: String, vary: String },
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl RestError {
    pub fn status(&self) -> StatusCode {
        match self {
            RestError::BadSyntax(_) | RestError::BadData(_) => StatusCode::BAD_REQUEST,
            RestError::ConflictModel(_) | RestError::Conflict(_) => StatusCode::CONFLICT,
            RestError::Forbidden(_) => StatusCode::FORBIDDEN,
            RestError::NotFound(_) => StatusCode::NOT_FOUND,
            RestError::PreconditionFailed { .. } => StatusCode::PRECONDITION_FAILED,
            RestError::NotModified { .. } => StatusCode::NOT_MODIFIED,
            RestError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Whether the transaction envelope may retry the request body after
    /// observing this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RestError::ServiceUnavailable(_))
    }
}

impl IntoResponse for RestError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            RestError::NotModified { etag, vary } | RestError::PreconditionFailed { etag, vary } => {
                let mut response = status.into_response();
                if let Ok(v) = HeaderValue::from_str(&etag) {
                    response.headers_mut().insert(header::ETAG, v);
                }
                if let Ok(v) = HeaderValue::from_str(&vary) {
                    response.headers_mut().insert(header::VARY, v);
                }
                response
            }
            other => {
                let body = serde_json::json!({ "error": other.to_string() });
                (status, axum::Json(body)).into_response()
            }
        }
    }
}

/// Classify a driver error into the REST surface.
///
/// Connection-level failures are retryable 503s; constraint violations are
/// conflicts; privilege failures surface the policy contract as 403.
impl From<tokio_postgres::Error> for RestError {
    fn from(err: tokio_postgres::Error) -> Self {
        if err.is_closed() {
            return RestError::ServiceUnavailable("database connection lost, please try again".into());
        }
        if let Some(state) = err.code() {
            let code = state.code();
            if code.starts_with("08") || code.starts_with("57") {
                return RestError::ServiceUnavailable(format!("database unavailable: {}", err));
            }
            if code.starts_with("23") {
                return RestError::Conflict(format!("input data violates model constraints: {}", err));
            }
            if code == "42501" {
                return RestError::Forbidden(format!("policy predicate denied access: {}", err));
            }
        }
        match err.as_db_error() {
            Some(db) => RestError::Conflict(db.message().to_string()),
            None => RestError::ServiceUnavailable(format!("database error: {}", err)),
        }
    }
}

impl From<deadpool_postgres::PoolError> for RestError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        RestError::ServiceUnavailable(format!("connection pool exhausted or unreachable: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(RestError::BadSyntax("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(RestError::ConflictModel("x".into()).status(), StatusCode::CONFLICT);
        assert_eq!(
            RestError::NotModified { etag: "\"a\"".into(), vary: "accept".into() }.status(),
            StatusCode::NOT_MODIFIED
        );
        assert_eq!(RestError::ServiceUnavailable("x".into()).status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_retryable() {
        assert!(RestError::ServiceUnavailable("x".into()).is_retryable());
        assert!(!RestError::Conflict("x".into()).is_retryable());
    }
}
