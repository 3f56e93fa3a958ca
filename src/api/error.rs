//! Unified API error handling.
//!
//! Every failure leaves the API as `{"error": "..."}` with an HTTP status.
//! Validation failures additionally carry `details`, one `{path, message}` per
//! offending field. Server-side failures are logged in full and reach the
//! client only as a generic message.

use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::auth::AuthError;

pub const VALIDATION_MESSAGE: &str = "Invalid request";
pub const INTERNAL_MESSAGE: &str = "Internal server error";

/// One field-level validation failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub path: String,
    pub message: String,
}

/// The error response envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldError>>,
}

/// Unified API error type
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    /// Human-readable error message
    message: String,
    details: Option<Vec<FieldError>>,
    /// Seconds a rate-limited client should wait
    retry_after: Option<u64>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details: None,
            retry_after: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn details(&self) -> Option<&[FieldError]> {
        self.details.as_deref()
    }

    // -------------------------------------------------------------------------
    // Convenience constructors for common error types
    // -------------------------------------------------------------------------

    /// Bad request error (400)
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// Unauthorized error (401). The cause is never shown to the client.
    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Unauthorized")
    }

    /// Not found error (404)
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// Conflict error (409)
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    /// Validation error (400) with field-level details
    pub fn validation(details: Vec<FieldError>) -> Self {
        Self {
            details: Some(details),
            ..Self::bad_request(VALIDATION_MESSAGE)
        }
    }

    /// Single field validation error
    pub fn validation_field(path: &str, message: impl Into<String>) -> Self {
        Self::validation(vec![FieldError {
            path: path.to_string(),
            message: message.into(),
        }])
    }

    /// Internal server error (500). The message is logged, not returned.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// Too many requests error (429)
    pub fn rate_limited(retry_after: u64) -> Self {
        Self {
            retry_after: Some(retry_after),
            ..Self::new(
                StatusCode::TOO_MANY_REQUESTS,
                format!("Rate limit exceeded. Try again in {} seconds.", retry_after),
            )
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = if self.status.is_server_error() {
            tracing::error!(status = %self.status, "{}", self.message);
            INTERNAL_MESSAGE.to_string()
        } else {
            self.message
        };

        let body = ErrorResponse {
            error: message,
            details: self.details,
        };

        let mut response = (self.status, Json(body)).into_response();
        if let Some(secs) = self.retry_after {
            response
                .headers_mut()
                .insert("Retry-After", HeaderValue::from(secs));
        }
        response
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.status.as_u16(), self.message)
    }
}

impl std::error::Error for ApiError {}

// -------------------------------------------------------------------------
// Conversion implementations for common error types
// -------------------------------------------------------------------------

/// True when the error is a UNIQUE constraint violation.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.message().contains("UNIQUE constraint failed"))
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => ApiError::not_found("Not found"),
            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();
                if msg.contains("UNIQUE constraint failed") {
                    ApiError::conflict("A resource with this identifier already exists")
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    ApiError::bad_request("Referenced resource does not exist")
                } else {
                    ApiError::internal(format!("Database error: {}", err))
                }
            }
            _ => ApiError::internal(format!("Database error: {}", err)),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidToken(e) => {
                tracing::debug!(error = %e, "Rejected bearer token");
                ApiError::unauthorized()
            }
            other => ApiError::internal(other.to_string()),
        }
    }
}

// -------------------------------------------------------------------------
// Builder for validation errors
// -------------------------------------------------------------------------

/// Collects field errors in the order they are found
#[derive(Debug, Default)]
pub struct ValidationErrorBuilder {
    errors: Vec<FieldError>,
}

impl ValidationErrorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, path: impl Into<String>, message: impl Into<String>) -> &mut Self {
        self.errors.push(FieldError {
            path: path.into(),
            message: message.into(),
        });
        self
    }

    /// Record the error of a field check and pass its value through.
    pub fn check<T>(&mut self, path: &str, result: Result<T, String>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(message) => {
                self.add(path, message);
                None
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn build(self) -> Option<ApiError> {
        if self.errors.is_empty() {
            None
        } else {
            Some(ApiError::validation(self.errors))
        }
    }

    /// The collected errors as a validation error, even when empty
    pub fn into_error(self) -> ApiError {
        ApiError::validation(self.errors)
    }

    /// Return Ok(()) if no errors, or Err(ApiError) if there are errors
    pub fn finish(self) -> Result<(), ApiError> {
        match self.build() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_client_error_keeps_message() {
        let (status, json) = body_json(ApiError::not_found("Not found")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json, serde_json::json!({"error": "Not found"}));
    }

    #[tokio::test]
    async fn test_server_error_hides_detail() {
        let (status, json) = body_json(ApiError::internal("disk on fire at /var/db")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], INTERNAL_MESSAGE);
    }

    #[tokio::test]
    async fn test_validation_details_shape() {
        let (status, json) = body_json(ApiError::validation_field("preset", "Invalid preset")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], VALIDATION_MESSAGE);
        assert_eq!(json["details"][0]["path"], "preset");
        assert_eq!(json["details"][0]["message"], "Invalid preset");
    }

    #[test]
    fn test_rate_limited_sets_retry_after() {
        let response = ApiError::rate_limited(42).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["Retry-After"], "42");
    }

    #[test]
    fn test_validation_error_builder() {
        let mut builder = ValidationErrorBuilder::new();
        assert!(builder.check::<i64>("preset", Ok(8)).is_some());
        builder.add("email", "Invalid email");
        assert!(builder.check::<i64>("password", Err("Too short".into())).is_none());

        assert!(!builder.is_empty());
        let err = builder.build().unwrap();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let details = err.details().unwrap();
        assert_eq!(details.len(), 2);
        assert_eq!(details[0].path, "email");
        assert_eq!(details[1].path, "password");
    }

    #[test]
    fn test_empty_builder_finishes_ok() {
        assert!(ValidationErrorBuilder::new().finish().is_ok());
    }

    #[test]
    fn test_row_not_found_maps_to_404() {
        let err = ApiError::from(sqlx::Error::RowNotFound);
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_invalid_token_maps_to_401() {
        let manager = crate::auth::TokenManager::new("k", 60);
        let err = ApiError::from(manager.verify("junk").unwrap_err());
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.message(), "Unauthorized");
    }
}
