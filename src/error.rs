use crate::database::DatabaseError;
use crate::usage::tier::Tier;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(config::ConfigError),
    Jwt(jsonwebtoken::errors::Error),
    Database(DatabaseError),
    /// Completion provider failed (transport error or non-2xx status)
    Provider(String),
    /// Usage gate rejected the call
    QuotaExceeded { tier: Tier, daily_limit: i32 },
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "Configuration error: {}", err),
            AppError::Jwt(err) => write!(f, "JWT error: {}", err),
            AppError::Database(err) => write!(f, "Database error: {}", err),
            AppError::Provider(msg) => write!(f, "Completion provider error: {}", msg),
            AppError::QuotaExceeded { tier, daily_limit } => write!(
                f,
                "Daily limit of {} queries reached for the {} tier",
                daily_limit, tier
            ),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err)
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        AppError::Jwt(err)
    }
}

impl From<DatabaseError> for AppError {
    fn from(err: DatabaseError) -> Self {
        AppError::Database(err)
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Provider(err.to_string())
    }
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Jwt(_) => StatusCode::UNAUTHORIZED,
            AppError::Database(DatabaseError::NotFound) => StatusCode::NOT_FOUND,
            AppError::Database(DatabaseError::Constraint(_)) => StatusCode::CONFLICT,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            // Provider failures are reported as internal errors and never retried
            AppError::Provider(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::QuotaExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn category(&self) -> &'static str {
        match self {
            AppError::Config(_) => "Configuration error",
            AppError::Jwt(_) | AppError::Unauthorized(_) => "Authentication failed",
            AppError::Database(DatabaseError::NotFound) | AppError::NotFound(_) => "Not found",
            AppError::Database(DatabaseError::Constraint(_)) | AppError::Conflict(_) => {
                "Conflict"
            }
            AppError::Database(_) | AppError::Provider(_) | AppError::Internal(_) => {
                "Internal server error"
            }
            AppError::QuotaExceeded { .. } => "Quota exceeded",
            AppError::BadRequest(_) => "Bad request",
            AppError::Forbidden(_) => "Forbidden",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let body = Json(json!({
            "error": self.category(),
            "message": self.to_string()
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use jsonwebtoken::errors::{Error as JwtError, ErrorKind};

    #[test]
    fn test_app_error_display() {
        let config_err = AppError::Config(config::ConfigError::NotFound("test".to_string()));
        assert!(config_err.to_string().contains("Configuration error"));

        let jwt_err = AppError::Jwt(JwtError::from(ErrorKind::InvalidToken));
        assert!(jwt_err.to_string().contains("JWT error"));

        let quota = AppError::QuotaExceeded {
            tier: Tier::Free,
            daily_limit: 10,
        };
        assert_eq!(
            quota.to_string(),
            "Daily limit of 10 queries reached for the free tier"
        );
    }

    #[test]
    fn test_status_codes() {
        let cases = [
            (
                AppError::QuotaExceeded {
                    tier: Tier::Free,
                    daily_limit: 10,
                },
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (
                AppError::Provider("HTTP 502".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (AppError::NotFound("x".to_string()), StatusCode::NOT_FOUND),
            (
                AppError::Database(DatabaseError::NotFound),
                StatusCode::NOT_FOUND,
            ),
            (AppError::Conflict("x".to_string()), StatusCode::CONFLICT),
            (
                AppError::Unauthorized("x".to_string()),
                StatusCode::UNAUTHORIZED,
            ),
            (AppError::BadRequest("x".to_string()), StatusCode::BAD_REQUEST),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[tokio::test]
    async fn test_error_response_body_format() {
        let response = AppError::NotFound("profile not found".to_string()).into_response();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(json["error"], "Not found");
        assert_eq!(json["message"], "Not found: profile not found");
    }
}
