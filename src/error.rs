use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use validator::ValidationErrors;

pub type Result<T> = std::result::Result<T, AppError>;

/// Field order used when picking the message reported for a failed validation.
/// `__all__` holds struct-level rules such as the validity window check.
const VALIDATION_FIELD_ORDER: &[&str] = &[
    "title",
    "description",
    "image_url",
    "valid_from",
    "valid_to",
    "usage_limit",
    "is_active",
    "line_user_id",
    "display_name",
    "avatar_url",
    "user_id",
    "__all__",
];

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] surrealdb::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Expired: {0}")]
    Expired(String),

    #[error("Already used: {0}")]
    AlreadyUsed(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Validation error: {0}")]
    ValidatorError(#[from] ValidationErrors),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Machine-readable code carried in the `error` field of failure responses.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Expired(_) => "EXPIRED",
            AppError::AlreadyUsed(_) => "ALREADY_USED",
            AppError::InvalidInput(_) | AppError::ValidatorError(_) => "INVALID_INPUT",
            AppError::Authentication(_) | AppError::Jwt(_) => "UNAUTHORIZED",
            AppError::RateLimitExceeded => "RATE_LIMITED",
            AppError::Database(_) | AppError::Internal(_) => {
                "SERVER_ERROR"
            }
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Expired(_)
            | AppError::AlreadyUsed(_)
            | AppError::InvalidInput(_)
            | AppError::ValidatorError(_) => StatusCode::BAD_REQUEST,
            AppError::Authentication(_) | AppError::Jwt(_) => StatusCode::UNAUTHORIZED,
            AppError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            AppError::Database(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Human-readable message safe to hand to the caller. Store and internal
    /// failures are logged here and replaced by a generic text.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                "A server error occurred".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "A server error occurred".to_string()
            }
            AppError::Jwt(e) => {
                tracing::debug!("JWT error: {}", e);
                "Invalid token".to_string()
            }
            AppError::ValidatorError(e) => first_violation_message(e),
            AppError::RateLimitExceeded => "Too many requests, please try again later".to_string(),
            AppError::NotFound(msg)
            | AppError::Expired(msg)
            | AppError::AlreadyUsed(msg)
            | AppError::InvalidInput(msg)
            | AppError::Authentication(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({
            "success": false,
            "error": self.code(),
            "message": self.public_message(),
        }));

        (status, body).into_response()
    }
}

/// Picks the message of the first violated field, walking fields in
/// declaration order so the reported message is stable.
pub fn first_violation_message(errors: &ValidationErrors) -> String {
    let field_errors = errors.field_errors();

    let ordered = VALIDATION_FIELD_ORDER
        .iter()
        .filter_map(|field| field_errors.get(field))
        .chain(field_errors.values());

    for errs in ordered {
        if let Some(err) = errs.first() {
            return err
                .message
                .as_ref()
                .map(|m| m.to_string())
                .unwrap_or_else(|| format!("Invalid value ({})", err.code));
        }
    }

    "The request contains invalid input".to_string()
}

impl AppError {
    pub fn not_found(msg: &str) -> Self {
        Self::NotFound(msg.to_string())
    }

    pub fn invalid_input(msg: &str) -> Self {
        Self::InvalidInput(msg.to_string())
    }

    pub fn unauthorized(msg: &str) -> Self {
        Self::Authentication(msg.to_string())
    }

    pub fn internal(msg: &str) -> Self {
        Self::Internal(msg.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}
