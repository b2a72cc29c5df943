use crate::error::{AppError, Result};
use validator::Validate;

/// Runs derive-based validation and converts failures into `INVALID_INPUT`.
pub fn validate_payload<T: Validate>(payload: &T) -> Result<()> {
    payload.validate().map_err(AppError::ValidatorError)
}

/// Rejects blank identifiers taken from paths, query strings or bodies.
pub fn require_id<'a>(value: &'a str, field: &str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidInput(format!("{} is required", field)));
    }
    Ok(trimmed)
}

/// Same as `require_id` for optional query parameters.
pub fn require_optional_id<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str> {
    require_id(value.unwrap_or_default(), field)
}
