use crate::error::{AppError, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const ADMIN_ROLE: &str = "admin";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    #[serde(default)]
    pub role: String,
}

/// Bearer token check for the admin API.
///
/// Without a secret every request is let through; the binary logs a
/// warning at startup when that happens.
#[derive(Clone)]
pub struct AdminAuth {
    secret: Option<String>,
}

impl AdminAuth {
    pub fn new(secret: Option<String>) -> Self {
        Self { secret }
    }

    pub fn is_enabled(&self) -> bool {
        self.secret.is_some()
    }

    /// Verifies an HS256 token and requires the admin role. `None` when the
    /// guard is disabled.
    pub fn verify(&self, token: &str) -> Result<Option<Claims>> {
        let Some(secret) = &self.secret else {
            return Ok(None);
        };

        let decoding_key = DecodingKey::from_secret(secret.as_bytes());
        let validation = Validation::new(Algorithm::HS256);

        let claims = match decode::<Claims>(token, &decoding_key, &validation) {
            Ok(data) => data.claims,
            Err(e) => {
                warn!("Admin token verification failed: {}", e);
                return Err(AppError::unauthorized("Invalid token"));
            }
        };

        if claims.role != ADMIN_ROLE {
            warn!("Token for {} lacks the admin role", claims.sub);
            return Err(AppError::unauthorized("Admin privileges required"));
        }

        debug!("Admin token verified for {}", claims.sub);
        Ok(Some(claims))
    }

    /// Signs an admin token valid for `ttl`. Used by operators' tooling and tests.
    pub fn issue(&self, subject: &str, ttl: Duration) -> Result<String> {
        let secret = self
            .secret
            .as_ref()
            .ok_or_else(|| AppError::internal("Admin token secret is not configured"))?;

        let claims = Claims {
            sub: subject.to_string(),
            exp: (Utc::now() + ttl).timestamp(),
            role: ADMIN_ROLE.to_string(),
        };

        Ok(encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )?)
    }
}
