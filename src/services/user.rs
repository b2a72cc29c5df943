use crate::{
    error::Result,
    models::{RegisterUserRequest, Registration, User},
    services::store::CouponStore,
    utils::validation::{require_id, validate_payload},
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};

/// Mini app users, keyed by their LINE user id.
#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn CouponStore>,
}

impl UserService {
    pub fn new(store: Arc<dyn CouponStore>) -> Self {
        Self { store }
    }

    /// Called on every mini app login. Creates the user on first sight,
    /// otherwise refreshes the profile fields that were sent along with
    /// `last_login_at`.
    pub async fn register(&self, request: RegisterUserRequest, now: DateTime<Utc>) -> Result<Registration> {
        validate_payload(&request)?;
        let user_id = require_id(&request.line_user_id, "lineUserId")?.to_string();

        match self.store.get_user(&user_id).await? {
            Some(existing) => {
                debug!("Returning user {} logged in", user_id);
                let user = User {
                    display_name: request.display_name.or(existing.display_name),
                    avatar_url: request.avatar_url.or(existing.avatar_url),
                    last_login_at: now,
                    ..existing
                };
                let user = self.store.save_user(user).await?;
                Ok(Registration { user, is_new_user: false })
            }
            None => {
                let user = User {
                    id: user_id,
                    display_name: request.display_name,
                    avatar_url: request.avatar_url,
                    created_at: now,
                    last_login_at: now,
                };
                let user = self.store.save_user(user).await?;
                info!("Registered new user {}", user.id);
                Ok(Registration { user, is_new_user: true })
            }
        }
    }
}
