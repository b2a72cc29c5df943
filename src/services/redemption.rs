use crate::{
    error::{AppError, Result},
    models::{InsertOutcome, UserCoupon},
    services::store::CouponStore,
    utils::validation::require_id,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const MSG_NOT_FOUND: &str = "The coupon could not be found";
pub const MSG_UNAVAILABLE: &str = "This coupon is currently unavailable";
pub const MSG_EXPIRED: &str = "This coupon is outside its validity period";
pub const MSG_ALREADY_USED: &str = "This coupon has already been used";
pub const MSG_REDEEMED: &str = "The coupon has been used";

/// Runs redemption attempts against the record store.
#[derive(Clone)]
pub struct RedemptionService {
    store: Arc<dyn CouponStore>,
}

impl RedemptionService {
    pub fn new(store: Arc<dyn CouponStore>) -> Self {
        Self { store }
    }

    pub async fn attempt_redeem(&self, coupon_id: &str, user_id: &str) -> Result<UserCoupon> {
        self.attempt_redeem_at(coupon_id, user_id, Utc::now()).await
    }

    /// Checks run in a fixed order and the first failure wins: missing
    /// coupon, validity window, active flag, usage limit. Failed attempts
    /// write nothing.
    pub async fn attempt_redeem_at(
        &self,
        coupon_id: &str,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<UserCoupon> {
        let coupon_id = require_id(coupon_id, "couponId")?;
        let user_id = require_id(user_id, "userId")?;
        debug!("Redemption attempt for coupon {} by user {}", coupon_id, user_id);

        let coupon = self
            .store
            .get_coupon(coupon_id)
            .await?
            .ok_or_else(|| AppError::not_found(MSG_NOT_FOUND))?;

        // Not-yet-started coupons also report EXPIRED.
        if !coupon.is_within_period(now) {
            debug!("Coupon {} is outside its validity window", coupon_id);
            return Err(AppError::Expired(MSG_EXPIRED.to_string()));
        }

        if !coupon.is_active {
            debug!("Coupon {} is deactivated", coupon_id);
            return Err(AppError::not_found(MSG_UNAVAILABLE));
        }

        let prior_used = self.store.count_used(user_id, coupon_id).await?;
        if coupon.limit_reached(prior_used) {
            debug!(
                "User {} exhausted coupon {} ({} of {})",
                user_id, coupon_id, prior_used, coupon.usage_limit
            );
            return Err(AppError::AlreadyUsed(MSG_ALREADY_USED.to_string()));
        }

        let record = UserCoupon::used(user_id, coupon_id, now);
        match self.store.insert_redemption(record, coupon.usage_limit).await? {
            InsertOutcome::Inserted(record) => {
                info!("User {} redeemed coupon {} ({})", user_id, coupon_id, record.id);
                Ok(record)
            }
            InsertOutcome::LimitReached => {
                warn!(
                    "Concurrent redemption for user {} coupon {} lost the race",
                    user_id, coupon_id
                );
                Err(AppError::AlreadyUsed(MSG_ALREADY_USED.to_string()))
            }
        }
    }
}
