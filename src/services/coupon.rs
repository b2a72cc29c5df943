use crate::{
    error::{AppError, Result},
    models::{
        Coupon, CouponFilter, CouponWithUserStatus, CreateCouponRequest, DashboardStats,
        UpdateCouponRequest, UserStatus,
    },
    services::{eligibility, store::CouponStore},
    utils::validation::{require_id, validate_payload},
};
use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Coupon reads for the mini app and coupon management for the admin console.
#[derive(Clone)]
pub struct CouponService {
    store: Arc<dyn CouponStore>,
}

impl CouponService {
    pub fn new(store: Arc<dyn CouponStore>) -> Self {
        Self { store }
    }

    /// Redeemable coupons with the user's status attached. Coupons the user
    /// has exhausted are left out unless `include_used` is set.
    pub async fn list_for_user(
        &self,
        user_id: &str,
        include_used: bool,
        now: DateTime<Utc>,
    ) -> Result<Vec<CouponWithUserStatus>> {
        let user_id = require_id(user_id, "userId")?;
        debug!("Listing coupons for user {}", user_id);

        let coupons = self.store.list_coupons(CouponFilter::Redeemable(now)).await?;
        let counts = self.store.used_counts_for_user(user_id).await?;

        let listed = coupons
            .into_iter()
            .map(|coupon| {
                let used_count = counts.get(&coupon.id).copied().unwrap_or(0);
                let status = UserStatus::from_eligibility(
                    eligibility::evaluate(&coupon, now, used_count),
                    used_count,
                );
                CouponWithUserStatus { coupon, user_status: status }
            })
            .filter(|c| include_used || !c.user_status.is_used)
            .collect();

        Ok(listed)
    }

    pub async fn detail_for_user(
        &self,
        coupon_id: &str,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<CouponWithUserStatus> {
        let coupon_id = require_id(coupon_id, "couponId")?;
        let user_id = require_id(user_id, "userId")?;

        let coupon = self
            .store
            .get_coupon(coupon_id)
            .await?
            .filter(|c| c.is_active)
            .ok_or_else(|| AppError::not_found("The coupon could not be found"))?;

        let used_count = self.store.count_used(user_id, coupon_id).await?;
        let status = UserStatus::from_eligibility(
            eligibility::evaluate(&coupon, now, used_count),
            used_count,
        );

        Ok(CouponWithUserStatus { coupon, user_status: status })
    }

    pub async fn list_all(&self) -> Result<Vec<Coupon>> {
        self.store.list_coupons(CouponFilter::All).await
    }

    pub async fn get(&self, coupon_id: &str) -> Result<Coupon> {
        let coupon_id = require_id(coupon_id, "couponId")?;
        self.store
            .get_coupon(coupon_id)
            .await?
            .ok_or_else(|| AppError::not_found("The coupon could not be found"))
    }

    pub async fn create(&self, request: CreateCouponRequest, now: DateTime<Utc>) -> Result<Coupon> {
        validate_payload(&request)?;

        let coupon = self.store.create_coupon(Coupon::from_draft(request, now)).await?;
        info!("Created coupon {} ({})", coupon.id, coupon.title);
        Ok(coupon)
    }

    /// Applies the present fields onto the stored coupon and re-validates the
    /// result as a whole, so a lone `validTo` is still checked against the
    /// stored `validFrom`.
    pub async fn update(
        &self,
        coupon_id: &str,
        request: UpdateCouponRequest,
        now: DateTime<Utc>,
    ) -> Result<Coupon> {
        let existing = self.get(coupon_id).await?;

        let merged = request.merge_onto(&existing);
        validate_payload(&merged)?;

        let updated = Coupon {
            id: existing.id.clone(),
            created_at: existing.created_at,
            updated_at: now,
            ..Coupon::from_draft(merged, now)
        };

        let coupon = self
            .store
            .update_coupon(updated)
            .await?
            .ok_or_else(|| AppError::not_found("The coupon could not be found"))?;

        info!("Updated coupon {}", coupon.id);
        Ok(coupon)
    }

    pub async fn delete(&self, coupon_id: &str) -> Result<()> {
        let coupon_id = require_id(coupon_id, "couponId")?;

        if !self.store.delete_coupon(coupon_id).await? {
            warn!("Delete requested for unknown coupon {}", coupon_id);
            return Err(AppError::not_found("The coupon could not be found"));
        }

        info!("Deleted coupon {}", coupon_id);
        Ok(())
    }

    /// Dashboard counters. "Today" starts at local midnight for the given
    /// UTC offset.
    pub async fn stats(&self, now: DateTime<Utc>, utc_offset_hours: i32) -> Result<DashboardStats> {
        let active_coupons = self
            .store
            .list_coupons(CouponFilter::Redeemable(now))
            .await?
            .len();
        let today_usage = self
            .store
            .count_redemptions(Some(start_of_local_day(now, utc_offset_hours)?))
            .await?;
        let total_usage = self.store.count_redemptions(None).await?;

        Ok(DashboardStats {
            active_coupons,
            today_usage,
            total_usage,
        })
    }
}

fn start_of_local_day(now: DateTime<Utc>, utc_offset_hours: i32) -> Result<DateTime<Utc>> {
    let offset = FixedOffset::east_opt(utc_offset_hours * 3600)
        .ok_or_else(|| AppError::internal("UTC offset out of range"))?;

    let local_midnight = now
        .with_timezone(&offset)
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| AppError::internal("Invalid local midnight"))?;

    match offset.from_local_datetime(&local_midnight).single() {
        Some(start) => Ok(start.with_timezone(&Utc)),
        None => Ok(now - Duration::hours(24)),
    }
}
