use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageStatus {
    Used,
    Unused,
}

/// One redemption of a coupon by a user. Never updated once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCoupon {
    pub id: String,
    pub user_id: String,
    pub coupon_id: String,
    pub used_at: Option<DateTime<Utc>>,
    pub status: UsageStatus,
    pub created_at: DateTime<Utc>,
}

impl UserCoupon {
    pub fn used(user_id: &str, coupon_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            coupon_id: coupon_id.to_string(),
            used_at: Some(now),
            status: UsageStatus::Used,
            created_at: now,
        }
    }
}

/// The `userCoupon` object returned by a successful redemption.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCouponView {
    pub id: String,
    pub user_id: String,
    pub coupon_id: String,
    pub used_at: Option<DateTime<Utc>>,
    pub status: UsageStatus,
}

impl From<UserCoupon> for UserCouponView {
    fn from(record: UserCoupon) -> Self {
        Self {
            id: record.id,
            user_id: record.user_id,
            coupon_id: record.coupon_id,
            used_at: record.used_at,
            status: record.status,
        }
    }
}

/// Result of the store's conditional insert.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    Inserted(UserCoupon),
    /// The (user, coupon) pair already holds `usage_limit` used records, or a
    /// concurrent attempt claimed the same slot.
    LimitReached,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RedeemCouponRequest {
    #[validate(length(min = 1, message = "User ID is required"))]
    pub user_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageLogQuery {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub coupon_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// Normalized usage log filter handed to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageLogFilter {
    pub limit: usize,
    pub offset: usize,
    pub coupon_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl UsageLogFilter {
    pub fn matches(&self, record: &UserCoupon) -> bool {
        if record.status != UsageStatus::Used {
            return false;
        }
        if let Some(coupon_id) = &self.coupon_id {
            if &record.coupon_id != coupon_id {
                return false;
            }
        }
        match record.used_at {
            Some(used_at) => {
                self.from.map_or(true, |from| used_at >= from)
                    && self.to.map_or(true, |to| used_at <= to)
            }
            None => self.from.is_none() && self.to.is_none(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageLogUser {
    pub id: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageLogCoupon {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageLogEntry {
    pub id: String,
    pub user: UsageLogUser,
    pub coupon: UsageLogCoupon,
    pub used_at: Option<DateTime<Utc>>,
    pub status: UsageStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageLogPage {
    pub logs: Vec<UsageLogEntry>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}
