use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::utils::serde_helpers::double_option;

pub const TITLE_MAX_CHARS: usize = 50;
pub const DESCRIPTION_MAX_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    pub is_active: bool,
    /// Redemptions allowed per user; 0 means unlimited.
    pub usage_limit: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Coupon {
    pub fn from_draft(draft: CreateCouponRequest, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: draft.title,
            description: draft.description,
            image_url: draft.image_url,
            valid_from: draft.valid_from,
            valid_to: draft.valid_to,
            is_active: draft.is_active,
            usage_limit: draft.usage_limit,
            created_at: now,
            updated_at: now,
        }
    }

    /// Closed interval: both `valid_from` and `valid_to` are inside the window.
    pub fn is_within_period(&self, now: DateTime<Utc>) -> bool {
        self.valid_from <= now && now <= self.valid_to
    }

    pub fn is_unlimited(&self) -> bool {
        self.usage_limit == 0
    }

    pub fn limit_reached(&self, used_count: u32) -> bool {
        !self.is_unlimited() && used_count >= self.usage_limit
    }

    /// Active and inside the validity window; what the mini app lists.
    pub fn is_redeemable_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.is_within_period(now)
    }
}

/// Outcome of the eligibility rules for one user, coupon and instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Eligibility {
    pub is_used: bool,
    pub is_within_period: bool,
    pub can_use: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStatus {
    pub is_used: bool,
    pub used_count: u32,
    pub can_use: bool,
}

impl UserStatus {
    pub fn from_eligibility(eligibility: Eligibility, used_count: u32) -> Self {
        Self {
            is_used: eligibility.is_used,
            used_count,
            can_use: eligibility.can_use,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponWithUserStatus {
    #[serde(flatten)]
    pub coupon: Coupon,
    pub user_status: UserStatus,
}

/// Payload for creating a coupon. Updates are merged onto the stored coupon
/// and re-checked through this same type.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_validity_window"))]
pub struct CreateCouponRequest {
    #[validate(custom = "validate_title")]
    pub title: String,
    #[validate(length(max = 200, message = "Description must be at most 200 characters"))]
    #[serde(default)]
    pub description: Option<String>,
    #[validate(length(max = 2048, message = "Image URL is too long"))]
    #[serde(default)]
    pub image_url: Option<String>,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    pub usage_limit: u32,
    pub is_active: bool,
}

fn validate_title(title: &str) -> Result<(), ValidationError> {
    let chars = title.chars().count();
    if chars == 0 {
        let mut err = ValidationError::new("required");
        err.message = Some("Title is required".into());
        return Err(err);
    }
    if chars > TITLE_MAX_CHARS {
        let mut err = ValidationError::new("length");
        err.message = Some("Title must be at most 50 characters".into());
        return Err(err);
    }
    Ok(())
}

fn validate_validity_window(req: &CreateCouponRequest) -> Result<(), ValidationError> {
    if req.valid_from >= req.valid_to {
        let mut err = ValidationError::new("validity_window");
        err.message = Some("The end of the validity period must be after its start".into());
        return Err(err);
    }
    Ok(())
}

/// Partial update. `description` and `imageUrl` distinguish "absent" from
/// an explicit `null`, which clears the stored value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCouponRequest {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option::deserialize")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option::deserialize")]
    pub image_url: Option<Option<String>>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
    pub usage_limit: Option<u32>,
    pub is_active: Option<bool>,
}

impl UpdateCouponRequest {
    pub fn merge_onto(&self, coupon: &Coupon) -> CreateCouponRequest {
        CreateCouponRequest {
            title: self.title.clone().unwrap_or_else(|| coupon.title.clone()),
            description: self
                .description
                .clone()
                .unwrap_or_else(|| coupon.description.clone()),
            image_url: self
                .image_url
                .clone()
                .unwrap_or_else(|| coupon.image_url.clone()),
            valid_from: self.valid_from.unwrap_or(coupon.valid_from),
            valid_to: self.valid_to.unwrap_or(coupon.valid_to),
            usage_limit: self.usage_limit.unwrap_or(coupon.usage_limit),
            is_active: self.is_active.unwrap_or(coupon.is_active),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponListQuery {
    pub user_id: Option<String>,
    #[serde(default)]
    pub include_used: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponDetailQuery {
    pub user_id: Option<String>,
}

/// Store-level filter for coupon listings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CouponFilter {
    All,
    /// Active and inside the validity window at the given instant.
    Redeemable(DateTime<Utc>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn draft() -> CreateCouponRequest {
        let now = Utc::now();
        CreateCouponRequest {
            title: "10% off everything".to_string(),
            description: None,
            image_url: None,
            valid_from: now,
            valid_to: now + Duration::days(7),
            usage_limit: 1,
            is_active: true,
        }
    }

    #[test]
    fn test_valid_draft() {
        assert!(draft().validate().is_ok());
    }

    #[test]
    fn test_title_counts_characters_not_bytes() {
        let mut req = draft();
        req.title = "割".repeat(50);
        assert!(req.validate().is_ok());
        req.title = "割".repeat(51);
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_empty_title_rejected() {
        let mut req = draft();
        req.title = String::new();
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("title"));
    }

    #[test]
    fn test_description_limit() {
        let mut req = draft();
        req.description = Some("a".repeat(201));
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_window_must_be_strictly_ordered() {
        let mut req = draft();
        req.valid_to = req.valid_from;
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_update_merge_keeps_unset_fields() {
        let coupon = Coupon::from_draft(draft(), Utc::now());
        let update: UpdateCouponRequest =
            serde_json::from_str(r#"{"title":"Free shipping","description":null}"#).unwrap();

        let merged = update.merge_onto(&coupon);
        assert_eq!(merged.title, "Free shipping");
        assert_eq!(merged.description, None);
        assert_eq!(merged.valid_to, coupon.valid_to);
        assert_eq!(merged.usage_limit, coupon.usage_limit);
    }

    #[test]
    fn test_negative_usage_limit_does_not_parse() {
        let body = r#"{"title":"x","validFrom":"2026-01-01T00:00:00Z","validTo":"2026-02-01T00:00:00Z","usageLimit":-1,"isActive":true}"#;
        assert!(serde_json::from_str::<CreateCouponRequest>(body).is_err());
    }

    #[test]
    fn test_coupon_serializes_camel_case() {
        let coupon = Coupon::from_draft(draft(), Utc::now());
        let value = serde_json::to_value(&coupon).unwrap();
        assert!(value.get("validFrom").is_some());
        assert!(value.get("usageLimit").is_some());
        assert!(value.get("imageUrl").is_some());
    }
}
