use crate::{
    error::Result,
    models::{
        Coupon, CouponFilter, InsertOutcome, UsageLogCoupon, UsageLogEntry, UsageLogFilter,
        UsageLogUser, UsageStatus, User, UserCoupon,
    },
    services::store::CouponStore,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::collections::HashMap;
use tracing::debug;

type PairKey = (String, String);

/// Process-local store used when no database is configured.
///
/// Redemption records are sharded by (user, coupon); the shard entry lock is
/// held across the count and the push, which makes `insert_redemption`
/// atomic per pair.
#[derive(Default)]
pub struct MemoryStore {
    coupons: DashMap<String, Coupon>,
    users: DashMap<String, User>,
    redemptions: DashMap<PairKey, Vec<UserCoupon>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sample coupons in every state the mini app renders: running, starting
    /// today, upcoming, and ended.
    pub fn with_demo_data(now: DateTime<Utc>) -> Self {
        let store = Self::new();
        let day = Duration::days(1);

        let demo = [
            ("1", "10% off everything", "10% off all items in store, excluding accessories and sale items.", "/images/coupons/coupon-10off.jpg", now - day * 7, now + day * 30, true),
            ("2", "Second item half price", "Buy two or more and get 50% off the second item.", "/images/coupons/coupon-half.jpg", now - day * 3, now + day * 14, true),
            ("3", "3,000 yen off", "3,000 yen off purchases of 10,000 yen or more.", "/images/coupons/coupon-3000off.jpg", now, now + day * 21, true),
            ("4", "Free shipping", "Free shipping on online store orders.", "/images/coupons/coupon-shipping.jpg", now + day * 7, now + day * 37, true),
            ("5", "Members 20% off (ended)", "Friends-only 20% discount on all items.", "/images/coupons/coupon-member.jpg", now - day * 30, now - day, false),
        ];

        for (id, title, description, image, valid_from, valid_to, is_active) in demo {
            store.coupons.insert(
                id.to_string(),
                Coupon {
                    id: id.to_string(),
                    title: title.to_string(),
                    description: Some(description.to_string()),
                    image_url: Some(image.to_string()),
                    valid_from,
                    valid_to,
                    is_active,
                    usage_limit: 1,
                    created_at: valid_from.min(now),
                    updated_at: valid_from.min(now),
                },
            );
        }

        for (id, name, created_days_ago) in [
            ("U0000000000000001", "Test User 1", 30),
            ("U0000000000000002", "Test User 2", 14),
        ] {
            store.users.insert(
                id.to_string(),
                User {
                    id: id.to_string(),
                    display_name: Some(name.to_string()),
                    avatar_url: None,
                    created_at: now - day * created_days_ago,
                    last_login_at: now,
                },
            );
        }

        let past = UserCoupon::used("U0000000000000001", "5", now - day * 5);
        store
            .redemptions
            .insert((past.user_id.clone(), past.coupon_id.clone()), vec![past]);

        store
    }

    fn used_in(records: &[UserCoupon]) -> u32 {
        records
            .iter()
            .filter(|r| r.status == UsageStatus::Used)
            .count() as u32
    }

    fn join_entry(&self, record: UserCoupon) -> UsageLogEntry {
        let user = self.users.get(&record.user_id);
        let coupon = self.coupons.get(&record.coupon_id);

        UsageLogEntry {
            user: UsageLogUser {
                id: record.user_id.clone(),
                display_name: user.as_ref().and_then(|u| u.display_name.clone()),
                avatar_url: user.as_ref().and_then(|u| u.avatar_url.clone()),
            },
            coupon: UsageLogCoupon {
                id: record.coupon_id.clone(),
                title: coupon.map(|c| c.title.clone()).unwrap_or_default(),
            },
            id: record.id,
            used_at: record.used_at,
            status: record.status,
        }
    }
}

#[async_trait]
impl CouponStore for MemoryStore {
    async fn get_coupon(&self, id: &str) -> Result<Option<Coupon>> {
        Ok(self.coupons.get(id).map(|c| c.clone()))
    }

    async fn list_coupons(&self, filter: CouponFilter) -> Result<Vec<Coupon>> {
        let mut coupons: Vec<Coupon> = self
            .coupons
            .iter()
            .filter(|c| match filter {
                CouponFilter::All => true,
                CouponFilter::Redeemable(now) => c.is_redeemable_at(now),
            })
            .map(|c| c.clone())
            .collect();

        coupons.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(coupons)
    }

    async fn create_coupon(&self, coupon: Coupon) -> Result<Coupon> {
        debug!("Storing coupon {} in memory", coupon.id);
        self.coupons.insert(coupon.id.clone(), coupon.clone());
        Ok(coupon)
    }

    async fn update_coupon(&self, coupon: Coupon) -> Result<Option<Coupon>> {
        match self.coupons.get_mut(&coupon.id) {
            Some(mut stored) => {
                *stored = coupon.clone();
                Ok(Some(coupon))
            }
            None => Ok(None),
        }
    }

    async fn delete_coupon(&self, id: &str) -> Result<bool> {
        Ok(self.coupons.remove(id).is_some())
    }

    async fn count_used(&self, user_id: &str, coupon_id: &str) -> Result<u32> {
        let key = (user_id.to_string(), coupon_id.to_string());
        Ok(self
            .redemptions
            .get(&key)
            .map(|records| Self::used_in(&records))
            .unwrap_or(0))
    }

    async fn used_counts_for_user(&self, user_id: &str) -> Result<HashMap<String, u32>> {
        Ok(self
            .redemptions
            .iter()
            .filter(|entry| entry.key().0 == user_id)
            .map(|entry| (entry.key().1.clone(), Self::used_in(entry.value())))
            .collect())
    }

    async fn insert_redemption(&self, record: UserCoupon, usage_limit: u32) -> Result<InsertOutcome> {
        let key = (record.user_id.clone(), record.coupon_id.clone());
        let mut records = self.redemptions.entry(key).or_default();

        if usage_limit > 0 && Self::used_in(&records) >= usage_limit {
            return Ok(InsertOutcome::LimitReached);
        }

        records.push(record.clone());
        Ok(InsertOutcome::Inserted(record))
    }

    async fn get_user(&self, id: &str) -> Result<Option<User>> {
        Ok(self.users.get(id).map(|u| u.clone()))
    }

    async fn save_user(&self, user: User) -> Result<User> {
        self.users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn usage_logs(&self, filter: UsageLogFilter) -> Result<(Vec<UsageLogEntry>, usize)> {
        let mut matching: Vec<UserCoupon> = self
            .redemptions
            .iter()
            .flat_map(|entry| {
                entry
                    .value()
                    .iter()
                    .filter(|r| filter.matches(r))
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect();

        matching.sort_by(|a, b| b.used_at.cmp(&a.used_at).then_with(|| a.id.cmp(&b.id)));
        let total = matching.len();

        let page = matching
            .into_iter()
            .skip(filter.offset)
            .take(filter.limit)
            .map(|record| self.join_entry(record))
            .collect();

        Ok((page, total))
    }

    async fn count_redemptions(&self, since: Option<DateTime<Utc>>) -> Result<u64> {
        Ok(self
            .redemptions
            .iter()
            .map(|entry| {
                entry
                    .value()
                    .iter()
                    .filter(|r| r.status == UsageStatus::Used)
                    .filter(|r| match (since, r.used_at) {
                        (None, _) => true,
                        (Some(since), Some(used_at)) => used_at >= since,
                        (Some(_), None) => false,
                    })
                    .count() as u64
            })
            .sum())
    }
}
