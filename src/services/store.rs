use crate::{
    config::{Config, StoreBackend},
    error::Result,
    models::{
        Coupon, CouponFilter, InsertOutcome, UsageLogEntry, UsageLogFilter, User, UserCoupon,
    },
    services::{database::Database, memory::MemoryStore},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Record storage for coupons, users and redemption records.
///
/// Implementations must make `insert_redemption` atomic with respect to other
/// inserts for the same (user, coupon) pair; the redemption handler relies on
/// it to hold the usage limit under concurrent attempts.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CouponStore: Send + Sync {
    async fn get_coupon(&self, id: &str) -> Result<Option<Coupon>>;

    /// Newest first.
    async fn list_coupons(&self, filter: CouponFilter) -> Result<Vec<Coupon>>;

    async fn create_coupon(&self, coupon: Coupon) -> Result<Coupon>;

    /// Replaces a stored coupon; `None` when it does not exist.
    async fn update_coupon(&self, coupon: Coupon) -> Result<Option<Coupon>>;

    async fn delete_coupon(&self, id: &str) -> Result<bool>;

    /// Number of `used` records for the pair.
    async fn count_used(&self, user_id: &str, coupon_id: &str) -> Result<u32>;

    /// `used` record counts per coupon for one user.
    async fn used_counts_for_user(&self, user_id: &str) -> Result<HashMap<String, u32>>;

    /// Inserts `record` only while the pair holds fewer than `usage_limit`
    /// used records. A limit of 0 always inserts.
    async fn insert_redemption(&self, record: UserCoupon, usage_limit: u32) -> Result<InsertOutcome>;

    async fn get_user(&self, id: &str) -> Result<Option<User>>;

    /// Insert or replace.
    async fn save_user(&self, user: User) -> Result<User>;

    /// One page of `used` records, newest first, plus the total match count.
    async fn usage_logs(&self, filter: UsageLogFilter) -> Result<(Vec<UsageLogEntry>, usize)>;

    /// `used` records with `used_at >= since`, or all of them.
    async fn count_redemptions(&self, since: Option<DateTime<Utc>>) -> Result<u64>;
}

/// Builds the store selected by configuration.
pub async fn connect(config: &Config) -> Result<Arc<dyn CouponStore>> {
    match config.store_backend {
        StoreBackend::Memory => {
            let store = if config.seed_demo_data {
                info!("Using in-memory store seeded with demo coupons");
                MemoryStore::with_demo_data(Utc::now())
            } else {
                info!("Using empty in-memory store");
                MemoryStore::new()
            };
            Ok(Arc::new(store))
        }
        StoreBackend::Surrealdb => {
            let db = Database::new(config).await?;
            db.verify_connection().await?;
            db.define_schema().await?;
            Ok(Arc::new(db))
        }
    }
}
