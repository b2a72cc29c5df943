use crate::{
    config::Config,
    services::{
        AdminAuth, CouponService, CouponStore, RedemptionService, UsageLogService, UserService,
    },
};
use governor::{clock::DefaultClock, state::keyed::DashMapStateStore, Quota, RateLimiter};
use std::{num::NonZeroU32, sync::Arc};

pub type KeyedRateLimiter = RateLimiter<String, DashMapStateStore<String>, DefaultClock>;

/// Shared application state handed to every router.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,

    pub coupon_service: CouponService,

    pub redemption_service: RedemptionService,

    pub user_service: UserService,

    pub usage_log_service: UsageLogService,

    pub admin_auth: AdminAuth,

    /// Per-client-IP limiter for the redemption endpoint.
    pub rate_limiter: Arc<KeyedRateLimiter>,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn CouponStore>) -> Self {
        let quota = Quota::per_minute(
            NonZeroU32::new(config.rate_limit_requests).unwrap_or(NonZeroU32::MIN),
        )
        .allow_burst(NonZeroU32::new(config.rate_limit_burst).unwrap_or(NonZeroU32::MIN));

        Self {
            coupon_service: CouponService::new(store.clone()),
            redemption_service: RedemptionService::new(store.clone()),
            user_service: UserService::new(store.clone()),
            usage_log_service: UsageLogService::new(
                store,
                config.usage_log_default_limit,
                config.usage_log_max_limit,
            ),
            admin_auth: AdminAuth::new(config.admin_jwt_secret.clone()),
            rate_limiter: Arc::new(RateLimiter::dashmap(quota)),
            config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{models::UsageLogQuery, services::memory::MemoryStore};
    use chrono::Utc;

    #[tokio::test]
    async fn test_services_share_the_injected_store() {
        let store = Arc::new(MemoryStore::with_demo_data(Utc::now()));
        let state = AppState::new(Config::default(), store.clone());

        state
            .redemption_service
            .attempt_redeem("1", "U0000000000000001")
            .await
            .unwrap();

        assert_eq!(store.count_used("U0000000000000001", "1").await.unwrap(), 1);
        let page = state
            .usage_log_service
            .list(UsageLogQuery {
                coupon_id: Some("1".to_string()),
                ..UsageLogQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.logs.len(), 1);
    }
}
