use crate::{
    error::{AppError, Result},
    models::{UsageLogFilter, UsageLogPage, UsageLogQuery},
    services::store::CouponStore,
};
use std::sync::Arc;
use tracing::debug;

/// Admin view over redemption history.
#[derive(Clone)]
pub struct UsageLogService {
    store: Arc<dyn CouponStore>,
    default_limit: usize,
    max_limit: usize,
}

impl UsageLogService {
    pub fn new(store: Arc<dyn CouponStore>, default_limit: usize, max_limit: usize) -> Self {
        Self {
            store,
            default_limit,
            max_limit,
        }
    }

    pub async fn list(&self, query: UsageLogQuery) -> Result<UsageLogPage> {
        let filter = self.normalize(query)?;
        debug!(
            "Listing usage logs limit={} offset={} coupon={:?}",
            filter.limit, filter.offset, filter.coupon_id
        );

        let (logs, total) = self.store.usage_logs(filter.clone()).await?;

        Ok(UsageLogPage {
            logs,
            total,
            limit: filter.limit,
            offset: filter.offset,
        })
    }

    fn normalize(&self, query: UsageLogQuery) -> Result<UsageLogFilter> {
        if let (Some(from), Some(to)) = (query.from, query.to) {
            if from > to {
                return Err(AppError::invalid_input("`from` must not be after `to`"));
            }
        }

        let limit = match query.limit {
            Some(0) => return Err(AppError::invalid_input("limit must be at least 1")),
            Some(limit) => limit.min(self.max_limit),
            None => self.default_limit,
        };

        Ok(UsageLogFilter {
            limit,
            offset: query.offset.unwrap_or(0),
            coupon_id: query
                .coupon_id
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty()),
            from: query.from,
            to: query.to,
        })
    }
}
