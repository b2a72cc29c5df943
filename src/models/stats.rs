use serde::{Deserialize, Serialize};

/// Back-office dashboard counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    /// Coupons active and inside their validity window right now.
    pub active_coupons: usize,
    /// Redemptions since local midnight.
    pub today_usage: u64,
    pub total_usage: u64,
}
