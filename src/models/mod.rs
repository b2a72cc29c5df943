pub mod coupon;
pub mod stats;
pub mod user;
pub mod user_coupon;

pub use coupon::*;
pub use stats::DashboardStats;
pub use user::*;
pub use user_coupon::*;
