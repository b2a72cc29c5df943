pub mod auth;
pub mod coupon;
pub mod database;
pub mod eligibility;
pub mod memory;
pub mod redemption;
pub mod store;
pub mod usage_log;
pub mod user;

pub use auth::AdminAuth;
pub use coupon::CouponService;
pub use database::Database;
pub use memory::MemoryStore;
pub use redemption::RedemptionService;
pub use store::CouponStore;
pub use usage_log::UsageLogService;
pub use user::UserService;
