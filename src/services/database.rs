use crate::{
    config::Config,
    error::{AppError, Result},
    models::{
        Coupon, CouponFilter, InsertOutcome, UsageLogCoupon, UsageLogEntry, UsageLogFilter,
        UsageLogUser, UsageStatus, User, UserCoupon,
    },
    services::store::CouponStore,
    utils::serde_helpers::record_key,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use surrealdb::{
    engine::remote::http::{Client, Http, Https},
    opt::auth::Root,
    sql::Datetime,
    Surreal,
};
use tracing::{debug, error, info, warn};

const COUPON_TABLE: &str = "coupon";
const USER_TABLE: &str = "user";
const USER_COUPON_TABLE: &str = "user_coupon";

/// The unique slot index is what makes redemption inserts conditional: a
/// limited coupon's n-th redemption for a user always claims slot `n`.
const SCHEMA: &str = r#"
    DEFINE INDEX coupon_created_at ON TABLE coupon COLUMNS created_at;
    DEFINE INDEX user_coupon_pair ON TABLE user_coupon COLUMNS user_id, coupon_id;
    DEFINE INDEX user_coupon_slot ON TABLE user_coupon COLUMNS user_id, coupon_id, slot UNIQUE;
    DEFINE INDEX user_coupon_used_at ON TABLE user_coupon COLUMNS used_at;
"#;

/// SurrealDB-backed record store.
#[derive(Clone)]
pub struct Database {
    client: Surreal<Client>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CouponRecord {
    #[serde(deserialize_with = "record_key::deserialize", skip_serializing)]
    id: String,
    title: String,
    description: Option<String>,
    image_url: Option<String>,
    valid_from: Datetime,
    valid_to: Datetime,
    is_active: bool,
    usage_limit: u32,
    created_at: Datetime,
    updated_at: Datetime,
}

impl From<Coupon> for CouponRecord {
    fn from(c: Coupon) -> Self {
        Self {
            id: c.id,
            title: c.title,
            description: c.description,
            image_url: c.image_url,
            valid_from: c.valid_from.into(),
            valid_to: c.valid_to.into(),
            is_active: c.is_active,
            usage_limit: c.usage_limit,
            created_at: c.created_at.into(),
            updated_at: c.updated_at.into(),
        }
    }
}

impl From<CouponRecord> for Coupon {
    fn from(r: CouponRecord) -> Self {
        Self {
            id: r.id,
            title: r.title,
            description: r.description,
            image_url: r.image_url,
            valid_from: r.valid_from.0,
            valid_to: r.valid_to.0,
            is_active: r.is_active,
            usage_limit: r.usage_limit,
            created_at: r.created_at.0,
            updated_at: r.updated_at.0,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct UserCouponRecord {
    #[serde(deserialize_with = "record_key::deserialize", skip_serializing)]
    id: String,
    user_id: String,
    coupon_id: String,
    used_at: Option<Datetime>,
    status: UsageStatus,
    /// Ordinal of the redemption within the usage limit, or the record id
    /// for unlimited coupons.
    slot: String,
    created_at: Datetime,
}

impl UserCouponRecord {
    fn new(record: UserCoupon, slot: String) -> Self {
        Self {
            id: record.id,
            user_id: record.user_id,
            coupon_id: record.coupon_id,
            used_at: record.used_at.map(Datetime::from),
            status: record.status,
            slot,
            created_at: record.created_at.into(),
        }
    }
}

impl From<UserCouponRecord> for UserCoupon {
    fn from(r: UserCouponRecord) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            coupon_id: r.coupon_id,
            used_at: r.used_at.map(|d| d.0),
            status: r.status,
            created_at: r.created_at.0,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct UserRecord {
    #[serde(deserialize_with = "record_key::deserialize", skip_serializing)]
    id: String,
    display_name: Option<String>,
    avatar_url: Option<String>,
    created_at: Datetime,
    last_login_at: Datetime,
}

impl From<User> for UserRecord {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            display_name: u.display_name,
            avatar_url: u.avatar_url,
            created_at: u.created_at.into(),
            last_login_at: u.last_login_at.into(),
        }
    }
}

impl From<UserRecord> for User {
    fn from(r: UserRecord) -> Self {
        Self {
            id: r.id,
            display_name: r.display_name,
            avatar_url: r.avatar_url,
            created_at: r.created_at.0,
            last_login_at: r.last_login_at.0,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CountRow {
    total: u64,
}

#[derive(Debug, Deserialize)]
struct CouponCountRow {
    coupon_id: String,
    total: u32,
}

impl Database {
    /// Connects over HTTP(S), signs in as root and selects namespace/database.
    pub async fn new(config: &Config) -> Result<Self> {
        let url = config
            .database_url
            .as_deref()
            .ok_or_else(|| AppError::internal("DATABASE_URL is not configured"))?;
        info!("Initializing database connection to {}", url);

        let client = if let Some(address) = url.strip_prefix("https://") {
            Surreal::new::<Https>(address).await?
        } else {
            Surreal::new::<Http>(url.trim_start_matches("http://")).await?
        };

        client
            .signin(Root {
                username: &config.database_username,
                password: &config.database_password,
            })
            .await?;
        client
            .use_ns(&config.database_namespace)
            .use_db(&config.database_name)
            .await?;

        Ok(Self { client })
    }

    pub async fn verify_connection(&self) -> Result<()> {
        match self.client.health().await {
            Ok(_) => {
                info!("Database connection verified successfully");
                Ok(())
            }
            Err(e) => {
                error!("Failed to verify database connection: {}", e);
                Err(AppError::from(e))
            }
        }
    }

    pub async fn define_schema(&self) -> Result<()> {
        self.client.query(SCHEMA).await?.check()?;
        info!("Database schema is in place");
        Ok(())
    }

    async fn select_coupons_by_ids(&self, ids: Vec<String>) -> Result<HashMap<String, Coupon>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let mut response = self
            .client
            .query("SELECT * FROM type::table($table) WHERE meta::id(id) INSIDE $ids")
            .bind(("table", COUPON_TABLE))
            .bind(("ids", ids))
            .await?;
        let rows: Vec<CouponRecord> = response.take(0)?;
        Ok(rows
            .into_iter()
            .map(|r| (r.id.clone(), Coupon::from(r)))
            .collect())
    }

    async fn select_users_by_ids(&self, ids: Vec<String>) -> Result<HashMap<String, User>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let mut response = self
            .client
            .query("SELECT * FROM type::table($table) WHERE meta::id(id) INSIDE $ids")
            .bind(("table", USER_TABLE))
            .bind(("ids", ids))
            .await?;
        let rows: Vec<UserRecord> = response.take(0)?;
        Ok(rows
            .into_iter()
            .map(|r| (r.id.clone(), User::from(r)))
            .collect())
    }
}

/// Slot value for the next redemption. Unlimited coupons use the record id so
/// the unique index never collides; limited ones claim the next ordinal, or
/// `None` once every slot is taken.
fn redemption_slot(record_id: &str, usage_limit: u32, used: u32) -> Option<String> {
    if usage_limit == 0 {
        Some(record_id.to_string())
    } else if used >= usage_limit {
        None
    } else {
        Some(used.to_string())
    }
}

fn is_unique_violation(err: &surrealdb::Error) -> bool {
    let message = err.to_string();
    message.contains("already contains") && message.contains("user_coupon_slot")
}

fn usage_log_conditions(filter: &UsageLogFilter) -> String {
    let mut conditions = vec!["status = 'used'"];
    if filter.coupon_id.is_some() {
        conditions.push("coupon_id = $coupon_id");
    }
    if filter.from.is_some() {
        conditions.push("used_at >= $from");
    }
    if filter.to.is_some() {
        conditions.push("used_at <= $to");
    }
    conditions.join(" AND ")
}

#[async_trait]
impl CouponStore for Database {
    async fn get_coupon(&self, id: &str) -> Result<Option<Coupon>> {
        debug!("Selecting coupon {}", id);
        let mut response = self
            .client
            .query("SELECT * FROM type::thing($table, $id)")
            .bind(("table", COUPON_TABLE))
            .bind(("id", id))
            .await?;
        let rows: Vec<CouponRecord> = response.take(0)?;
        Ok(rows.into_iter().next().map(Coupon::from))
    }

    async fn list_coupons(&self, filter: CouponFilter) -> Result<Vec<Coupon>> {
        let mut response = match filter {
            CouponFilter::All => {
                self.client
                    .query("SELECT * FROM type::table($table) ORDER BY created_at DESC")
                    .bind(("table", COUPON_TABLE))
                    .await?
            }
            CouponFilter::Redeemable(now) => {
                self.client
                    .query(
                        "SELECT * FROM type::table($table) \
                         WHERE is_active = true AND valid_from <= $now AND valid_to >= $now \
                         ORDER BY created_at DESC",
                    )
                    .bind(("table", COUPON_TABLE))
                    .bind(("now", Datetime::from(now)))
                    .await?
            }
        };
        let rows: Vec<CouponRecord> = response.take(0)?;
        Ok(rows.into_iter().map(Coupon::from).collect())
    }

    async fn create_coupon(&self, coupon: Coupon) -> Result<Coupon> {
        debug!("Creating coupon record {}", coupon.id);
        let id = coupon.id.clone();
        let mut response = self
            .client
            .query("CREATE type::thing($table, $id) CONTENT $data")
            .bind(("table", COUPON_TABLE))
            .bind(("id", id))
            .bind(("data", CouponRecord::from(coupon)))
            .await?;
        let rows: Vec<CouponRecord> = response.take(0)?;
        rows.into_iter()
            .next()
            .map(Coupon::from)
            .ok_or_else(|| AppError::internal("Failed to create coupon"))
    }

    async fn update_coupon(&self, coupon: Coupon) -> Result<Option<Coupon>> {
        let id = coupon.id.clone();
        let mut response = self
            .client
            .query("UPDATE type::table($table) CONTENT $data WHERE id = type::thing($table, $id)")
            .bind(("table", COUPON_TABLE))
            .bind(("id", id))
            .bind(("data", CouponRecord::from(coupon)))
            .await?;
        let rows: Vec<CouponRecord> = response.take(0)?;
        Ok(rows.into_iter().next().map(Coupon::from))
    }

    async fn delete_coupon(&self, id: &str) -> Result<bool> {
        let mut response = self
            .client
            .query("DELETE type::thing($table, $id) RETURN BEFORE")
            .bind(("table", COUPON_TABLE))
            .bind(("id", id))
            .await?;
        let rows: Vec<CouponRecord> = response.take(0)?;
        Ok(!rows.is_empty())
    }

    async fn count_used(&self, user_id: &str, coupon_id: &str) -> Result<u32> {
        let mut response = self
            .client
            .query(
                "SELECT count() AS total FROM type::table($table) \
                 WHERE user_id = $user_id AND coupon_id = $coupon_id AND status = 'used' \
                 GROUP ALL",
            )
            .bind(("table", USER_COUPON_TABLE))
            .bind(("user_id", user_id))
            .bind(("coupon_id", coupon_id))
            .await?;
        let row: Option<CountRow> = response.take(0)?;
        Ok(row.map(|r| r.total as u32).unwrap_or(0))
    }

    async fn used_counts_for_user(&self, user_id: &str) -> Result<HashMap<String, u32>> {
        let mut response = self
            .client
            .query(
                "SELECT coupon_id, count() AS total FROM type::table($table) \
                 WHERE user_id = $user_id AND status = 'used' \
                 GROUP BY coupon_id",
            )
            .bind(("table", USER_COUPON_TABLE))
            .bind(("user_id", user_id))
            .await?;
        let rows: Vec<CouponCountRow> = response.take(0)?;
        Ok(rows.into_iter().map(|r| (r.coupon_id, r.total)).collect())
    }

    async fn insert_redemption(&self, record: UserCoupon, usage_limit: u32) -> Result<InsertOutcome> {
        let used = if usage_limit == 0 {
            0
        } else {
            self.count_used(&record.user_id, &record.coupon_id).await?
        };
        let slot = match redemption_slot(&record.id, usage_limit, used) {
            Some(slot) => slot,
            None => return Ok(InsertOutcome::LimitReached),
        };

        debug!(
            "Inserting redemption {} for user {} coupon {} in slot {}",
            record.id, record.user_id, record.coupon_id, slot
        );

        let id = record.id.clone();
        let created: surrealdb::Result<Vec<UserCouponRecord>> = async {
            let mut response = self
                .client
                .query("CREATE type::thing($table, $id) CONTENT $data")
                .bind(("table", USER_COUPON_TABLE))
                .bind(("id", id))
                .bind(("data", UserCouponRecord::new(record, slot)))
                .await?;
            response.take(0)
        }
        .await;

        match created {
            Ok(rows) => rows
                .into_iter()
                .next()
                .map(|r| InsertOutcome::Inserted(r.into()))
                .ok_or_else(|| AppError::internal("Failed to create redemption record")),
            Err(e) if is_unique_violation(&e) => {
                warn!("Redemption slot already taken by a concurrent attempt: {}", e);
                Ok(InsertOutcome::LimitReached)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_user(&self, id: &str) -> Result<Option<User>> {
        let mut response = self
            .client
            .query("SELECT * FROM type::thing($table, $id)")
            .bind(("table", USER_TABLE))
            .bind(("id", id))
            .await?;
        let rows: Vec<UserRecord> = response.take(0)?;
        Ok(rows.into_iter().next().map(User::from))
    }

    async fn save_user(&self, user: User) -> Result<User> {
        let id = user.id.clone();
        let mut response = self
            .client
            .query("UPDATE type::thing($table, $id) CONTENT $data")
            .bind(("table", USER_TABLE))
            .bind(("id", id))
            .bind(("data", UserRecord::from(user)))
            .await?;
        let rows: Vec<UserRecord> = response.take(0)?;
        rows.into_iter()
            .next()
            .map(User::from)
            .ok_or_else(|| AppError::internal("Failed to save user"))
    }

    async fn usage_logs(&self, filter: UsageLogFilter) -> Result<(Vec<UsageLogEntry>, usize)> {
        let conditions = usage_log_conditions(&filter);
        let sql = format!(
            "SELECT * FROM type::table($table) WHERE {conditions} \
             ORDER BY used_at DESC LIMIT $limit START $offset; \
             SELECT count() AS total FROM type::table($table) WHERE {conditions} GROUP ALL;"
        );

        let mut response = self
            .client
            .query(sql)
            .bind(("table", USER_COUPON_TABLE))
            .bind(("limit", filter.limit))
            .bind(("offset", filter.offset))
            .bind(("coupon_id", filter.coupon_id.clone()))
            .bind(("from", filter.from.map(Datetime::from)))
            .bind(("to", filter.to.map(Datetime::from)))
            .await?;

        let rows: Vec<UserCouponRecord> = response.take(0)?;
        let total: Option<CountRow> = response.take(1)?;
        let records: Vec<UserCoupon> = rows.into_iter().map(UserCoupon::from).collect();

        let mut user_ids: Vec<String> = records.iter().map(|r| r.user_id.clone()).collect();
        user_ids.sort();
        user_ids.dedup();
        let mut coupon_ids: Vec<String> = records.iter().map(|r| r.coupon_id.clone()).collect();
        coupon_ids.sort();
        coupon_ids.dedup();

        let users = self.select_users_by_ids(user_ids).await?;
        let coupons = self.select_coupons_by_ids(coupon_ids).await?;

        let logs = records
            .into_iter()
            .map(|record| {
                let user = users.get(&record.user_id);
                UsageLogEntry {
                    user: UsageLogUser {
                        id: record.user_id.clone(),
                        display_name: user.and_then(|u| u.display_name.clone()),
                        avatar_url: user.and_then(|u| u.avatar_url.clone()),
                    },
                    coupon: UsageLogCoupon {
                        title: coupons
                            .get(&record.coupon_id)
                            .map(|c| c.title.clone())
                            .unwrap_or_default(),
                        id: record.coupon_id,
                    },
                    id: record.id,
                    used_at: record.used_at,
                    status: record.status,
                }
            })
            .collect();

        Ok((logs, total.map(|t| t.total as usize).unwrap_or(0)))
    }

    async fn count_redemptions(&self, since: Option<DateTime<Utc>>) -> Result<u64> {
        let sql = if since.is_some() {
            "SELECT count() AS total FROM type::table($table) \
             WHERE status = 'used' AND used_at >= $since GROUP ALL"
        } else {
            "SELECT count() AS total FROM type::table($table) WHERE status = 'used' GROUP ALL"
        };
        let mut response = self
            .client
            .query(sql)
            .bind(("table", USER_COUPON_TABLE))
            .bind(("since", since.map(Datetime::from)))
            .await?;
        let row: Option<CountRow> = response.take(0)?;
        Ok(row.map(|r| r.total).unwrap_or(0))
    }
}
