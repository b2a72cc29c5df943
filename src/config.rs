use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

/// Which record store backs the service. Chosen once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Surrealdb,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "mock" => Ok(StoreBackend::Memory),
            "surrealdb" | "surreal" => Ok(StoreBackend::Surrealdb),
            other => Err(anyhow::anyhow!("Unknown STORE_BACKEND: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub server_host: String,
    pub server_port: u16,
    pub environment: String,
    pub log_level: String,
    pub log_format: String,

    // Record store
    pub store_backend: StoreBackend,
    pub database_url: Option<String>,
    pub database_namespace: String,
    pub database_name: String,
    pub database_username: String,
    pub database_password: String,
    pub seed_demo_data: bool,

    // Admin authentication; the guard is disabled when unset
    pub admin_jwt_secret: Option<String>,

    // CORS configuration
    pub cors_allowed_origins: String,

    // Rate limiting for redemption attempts
    pub rate_limit_requests: u32,
    pub rate_limit_burst: u32,
    /// Take the client address from `X-Forwarded-For`/`X-Real-IP`. Only
    /// safe behind a proxy that overwrites those headers.
    pub trust_proxy_headers: bool,
    pub rate_limit_cleanup_secs: u64,

    // Usage logs
    pub usage_log_default_limit: usize,
    pub usage_log_max_limit: usize,

    // Dashboard "today" boundary
    pub stats_utc_offset_hours: i32,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL").ok().filter(|url| !url.trim().is_empty());

        let store_backend = match env::var("STORE_BACKEND") {
            Ok(value) => value.parse()?,
            Err(_) if database_url.is_some() => StoreBackend::Surrealdb,
            Err(_) => StoreBackend::Memory,
        };

        if store_backend == StoreBackend::Surrealdb && database_url.is_none() {
            return Err(anyhow::anyhow!(
                "STORE_BACKEND=surrealdb requires DATABASE_URL to be set"
            ));
        }

        let config = Config {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string()),

            store_backend,
            database_url,
            database_namespace: env::var("DATABASE_NAMESPACE")
                .unwrap_or_else(|_| "coupon".to_string()),
            database_name: env::var("DATABASE_NAME")
                .unwrap_or_else(|_| "mini".to_string()),
            database_username: env::var("DATABASE_USERNAME")
                .unwrap_or_else(|_| "root".to_string()),
            database_password: env::var("DATABASE_PASSWORD")
                .unwrap_or_else(|_| "root".to_string()),
            seed_demo_data: env::var("SEED_DEMO_DATA")
                .unwrap_or_else(|_| (store_backend == StoreBackend::Memory).to_string())
                .parse()?,

            admin_jwt_secret: env::var("ADMIN_JWT_SECRET").ok().filter(|s| !s.is_empty()),

            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:3001".to_string()),

            rate_limit_requests: env::var("RATE_LIMIT_REQUESTS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()?,
            rate_limit_burst: env::var("RATE_LIMIT_BURST")
                .unwrap_or_else(|_| "10".to_string())
                .parse()?,
            trust_proxy_headers: env::var("TRUST_PROXY_HEADERS")
                .unwrap_or_else(|_| "false".to_string())
                .parse()?,
            rate_limit_cleanup_secs: env::var("RATE_LIMIT_CLEANUP_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()?,

            usage_log_default_limit: env::var("USAGE_LOG_DEFAULT_LIMIT")
                .unwrap_or_else(|_| "50".to_string())
                .parse()?,
            usage_log_max_limit: env::var("USAGE_LOG_MAX_LIMIT")
                .unwrap_or_else(|_| "200".to_string())
                .parse()?,

            stats_utc_offset_hours: env::var("STATS_UTC_OFFSET_HOURS")
                .unwrap_or_else(|_| "9".to_string())
                .parse()?,
        };

        config.check()?;
        Ok(config)
    }

    fn check(&self) -> anyhow::Result<()> {
        if !(-23..=23).contains(&self.stats_utc_offset_hours) {
            return Err(anyhow::anyhow!(
                "STATS_UTC_OFFSET_HOURS must be between -23 and 23"
            ));
        }
        if self.rate_limit_cleanup_secs == 0 {
            return Err(anyhow::anyhow!("RATE_LIMIT_CLEANUP_SECS must be positive"));
        }
        if self.usage_log_default_limit == 0 || self.usage_log_max_limit < self.usage_log_default_limit {
            return Err(anyhow::anyhow!(
                "USAGE_LOG_DEFAULT_LIMIT must be positive and not exceed USAGE_LOG_MAX_LIMIT"
            ));
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_host: "127.0.0.1".to_string(),
            server_port: 3000,
            environment: "development".to_string(),
            log_level: "info".to_string(),
            log_format: "text".to_string(),
            store_backend: StoreBackend::Memory,
            database_url: None,
            database_namespace: "coupon".to_string(),
            database_name: "mini".to_string(),
            database_username: "root".to_string(),
            database_password: "root".to_string(),
            seed_demo_data: false,
            admin_jwt_secret: None,
            cors_allowed_origins: "http://localhost:3001".to_string(),
            rate_limit_requests: 60,
            rate_limit_burst: 10,
            trust_proxy_headers: false,
            rate_limit_cleanup_secs: 60,
            usage_log_default_limit: 50,
            usage_log_max_limit: 200,
            stats_utc_offset_hours: 9,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_backend_parse() {
        assert_eq!("memory".parse::<StoreBackend>().unwrap(), StoreBackend::Memory);
        assert_eq!("SurrealDB".parse::<StoreBackend>().unwrap(), StoreBackend::Surrealdb);
        assert!("postgres".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn test_default_config_passes_check() {
        assert!(Config::default().check().is_ok());
    }

    #[test]
    fn test_check_rejects_bad_offset() {
        let config = Config {
            stats_utc_offset_hours: 30,
            ..Config::default()
        };
        assert!(config.check().is_err());
    }

    #[test]
    fn test_proxy_headers_untrusted_by_default() {
        let config = Config::default();
        assert!(!config.trust_proxy_headers);

        let config = Config {
            rate_limit_cleanup_secs: 0,
            ..config
        };
        assert!(config.check().is_err());
    }
}
