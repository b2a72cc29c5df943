use std::{net::SocketAddr, sync::Arc, time::Duration};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use coupon_mini::{
    config::Config, routes, services::store, state::AppState,
    utils::middleware::spawn_rate_limiter_cleanup,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let config = Config::from_env()?;

    init_tracing(&config);
    info!(
        "Starting coupon-mini service ({} environment)...",
        config.environment
    );

    let store = match store::connect(&config).await {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to initialize record store: {}", e);
            return Err(anyhow::anyhow!("Record store initialization failed"));
        }
    };

    if config.admin_jwt_secret.is_none() {
        if config.is_production() {
            error!("ADMIN_JWT_SECRET is not set; the admin API is open to anyone");
        } else {
            warn!("ADMIN_JWT_SECRET is not set; admin authentication is disabled");
        }
    }

    let addr: SocketAddr = format!("{}:{}", config.server_host, config.server_port).parse()?;
    let cleanup_period = Duration::from_secs(config.rate_limit_cleanup_secs);
    let app_state = Arc::new(AppState::new(config, store));
    spawn_rate_limiter_cleanup(app_state.rate_limiter.clone(), cleanup_period);
    let app = routes::app(app_state);

    info!("Starting server on http://{}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service_with_connect_info::<SocketAddr>())
        .await?;

    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level)
        .unwrap_or_else(|_| EnvFilter::new("coupon_mini=info,tower_http=info"));

    let registry = tracing_subscriber::registry().with(filter);

    if config.log_format.eq_ignore_ascii_case("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
