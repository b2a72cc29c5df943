use crate::{
    error::AppError,
    state::{AppState, KeyedRateLimiter},
};
use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, Request},
    middleware::Next,
    response::Response,
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Requires a valid admin bearer token. Passes everything through when the
/// guard has no secret configured.
pub async fn admin_auth_middleware(
    State(app_state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next<Body>,
) -> Result<Response, AppError> {
    if !app_state.admin_auth.is_enabled() {
        return Ok(next.run(request).await);
    }

    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            debug!("Admin request to {} without bearer token", request.uri().path());
            AppError::unauthorized("Authentication required")
        })?;

    app_state.admin_auth.verify(token)?;
    Ok(next.run(request).await)
}

/// Per-client-IP rate limit.
pub async fn rate_limit_middleware(
    State(app_state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next<Body>,
) -> Result<Response, AppError> {
    let client_ip = get_client_ip(&request, app_state.config.trust_proxy_headers);

    match app_state.rate_limiter.check_key(&client_ip) {
        Ok(_) => {
            debug!("Rate limit check passed for IP: {}", client_ip);
            Ok(next.run(request).await)
        }
        Err(_) => {
            warn!("Rate limit exceeded for IP: {}", client_ip);
            Err(AppError::RateLimitExceeded)
        }
    }
}

pub async fn request_logging_middleware(request: Request<Body>, next: Next<Body>) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let client_ip = get_client_ip(&request, false);

    let start_time = std::time::Instant::now();
    debug!("Incoming request: {} {} from {}", method, uri, client_ip);

    let response = next.run(request).await;

    info!(
        "Request completed: {} {} {} - {}ms",
        method,
        uri,
        response.status().as_u16(),
        start_time.elapsed().as_millis()
    );

    response
}

/// Drops limiter keys whose state is back to fresh, so addresses that stop
/// calling do not stay in memory.
pub fn spawn_rate_limiter_cleanup(limiter: Arc<KeyedRateLimiter>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            limiter.retain_recent();
            limiter.shrink_to_fit();
            debug!("Rate limiter holds {} client keys", limiter.len());
        }
    })
}

/// Client address used as the rate-limit key. Forwarding headers are client
/// controlled, so they are only read when `trust_proxy_headers` is set;
/// otherwise the peer address from connect info is used.
pub fn get_client_ip<B>(request: &Request<B>, trust_proxy_headers: bool) -> String {
    if trust_proxy_headers {
        if let Some(ip) = forwarded_ip(request) {
            return ip;
        }
    }

    request
        .extensions()
        .get::<axum::extract::ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn forwarded_ip<B>(request: &Request<B>) -> Option<String> {
    let headers = request.headers();

    let forwarded_for = headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());
    if let Some(ip) = forwarded_for {
        return Some(ip.to_string());
    }

    headers
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::ConnectInfo;
    use governor::Quota;

    #[test]
    fn test_forwarding_headers_ignored_by_default() {
        let mut request = Request::builder()
            .header("x-forwarded-for", "203.0.113.7")
            .header("x-real-ip", "198.51.100.2")
            .body(())
            .unwrap();
        assert_eq!(get_client_ip(&request, false), "unknown");

        let peer: SocketAddr = "192.0.2.10:51000".parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(peer));
        assert_eq!(get_client_ip(&request, false), "192.0.2.10");
    }

    #[test]
    fn test_trusted_proxy_headers() {
        let request = Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .header("x-real-ip", "198.51.100.2")
            .body(())
            .unwrap();
        assert_eq!(get_client_ip(&request, true), "203.0.113.7");

        let request = Request::builder()
            .header("x-real-ip", "198.51.100.2")
            .body(())
            .unwrap();
        assert_eq!(get_client_ip(&request, true), "198.51.100.2");

        let request = Request::builder().body(()).unwrap();
        assert_eq!(get_client_ip(&request, true), "unknown");
    }

    #[tokio::test]
    async fn test_cleanup_drops_idle_keys() {
        let quota = Quota::with_period(Duration::from_millis(1)).unwrap();
        let limiter: Arc<KeyedRateLimiter> = Arc::new(governor::RateLimiter::dashmap(quota));
        for i in 0..10 {
            let _ = limiter.check_key(&format!("10.0.0.{}", i));
        }
        assert_eq!(limiter.len(), 10);

        tokio::time::sleep(Duration::from_millis(20)).await;
        let handle = spawn_rate_limiter_cleanup(limiter.clone(), Duration::from_millis(5));
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.abort();

        assert_eq!(limiter.len(), 0);
    }
}
