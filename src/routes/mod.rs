pub mod admin_coupons;
pub mod auth;
pub mod coupons;
pub mod stats;
pub mod usage_logs;

use crate::{
    state::AppState,
    utils::middleware::{admin_auth_middleware, request_logging_middleware},
};
use axum::{
    http::{HeaderValue, Method},
    middleware,
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

/// Full application router: mini app API, admin API behind the admin guard,
/// and the health check.
pub fn app(state: Arc<AppState>) -> Router {
    let admin = Router::new()
        .nest("/coupons", admin_coupons::router())
        .nest("/usage-logs", usage_logs::router())
        .nest("/stats", stats::router())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            admin_auth_middleware,
        ));

    let mini = Router::new()
        .nest("/auth", auth::router())
        .nest("/coupons", coupons::router(state.clone()));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/mini", mini)
        .nest("/api/admin", admin)
        .layer(middleware::from_fn(request_logging_middleware))
        .layer(cors_layer(&state.config.cors_allowed_origins))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "coupon-mini is running"
}

fn cors_layer(allowed_origins: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    if allowed_origins.trim() == "*" {
        return cors.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    cors.allow_origin(origins)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::Config,
        models::UserCoupon,
        services::{auth::AdminAuth, memory::MemoryStore, store::CouponStore},
    };
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use chrono::{Duration, Utc};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn state_with(config: Config) -> (Arc<AppState>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::with_demo_data(Utc::now()));
        let state = Arc::new(AppState::new(config, store.clone()));
        (state, store)
    }

    fn test_app() -> (Router, Arc<MemoryStore>) {
        let (state, store) = state_with(Config::default());
        (app(state), store)
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = test_app();
        let response = app.oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_mini_list_requires_user_id() {
        let (app, _) = test_app();
        let (status, body) = send(app, get("/api/mini/coupons")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "INVALID_INPUT");
    }

    #[tokio::test]
    async fn test_mini_list_shape() {
        let (app, _) = test_app();
        let (status, body) = send(app, get("/api/mini/coupons?userId=U0000000000000001")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);

        let coupons = body["coupons"].as_array().unwrap();
        assert_eq!(coupons.len(), 3);
        let first = &coupons[0];
        assert!(first["validFrom"].is_string());
        assert_eq!(first["userStatus"]["canUse"], true);
        assert_eq!(first["userStatus"]["usedCount"], 0);
    }

    #[tokio::test]
    async fn test_redeem_then_already_used() {
        let (app, store) = test_app();

        let (status, body) = send(
            app.clone(),
            json_request("POST", "/api/mini/coupons/1/use", json!({ "userId": "U0000000000000001" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["userCoupon"]["couponId"], "1");
        assert_eq!(body["userCoupon"]["status"], "used");
        assert!(body["userCoupon"]["usedAt"].is_string());
        assert!(body["message"].is_string());

        let (status, body) = send(
            app,
            json_request("POST", "/api/mini/coupons/1/use", json!({ "userId": "U0000000000000001" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "ALREADY_USED");
        assert_eq!(store.count_used("U0000000000000001", "1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_redeem_error_statuses() {
        let (app, _) = test_app();
        let body = json!({ "userId": "U0000000000000002" });

        // Ended and deactivated: the window check runs first.
        let (status, resp) = send(app.clone(), json_request("POST", "/api/mini/coupons/5/use", body.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(resp["error"], "EXPIRED");

        let (status, resp) = send(app.clone(), json_request("POST", "/api/mini/coupons/4/use", body.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(resp["error"], "EXPIRED");

        let (status, resp) = send(app.clone(), json_request("POST", "/api/mini/coupons/999/use", body)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(resp["error"], "NOT_FOUND");

        let (status, resp) = send(app, json_request("POST", "/api/mini/coupons/1/use", json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(resp["error"], "INVALID_INPUT");
    }

    #[tokio::test]
    async fn test_malformed_json_is_invalid_input() {
        let (app, _) = test_app();
        let request = Request::builder()
            .method("POST")
            .uri("/api/mini/coupons/1/use")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();

        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "INVALID_INPUT");
    }

    #[tokio::test]
    async fn test_redeem_is_rate_limited() {
        let config = Config {
            rate_limit_requests: 1,
            rate_limit_burst: 1,
            ..Config::default()
        };
        let (state, _) = state_with(config);
        let app = app(state);
        let body = json!({ "userId": "U0000000000000001" });

        let request = |body: &Value| {
            Request::builder()
                .method("POST")
                .uri("/api/mini/coupons/2/use")
                .header(header::CONTENT_TYPE, "application/json")
                .header("x-forwarded-for", "203.0.113.9")
                .body(Body::from(body.to_string()))
                .unwrap()
        };

        let (status, _) = send(app.clone(), request(&body)).await;
        assert_eq!(status, StatusCode::OK);
        let (status, resp) = send(app, request(&body)).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(resp["error"], "RATE_LIMITED");
    }

    fn redeem_from(coupon_id: &str, forwarded_for: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(format!("/api/mini/coupons/{}/use", coupon_id))
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-forwarded-for", forwarded_for)
            .body(Body::from(json!({ "userId": "U0000000000000001" }).to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_rotating_forwarded_for_shares_one_quota() {
        let config = Config {
            rate_limit_requests: 1,
            rate_limit_burst: 1,
            ..Config::default()
        };
        let (state, _) = state_with(config);
        let app = app(state);

        let (status, _) = send(app.clone(), redeem_from("999", "10.0.0.0")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        for i in 1..5 {
            let (status, body) = send(app.clone(), redeem_from("999", &format!("10.0.0.{}", i))).await;
            assert_eq!(status, StatusCode::TOO_MANY_REQUESTS, "request {}", i);
            assert_eq!(body["error"], "RATE_LIMITED");
        }
    }

    #[tokio::test]
    async fn test_trusted_forwarded_for_gets_own_quota() {
        let config = Config {
            rate_limit_requests: 1,
            rate_limit_burst: 1,
            trust_proxy_headers: true,
            ..Config::default()
        };
        let (state, _) = state_with(config);
        let app = app(state);

        for i in 0..3 {
            let (status, _) = send(app.clone(), redeem_from("999", &format!("10.0.0.{}", i))).await;
            assert_eq!(status, StatusCode::NOT_FOUND);
        }
        let (status, _) = send(app, redeem_from("999", "10.0.0.0")).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_register() {
        let (app, _) = test_app();
        let (status, body) = send(
            app.clone(),
            json_request("POST", "/api/mini/auth/register", json!({ "lineUserId": "U42", "displayName": "Taro" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["isNewUser"], true);
        assert_eq!(body["user"]["displayName"], "Taro");

        let (_, body) = send(
            app,
            json_request("POST", "/api/mini/auth/register", json!({ "lineUserId": "U42" })),
        )
        .await;
        assert_eq!(body["isNewUser"], false);
    }

    #[tokio::test]
    async fn test_admin_create_and_validation() {
        let (app, _) = test_app();
        let now = Utc::now();

        let (status, body) = send(
            app.clone(),
            json_request(
                "POST",
                "/api/admin/coupons",
                json!({
                    "title": "Weekend special",
                    "validFrom": now,
                    "validTo": now + Duration::days(2),
                    "usageLimit": 0,
                    "isActive": true
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["coupon"]["usageLimit"], 0);
        let id = body["coupon"]["id"].as_str().unwrap().to_string();

        let (status, body) = send(app.clone(), get(&format!("/api/admin/coupons/{}", id))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["coupon"]["title"], "Weekend special");

        let (status, body) = send(
            app,
            json_request(
                "POST",
                "/api/admin/coupons",
                json!({
                    "title": "",
                    "validFrom": now,
                    "validTo": now - Duration::days(2),
                    "usageLimit": 1,
                    "isActive": true
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "INVALID_INPUT");
        assert_eq!(body["message"], "Title is required");
    }

    #[tokio::test]
    async fn test_admin_update_delete() {
        let (app, _) = test_app();

        let (status, body) = send(
            app.clone(),
            json_request("PUT", "/api/admin/coupons/2", json!({ "isActive": false })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["coupon"]["isActive"], false);

        let request = Request::builder()
            .method("DELETE")
            .uri("/api/admin/coupons/2")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(app.clone(), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);

        let (status, body) = send(app, get("/api/admin/coupons/2")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_usage_logs_and_stats() {
        let (app, store) = test_app();
        store
            .insert_redemption(UserCoupon::used("U0000000000000002", "1", Utc::now()), 1)
            .await
            .unwrap();

        let (status, body) = send(app.clone(), get("/api/admin/usage-logs?limit=1")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 2);
        assert_eq!(body["limit"], 1);
        assert_eq!(body["offset"], 0);
        assert_eq!(body["logs"][0]["user"]["displayName"], "Test User 2");

        let (status, body) = send(app, get("/api/admin/stats")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["stats"]["activeCoupons"], 3);
        assert_eq!(body["stats"]["totalUsage"], 2);
    }

    #[tokio::test]
    async fn test_admin_guard() {
        let config = Config {
            admin_jwt_secret: Some("s3cret".to_string()),
            ..Config::default()
        };
        let (state, _) = state_with(config);
        let app = app(state);

        let (status, body) = send(app.clone(), get("/api/admin/coupons")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "UNAUTHORIZED");

        let token = AdminAuth::new(Some("s3cret".to_string()))
            .issue("ops", Duration::hours(1))
            .unwrap();
        let request = Request::builder()
            .uri("/api/admin/coupons")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(app.clone(), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["coupons"].as_array().unwrap().len(), 5);

        // Mini endpoints stay open.
        let (status, _) = send(app, get("/api/mini/coupons?userId=U1")).await;
        assert_eq!(status, StatusCode::OK);
    }
}
