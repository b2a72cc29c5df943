use crate::{
    error::Result,
    models::{CouponDetailQuery, CouponListQuery, RedeemCouponRequest, UserCouponView},
    services::redemption::MSG_REDEEMED,
    state::AppState,
    utils::{
        extract::{JsonBody, QueryParams},
        middleware::rate_limit_middleware,
        validation::{require_optional_id, validate_payload},
    },
};
use axum::{
    extract::{Path, State},
    middleware,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

/// Mini app coupon endpoints. Redemption is rate limited per client IP.
pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_coupons))
        .route("/:id", get(get_coupon))
        .route(
            "/:id/use",
            post(use_coupon).layer(middleware::from_fn_with_state(state, rate_limit_middleware)),
        )
}

/// GET /api/mini/coupons?userId=&includeUsed=
async fn list_coupons(
    State(state): State<Arc<AppState>>,
    QueryParams(query): QueryParams<CouponListQuery>,
) -> Result<Json<Value>> {
    let user_id = require_optional_id(query.user_id.as_deref(), "userId")?;

    let coupons = state
        .coupon_service
        .list_for_user(user_id, query.include_used, Utc::now())
        .await?;

    Ok(Json(json!({
        "success": true,
        "coupons": coupons
    })))
}

/// GET /api/mini/coupons/:id?userId=
async fn get_coupon(
    State(state): State<Arc<AppState>>,
    Path(coupon_id): Path<String>,
    QueryParams(query): QueryParams<CouponDetailQuery>,
) -> Result<Json<Value>> {
    let user_id = require_optional_id(query.user_id.as_deref(), "userId")?;

    let coupon = state
        .coupon_service
        .detail_for_user(&coupon_id, user_id, Utc::now())
        .await?;

    Ok(Json(json!({
        "success": true,
        "coupon": coupon
    })))
}

/// POST /api/mini/coupons/:id/use
async fn use_coupon(
    State(state): State<Arc<AppState>>,
    Path(coupon_id): Path<String>,
    JsonBody(request): JsonBody<RedeemCouponRequest>,
) -> Result<Json<Value>> {
    validate_payload(&request)?;
    debug!("Use request for coupon {} by {}", coupon_id, request.user_id);

    let record = state
        .redemption_service
        .attempt_redeem(&coupon_id, &request.user_id)
        .await?;

    Ok(Json(json!({
        "success": true,
        "userCoupon": UserCouponView::from(record),
        "message": MSG_REDEEMED
    })))
}
