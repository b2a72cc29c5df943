use crate::{
    error::Result,
    models::{CreateCouponRequest, UpdateCouponRequest},
    state::AppState,
    utils::extract::JsonBody,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_coupons).post(create_coupon))
        .route("/:id", get(get_coupon).put(update_coupon).delete(delete_coupon))
}

/// GET /api/admin/coupons
async fn list_coupons(State(state): State<Arc<AppState>>) -> Result<Json<Value>> {
    let coupons = state.coupon_service.list_all().await?;

    Ok(Json(json!({
        "success": true,
        "coupons": coupons
    })))
}

/// POST /api/admin/coupons
async fn create_coupon(
    State(state): State<Arc<AppState>>,
    JsonBody(request): JsonBody<CreateCouponRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    let coupon = state.coupon_service.create(request, Utc::now()).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "coupon": coupon
        })),
    ))
}

/// GET /api/admin/coupons/:id
async fn get_coupon(
    State(state): State<Arc<AppState>>,
    Path(coupon_id): Path<String>,
) -> Result<Json<Value>> {
    let coupon = state.coupon_service.get(&coupon_id).await?;

    Ok(Json(json!({
        "success": true,
        "coupon": coupon
    })))
}

/// PUT /api/admin/coupons/:id
async fn update_coupon(
    State(state): State<Arc<AppState>>,
    Path(coupon_id): Path<String>,
    JsonBody(request): JsonBody<UpdateCouponRequest>,
) -> Result<Json<Value>> {
    let coupon = state
        .coupon_service
        .update(&coupon_id, request, Utc::now())
        .await?;

    Ok(Json(json!({
        "success": true,
        "coupon": coupon
    })))
}

/// DELETE /api/admin/coupons/:id
async fn delete_coupon(
    State(state): State<Arc<AppState>>,
    Path(coupon_id): Path<String>,
) -> Result<Json<Value>> {
    state.coupon_service.delete(&coupon_id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "The coupon has been deleted"
    })))
}
