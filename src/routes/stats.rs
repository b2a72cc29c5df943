use crate::{error::Result, state::AppState};
use axum::{extract::State, response::Json, routing::get, Router};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(dashboard_stats))
}

/// GET /api/admin/stats
async fn dashboard_stats(State(state): State<Arc<AppState>>) -> Result<Json<Value>> {
    let stats = state
        .coupon_service
        .stats(Utc::now(), state.config.stats_utc_offset_hours)
        .await?;

    Ok(Json(json!({
        "success": true,
        "stats": stats
    })))
}
