use crate::{error::Result, models::UsageLogQuery, state::AppState, utils::extract::QueryParams};
use axum::{extract::State, response::Json, routing::get, Router};
use serde_json::{json, Value};
use std::sync::Arc;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(list_usage_logs))
}

/// GET /api/admin/usage-logs?limit=&offset=&couponId=&from=&to=
async fn list_usage_logs(
    State(state): State<Arc<AppState>>,
    QueryParams(query): QueryParams<UsageLogQuery>,
) -> Result<Json<Value>> {
    let page = state.usage_log_service.list(query).await?;

    Ok(Json(json!({
        "success": true,
        "logs": page.logs,
        "total": page.total,
        "limit": page.limit,
        "offset": page.offset
    })))
}
