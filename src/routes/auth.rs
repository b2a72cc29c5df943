use crate::{
    error::Result,
    models::RegisterUserRequest,
    state::AppState,
    utils::extract::JsonBody,
};
use axum::{extract::State, response::Json, routing::post, Router};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/register", post(register))
}

/// POST /api/mini/auth/register
async fn register(
    State(state): State<Arc<AppState>>,
    JsonBody(request): JsonBody<RegisterUserRequest>,
) -> Result<Json<Value>> {
    let registration = state.user_service.register(request, Utc::now()).await?;

    Ok(Json(json!({
        "success": true,
        "user": registration.user,
        "isNewUser": registration.is_new_user
    })))
}
