use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;

use super::bearer_token;
use crate::errors::AppError;
use crate::models::User;
use crate::services::auth::{self, LoginRequest, RegisterRequest, Session};
use crate::state::AppState;

// POST /api/auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let user = auth::register(&state, body)?;
    Ok((StatusCode::CREATED, Json(user)))
}

// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<Session>, AppError> {
    Ok(Json(auth::login(&state, body)?))
}

// POST /api/auth/logout
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    auth::logout(&state, bearer_token(&headers))?;
    Ok(Json(serde_json::json!({"ok": true})))
}
