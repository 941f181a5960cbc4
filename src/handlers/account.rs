use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;

use super::{require_user, today};
use crate::errors::AppError;
use crate::models::{SettingsPatch, User, UserSettings};
use crate::services::auth::{self, ProfileUpdate};
use crate::services::booking;
use crate::state::AppState;

// GET /api/me
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<User>, AppError> {
    Ok(Json(require_user(&state, &headers)?))
}

// PUT /api/me
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<ProfileUpdate>,
) -> Result<Json<User>, AppError> {
    let user = require_user(&state, &headers)?;
    Ok(Json(auth::update_profile(&state, &user, body)?))
}

// DELETE /api/me
pub async fn delete_account(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    let user = require_user(&state, &headers)?;
    booking::cancel_upcoming_for_user(&state, &user.id, today()).await?;
    auth::delete_account(&state, &user)?;
    Ok(Json(serde_json::json!({"ok": true})))
}

// GET /api/me/settings
pub async fn get_settings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<UserSettings>, AppError> {
    Ok(Json(require_user(&state, &headers)?.settings))
}

// PUT /api/me/settings
pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<SettingsPatch>,
) -> Result<Json<UserSettings>, AppError> {
    let user = require_user(&state, &headers)?;
    Ok(Json(auth::update_settings(&state, &user, body)?))
}
