pub mod account;
pub mod admin;
pub mod appointments;
pub mod auth;
pub mod doctors;
pub mod health;
pub mod notifications;

use axum::http::HeaderMap;

use crate::errors::AppError;
use crate::models::User;
use crate::services::auth as auth_service;
use crate::state::AppState;

pub(crate) fn bearer_token(headers: &HeaderMap) -> &str {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .unwrap_or("")
}

pub(crate) fn require_user(state: &AppState, headers: &HeaderMap) -> Result<User, AppError> {
    auth_service::authenticate(state, bearer_token(headers))
}

pub(crate) fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<User, AppError> {
    let user = require_user(state, headers)?;
    if !user.is_admin() {
        return Err(AppError::Forbidden);
    }
    Ok(user)
}

pub(crate) fn today() -> chrono::NaiveDate {
    chrono::Local::now().date_naive()
}
