use base64::Engine;
use chrono::{NaiveDateTime, Utc};
use hmac::{Hmac, Mac};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use sha1::Sha1;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Role, SettingsPatch, User, UserId, UserSettings};
use crate::state::AppState;

/// Salted HMAC-SHA1, base64 encoded. A digest, not a password KDF.
pub fn digest_password(salt: &str, password: &str) -> anyhow::Result<String> {
    let mut mac = Hmac::<Sha1>::new_from_slice(salt.as_bytes())
        .map_err(|e| anyhow::anyhow!("invalid salt: {e}"))?;
    mac.update(password.as_bytes());
    let result = mac.finalize().into_bytes();
    Ok(base64::engine::general_purpose::STANDARD.encode(result))
}

fn new_digest(password: &str) -> anyhow::Result<(String, String)> {
    let salt = uuid::Uuid::new_v4().to_string();
    let digest = digest_password(&salt, password)?;
    Ok((digest, salt))
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub(crate) fn validate_email(email: &str) -> Result<(), AppError> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(AppError::Validation(
            "Please enter a valid email address".to_string(),
        )),
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
}

pub fn register(state: &AppState, req: RegisterRequest) -> Result<User, AppError> {
    let name = req.name.trim();
    let email = normalize_email(&req.email);
    if name.is_empty() || email.is_empty() || req.password.is_empty() {
        return Err(AppError::Validation(
            "Please fill in all required fields".to_string(),
        ));
    }
    validate_email(&email)?;
    if req.password != req.confirm_password {
        return Err(AppError::Validation("Passwords do not match".to_string()));
    }

    let user = User {
        id: UserId::generate(),
        name: name.to_string(),
        email,
        role: Role::User,
        settings: UserSettings::default(),
        created_at: Utc::now().naive_utc(),
    };
    let (digest, salt) = new_digest(&req.password)?;

    let conn = state.conn()?;
    if queries::email_in_use(&conn, &user.email, None)? {
        return Err(AppError::Conflict("Email already in use".to_string()));
    }
    queries::create_user(&conn, &user, &digest, &salt)?;

    tracing::info!(user_id = %user.id, "registered new user");
    Ok(user)
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct Session {
    pub token: String,
    pub expires_at: NaiveDateTime,
    pub user: User,
}

pub fn login(state: &AppState, req: LoginRequest) -> Result<Session, AppError> {
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(AppError::Validation(
            "Please fill in all required fields".to_string(),
        ));
    }

    let conn = state.conn()?;
    let Some(creds) = queries::get_credentials_by_email(&conn, &normalize_email(&req.email))? else {
        return Err(AppError::InvalidCredentials);
    };
    if digest_password(&creds.password_salt, &req.password)? != creds.password_digest {
        tracing::info!(user_id = %creds.user.id, "rejected login with wrong password");
        return Err(AppError::InvalidCredentials);
    }

    let token = uuid::Uuid::new_v4().to_string();
    let expires_at = Utc::now().naive_utc() + state.config.session_ttl();
    queries::create_session(&conn, &token, &creds.user.id, &expires_at)?;

    Ok(Session {
        token,
        expires_at,
        user: creds.user,
    })
}

pub fn authenticate(state: &AppState, token: &str) -> Result<User, AppError> {
    if token.is_empty() {
        return Err(AppError::Unauthorized);
    }
    let conn = state.conn()?;
    queries::get_session_user(&conn, token)?.ok_or(AppError::Unauthorized)
}

pub fn logout(state: &AppState, token: &str) -> Result<(), AppError> {
    let conn = state.conn()?;
    queries::delete_session(&conn, token)?;
    Ok(())
}

#[derive(Debug, Default, Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub new_password: Option<String>,
    pub confirm_password: Option<String>,
}

pub fn update_profile(state: &AppState, user: &User, update: ProfileUpdate) -> Result<User, AppError> {
    let mut updated = user.clone();
    if let Some(name) = update.name.as_deref().map(str::trim) {
        if name.is_empty() {
            return Err(AppError::Validation("Name cannot be empty".to_string()));
        }
        updated.name = name.to_string();
    }
    if let Some(email) = update.email.as_deref() {
        let email = normalize_email(email);
        validate_email(&email)?;
        updated.email = email;
    }

    let password = match update.new_password.as_deref().filter(|p| !p.is_empty()) {
        Some(new_password) => {
            if update.confirm_password.as_deref() != Some(new_password) {
                return Err(AppError::Validation("Passwords do not match".to_string()));
            }
            Some(new_digest(new_password)?)
        }
        None => None,
    };

    let conn = state.conn()?;
    save_user(&conn, &updated)?;
    if let Some((digest, salt)) = password {
        queries::update_password(&conn, &updated.id, &digest, &salt)?;
    }
    Ok(updated)
}

pub fn update_settings(
    state: &AppState,
    user: &User,
    patch: SettingsPatch,
) -> Result<UserSettings, AppError> {
    let mut updated = user.clone();
    updated.settings.merge(patch);
    let conn = state.conn()?;
    save_user(&conn, &updated)?;
    Ok(updated.settings)
}

/// Writes name, email, role, and settings, enforcing email uniqueness.
pub fn save_user(conn: &Connection, user: &User) -> Result<(), AppError> {
    if queries::email_in_use(conn, &user.email, Some(&user.id))? {
        return Err(AppError::Conflict("Email already in use".to_string()));
    }
    if !queries::update_user(conn, user)? {
        return Err(AppError::NotFound(format!("user {}", user.id)));
    }
    Ok(())
}

pub fn delete_account(state: &AppState, user: &User) -> Result<(), AppError> {
    let conn = state.conn()?;
    queries::delete_user(&conn, &user.id)?;
    tracing::info!(user_id = %user.id, "account deleted");
    Ok(())
}

const DEMO_USERS: &[(&str, &str, &str, Role)] = &[
    ("Admin User", "admin@example.com", "admin123", Role::Admin),
    ("Test User", "user@example.com", "user123", Role::User),
];

/// Creates the demo admin and patient accounts if their emails are free.
pub fn ensure_demo_users(conn: &Connection) -> anyhow::Result<usize> {
    let mut created = 0;
    for (name, email, password, role) in DEMO_USERS {
        if queries::email_in_use(conn, email, None)? {
            continue;
        }
        let user = User {
            id: UserId::generate(),
            name: name.to_string(),
            email: email.to_string(),
            role: *role,
            settings: UserSettings::default(),
            created_at: Utc::now().naive_utc(),
        };
        let (digest, salt) = new_digest(password)?;
        queries::create_user(conn, &user, &digest, &salt)?;
        created += 1;
    }
    if created > 0 {
        tracing::info!(count = created, "seeded demo users");
    }
    Ok(created)
}
