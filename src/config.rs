use std::env;

const DEFAULT_SESSION_TTL_HOURS: i64 = 24;
const MAX_SESSION_TTL_HOURS: i64 = 24 * 365;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub store_backend: String,
    pub rest_table_url: String,
    pub rest_table_key: String,
    pub session_ttl_hours: i64,
    pub allow_weekend_bookings: bool,
    pub seed_demo_users: bool,
    pub cors_allow_any: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "clinicbook.db".to_string()),
            store_backend: env::var("STORE_BACKEND").unwrap_or_else(|_| "sqlite".to_string()),
            rest_table_url: env::var("REST_TABLE_URL").unwrap_or_default(),
            rest_table_key: env::var("REST_TABLE_KEY").unwrap_or_default(),
            session_ttl_hours: session_ttl_hours(env::var("SESSION_TTL_HOURS").ok().as_deref()),
            allow_weekend_bookings: env_flag("ALLOW_WEEKEND_BOOKINGS"),
            seed_demo_users: env_flag("SEED_DEMO_USERS"),
            cors_allow_any: env_flag("CORS_ALLOW_ANY"),
        }
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.session_ttl_hours.clamp(1, MAX_SESSION_TTL_HOURS))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            database_url: ":memory:".to_string(),
            store_backend: "sqlite".to_string(),
            rest_table_url: String::new(),
            rest_table_key: String::new(),
            session_ttl_hours: DEFAULT_SESSION_TTL_HOURS,
            allow_weekend_bookings: false,
            seed_demo_users: false,
            cors_allow_any: false,
        }
    }
}

fn env_flag(name: &str) -> bool {
    env::var(name)
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

/// Unparseable values fall back to the default; the rest are clamped to
/// between one hour and a year.
fn session_ttl_hours(raw: Option<&str>) -> i64 {
    raw.and_then(|v| v.trim().parse::<i64>().ok())
        .unwrap_or(DEFAULT_SESSION_TTL_HOURS)
        .clamp(1, MAX_SESSION_TTL_HOURS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_ttl_parsing() {
        assert_eq!(session_ttl_hours(None), 24);
        assert_eq!(session_ttl_hours(Some("48")), 48);
        assert_eq!(session_ttl_hours(Some("abc")), 24);
        assert_eq!(session_ttl_hours(Some("-5")), 1);
        assert_eq!(session_ttl_hours(Some("0")), 1);
        assert_eq!(session_ttl_hours(Some("9223372036854775807")), 24 * 365);
    }

    #[test]
    fn test_session_ttl_clamps_direct_values() {
        let config = AppConfig {
            session_ttl_hours: i64::MAX,
            ..Default::default()
        };
        assert_eq!(config.session_ttl(), chrono::Duration::hours(24 * 365));

        let config = AppConfig {
            session_ttl_hours: -3,
            ..Default::default()
        };
        assert_eq!(config.session_ttl(), chrono::Duration::hours(1));
    }
}
