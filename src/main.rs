use std::sync::{Arc, Mutex};

use tracing_subscriber::EnvFilter;

use clinicbook::config::AppConfig;
use clinicbook::db;
use clinicbook::routes;
use clinicbook::services::auth;
use clinicbook::state::AppState;
use clinicbook::store::{AppointmentStore, RestTableStore, SqliteStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;
    db::seed::seed_doctors(&conn)?;
    if config.seed_demo_users {
        auth::ensure_demo_users(&conn)?;
    }
    let expired = db::queries::expire_old_sessions(&conn)?;
    if expired > 0 {
        tracing::info!(count = expired, "removed expired sessions");
    }
    let db = Arc::new(Mutex::new(conn));

    let appointments: Box<dyn AppointmentStore> = match config.store_backend.as_str() {
        "rest" => {
            anyhow::ensure!(
                !config.rest_table_url.is_empty() && !config.rest_table_key.is_empty(),
                "REST_TABLE_URL and REST_TABLE_KEY must be set when STORE_BACKEND=rest"
            );
            tracing::info!("using hosted appointment table (url: {})", config.rest_table_url);
            Box::new(RestTableStore::new(
                config.rest_table_url.clone(),
                config.rest_table_key.clone(),
            ))
        }
        _ => {
            tracing::info!("using SQLite appointment store ({})", config.database_url);
            Box::new(SqliteStore::new(db.clone()))
        }
    };

    let state = Arc::new(AppState::new(config.clone(), db, appointments));
    let app = routes::app(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
