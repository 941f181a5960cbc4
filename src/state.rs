use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;
use tokio::sync::broadcast;

use crate::config::AppConfig;
use crate::models::Notification;
use crate::services::scheduling::BookingPolicy;
use crate::store::AppointmentStore;

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub appointments: Box<dyn AppointmentStore>,
    pub notify_tx: broadcast::Sender<Notification>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        db: Arc<Mutex<Connection>>,
        appointments: Box<dyn AppointmentStore>,
    ) -> Self {
        let (notify_tx, _) = broadcast::channel(256);
        Self {
            db,
            config,
            appointments,
            notify_tx,
        }
    }

    /// Locks the shared connection. Never hold the guard across an `.await`.
    pub fn conn(&self) -> anyhow::Result<MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|_| anyhow::anyhow!("database lock poisoned"))
    }

    pub fn booking_policy(&self) -> BookingPolicy {
        BookingPolicy {
            allow_weekends: self.config.allow_weekend_bookings,
        }
    }
}
