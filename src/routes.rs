use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{account, admin, appointments, auth, doctors, health, notifications};
use crate::state::AppState;

pub fn app(state: Arc<AppState>) -> Router {
    let cors = if state.config.cors_allow_any {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
    };

    Router::new()
        .route("/health", get(health::health))
        // accounts
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route(
            "/api/me",
            get(account::get_profile)
                .put(account::update_profile)
                .delete(account::delete_account),
        )
        .route(
            "/api/me/settings",
            get(account::get_settings).put(account::update_settings),
        )
        // booking
        .route("/api/specialties", get(doctors::list_specialties))
        .route("/api/doctors", get(doctors::list_doctors))
        .route("/api/doctors/:id/availability", get(doctors::availability))
        .route("/api/doctors/:id/dates", get(doctors::bookable_dates))
        .route("/api/time-slots", get(doctors::time_slots))
        .route(
            "/api/appointments",
            get(appointments::list_mine).post(appointments::book),
        )
        .route("/api/appointments/:id/cancel", post(appointments::cancel))
        .route(
            "/api/appointments/:id/reschedule",
            post(appointments::request_reschedule),
        )
        // notifications
        .route("/api/notifications", get(notifications::feed))
        .route("/api/notifications/:id/read", post(notifications::mark_read))
        .route("/api/notifications/events", get(notifications::events_stream))
        // admin console
        .route("/api/admin/dashboard", get(admin::dashboard))
        .route("/api/admin/users", get(admin::list_users))
        .route(
            "/api/admin/users/:id",
            put(admin::update_user).delete(admin::delete_user),
        )
        .route(
            "/api/admin/doctors",
            get(admin::list_doctors).post(admin::create_doctor),
        )
        .route("/api/admin/doctors/:id/schedules", post(admin::add_schedule))
        .route(
            "/api/admin/schedules/:id",
            put(admin::update_schedule).delete(admin::delete_schedule),
        )
        .route("/api/admin/appointments", get(admin::list_appointments))
        .route(
            "/api/admin/appointments/:id",
            put(admin::edit_appointment),
        )
        .route(
            "/api/admin/appointments/:id/status",
            post(admin::update_appointment_status),
        )
        .route(
            "/api/admin/notifications",
            get(admin::list_notifications).post(admin::send_notification),
        )
        .route(
            "/api/admin/notifications/templates",
            get(admin::list_templates),
        )
        .route(
            "/api/admin/notifications/templates/:id/render",
            post(admin::render_template),
        )
        .route("/api/admin/notifications/groups", get(admin::list_groups))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
