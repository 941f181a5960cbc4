pub mod auth;
pub mod booking;
pub mod notifications;
pub mod scheduling;
