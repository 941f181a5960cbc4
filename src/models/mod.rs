pub mod appointment;
pub mod doctor;
pub mod ids;
pub mod notification;
pub mod schedule;
pub mod user;

pub use appointment::{Appointment, AppointmentFilter, AppointmentStatus, BookedSlot, NewAppointment};
pub use doctor::Doctor;
pub use ids::{AppointmentId, DoctorId, UserId};
pub use notification::{Audience, Notification, NotificationTemplate, RecipientGroup};
pub use schedule::{ScheduleEntry, ScheduleStatus, TimeSlot};
pub use user::{Role, SettingsPatch, User, UserSettings};
