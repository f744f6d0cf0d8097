// libs/notification-cell/src/lib.rs
//! # Notification Cell
//!
//! Outbound messaging for booking events: transactional email, SMS via
//! Twilio, external calendar sync, and reminder scheduling. This cell
//! exposes no HTTP routes; it is a library consumed by the booking flow.
//!
//! Every delivery returns a [`SendOutcome`] instead of an error. A
//! booking must never fail because a confirmation email bounced, so
//! callers log failed outcomes at `warn!` and carry on. Subsystems left
//! unconfigured (no Twilio credentials, say) short-circuit to a failed
//! outcome without any network call.
//!
//! Reminders are rows in `appointment_reminders` at fixed offsets before
//! the appointment start; an external delivery job drains them.

pub mod models;
pub mod services;

pub use models::*;
pub use services::*;

// Re-export commonly used types
pub use models::{AppointmentNotificationContext, CalendarSyncAction, SendOutcome};
pub use services::{
    CalendarClient, EmailSender, NotificationService, ReminderScheduler, SmsSender,
};
