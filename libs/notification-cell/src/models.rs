// libs/notification-cell/src/models.rs
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Result of one delivery attempt. Senders never return errors and never
/// panic; callers inspect the outcome and log failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendOutcome {
    pub success: bool,
    pub error: Option<String>,
}

impl SendOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Everything the senders need to describe one appointment to a
/// customer. Contact fields are optional; a missing channel yields a
/// failed outcome for that channel, not an error.
#[derive(Debug, Clone)]
pub struct AppointmentNotificationContext {
    pub appointment_id: Uuid,
    pub customer_id: Uuid,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub provider_name: String,
    pub service_name: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl AppointmentNotificationContext {
    /// Human-readable "2025-03-10 at 10:30" used in message bodies.
    pub fn when(&self) -> String {
        format!("{} at {}", self.date, self.start_time.format("%H:%M"))
    }
}

/// What the calendar integration should do for an appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarSyncAction {
    Create,
    Update,
    Delete,
}
