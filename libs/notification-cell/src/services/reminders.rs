// libs/notification-cell/src/services/reminders.rs
use chrono::{Duration as ChronoDuration, NaiveDateTime};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use std::sync::Arc;
use shared_database::supabase::SupabaseClient;

use crate::models::SendOutcome;

/// Hours before the appointment start at which reminders fire.
pub const REMINDER_OFFSETS_HOURS: [i64; 2] = [24, 2];

/// Writes `appointment_reminders` rows for a delivery job to pick up.
/// This cell only schedules; it never sends reminder messages itself.
pub struct ReminderScheduler {
    supabase: Arc<SupabaseClient>,
}

impl ReminderScheduler {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    /// Insert one reminder row per offset that is still in the future.
    /// A same-day booking inside 2 hours gets no rows at all, which is
    /// a success, not an error.
    pub async fn schedule_for_appointment(
        &self,
        appointment_id: Uuid,
        customer_id: Uuid,
        start: NaiveDateTime,
        now: NaiveDateTime,
        auth_token: &str,
    ) -> SendOutcome {
        let rows: Vec<Value> = REMINDER_OFFSETS_HOURS
            .iter()
            .filter_map(|hours| {
                let remind_at = start - ChronoDuration::hours(*hours);
                (remind_at > now).then(|| {
                    json!({
                        "appointment_id": appointment_id,
                        "customer_id": customer_id,
                        "remind_at": remind_at.format("%Y-%m-%dT%H:%M:%S").to_string(),
                        "offset_hours": hours,
                    })
                })
            })
            .collect();

        if rows.is_empty() {
            debug!(
                "No future reminder offsets for appointment {} starting {}",
                appointment_id, start
            );
            return SendOutcome::ok();
        }

        let scheduled = rows.len();
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));

        let result: Result<Vec<Value>, _> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/appointment_reminders",
                Some(auth_token),
                Some(Value::Array(rows)),
                Some(headers),
            )
            .await;

        match result {
            Ok(_) => {
                info!(
                    "Scheduled {} reminders for appointment {}",
                    scheduled, appointment_id
                );
                SendOutcome::ok()
            }
            Err(e) => {
                warn!(
                    "Failed to schedule reminders for appointment {}: {}",
                    appointment_id, e
                );
                SendOutcome::failed(e.to_string())
            }
        }
    }

    /// Replace pending reminders after a reschedule.
    pub async fn reschedule_for_appointment(
        &self,
        appointment_id: Uuid,
        customer_id: Uuid,
        new_start: NaiveDateTime,
        now: NaiveDateTime,
        auth_token: &str,
    ) -> SendOutcome {
        let cleared = self.cancel_for_appointment(appointment_id, auth_token).await;
        if !cleared.success {
            return cleared;
        }

        self.schedule_for_appointment(appointment_id, customer_id, new_start, now, auth_token)
            .await
    }

    /// Drop pending reminder rows for an appointment.
    pub async fn cancel_for_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> SendOutcome {
        let path = format!(
            "/rest/v1/appointment_reminders?appointment_id=eq.{}",
            appointment_id
        );
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));

        let result: Result<Vec<Value>, _> = self
            .supabase
            .request_with_headers(Method::DELETE, &path, Some(auth_token), None, Some(headers))
            .await;

        match result {
            Ok(removed) => {
                debug!(
                    "Removed {} pending reminders for appointment {}",
                    removed.len(),
                    appointment_id
                );
                SendOutcome::ok()
            }
            Err(e) => {
                warn!(
                    "Failed to clear reminders for appointment {}: {}",
                    appointment_id, e
                );
                SendOutcome::failed(e.to_string())
            }
        }
    }
}
