// libs/booking-cell/src/services/conflict.rs
use chrono::{NaiveDate, NaiveTime};
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use std::sync::Arc;
use shared_database::supabase::SupabaseClient;

use crate::models::{Appointment, BookingError, ConflictCheckResponse};

/// Half-open interval overlap: `[start1, end1)` intersects `[start2, end2)`.
/// Back-to-back bookings (one ends exactly when the other starts) do not
/// overlap. This is the only overlap test in the codebase; slot marking
/// uses it too.
pub fn intervals_overlap(
    start1: NaiveTime,
    end1: NaiveTime,
    start2: NaiveTime,
    end2: NaiveTime,
) -> bool {
    start1 < end2 && start2 < end1
}

pub struct ConflictDetectionService {
    supabase: Arc<SupabaseClient>,
}

impl ConflictDetectionService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    /// Check whether `[start_time, end_time)` collides with any blocking
    /// appointment the provider already has on `date`.
    pub async fn check_conflicts(
        &self,
        provider_id: Uuid,
        date: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
        exclude_appointment_id: Option<Uuid>,
        auth_token: Option<&str>,
    ) -> Result<ConflictCheckResponse, BookingError> {
        debug!(
            "Checking conflicts for provider {} on {} from {} to {}",
            provider_id, date, start_time, end_time
        );

        let existing = self
            .blocking_appointments_for_date(provider_id, date, exclude_appointment_id, auth_token)
            .await?;

        let conflicting_appointments: Vec<Appointment> = existing
            .into_iter()
            .filter(|apt| intervals_overlap(start_time, end_time, apt.start_time, apt.end_time))
            .collect();

        let has_conflict = !conflicting_appointments.is_empty();

        if has_conflict {
            warn!(
                "Conflict detected for provider {} on {} - {} overlapping appointments",
                provider_id,
                date,
                conflicting_appointments.len()
            );
        }

        Ok(ConflictCheckResponse {
            has_conflict,
            conflicting_appointments,
        })
    }

    /// Boolean-only variant used by the booking flow.
    pub async fn has_conflict(
        &self,
        provider_id: Uuid,
        date: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
        exclude_appointment_id: Option<Uuid>,
        auth_token: Option<&str>,
    ) -> Result<bool, BookingError> {
        let response = self
            .check_conflicts(
                provider_id,
                date,
                start_time,
                end_time,
                exclude_appointment_id,
                auth_token,
            )
            .await?;

        Ok(response.has_conflict)
    }

    /// Fetch the provider's appointments on `date` that hold their slot.
    /// Only `scheduled` and `confirmed` block the calendar; cancelled,
    /// completed and no-show never do. Shared with slot calculation so
    /// both see the same set.
    pub async fn blocking_appointments_for_date(
        &self,
        provider_id: Uuid,
        date: NaiveDate,
        exclude_appointment_id: Option<Uuid>,
        auth_token: Option<&str>,
    ) -> Result<Vec<Appointment>, BookingError> {
        let mut query_parts = vec![
            format!("provider_id=eq.{}", provider_id),
            format!("date=eq.{}", date),
            "status=in.(scheduled,confirmed)".to_string(),
        ];

        if let Some(exclude_id) = exclude_appointment_id {
            query_parts.push(format!("id=neq.{}", exclude_id));
        }

        let path = format!(
            "/rest/v1/appointments?{}&order=start_time.asc",
            query_parts.join("&")
        );

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, auth_token, None)
            .await
            .map_err(|e| BookingError::DatabaseError(e.to_string()))?;

        let appointments: Vec<Appointment> = result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Appointment>, _>>()
            .map_err(|e| BookingError::DatabaseError(format!("Failed to parse appointments: {}", e)))?;

        Ok(appointments)
    }
}
