// libs/booking-cell/src/services/slots.rs
use chrono::{Duration as ChronoDuration, NaiveDate, NaiveDateTime, NaiveTime};
use tracing::debug;
use uuid::Uuid;

use std::sync::Arc;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use provider_cell::services::AvailabilityService;
use provider_cell::models::ProviderError;

use crate::models::{BookingError, BookingPolicy, SlotEntry, SlotListResponse};
use crate::services::conflict::{intervals_overlap, ConflictDetectionService};

pub struct SlotCalculationService {
    availability_service: AvailabilityService,
    conflict_service: ConflictDetectionService,
    policy: BookingPolicy,
}

impl SlotCalculationService {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));

        Self {
            availability_service: AvailabilityService::new(config),
            conflict_service: ConflictDetectionService::new(supabase),
            policy: BookingPolicy::default(),
        }
    }

    /// Calculate the bookable day view for a provider: every candidate
    /// start at the policy granularity, individually marked. Candidates
    /// are marked unavailable, never filtered, so clients can render the
    /// full grid.
    pub async fn get_available_slots(
        &self,
        provider_id: Uuid,
        date: NaiveDate,
        service_duration_minutes: i32,
        now: NaiveDateTime,
        auth_token: Option<&str>,
    ) -> Result<SlotListResponse, BookingError> {
        if service_duration_minutes <= 0 {
            return Err(BookingError::ValidationError(
                "Service duration must be positive".to_string(),
            ));
        }

        debug!(
            "Calculating slots for provider {} on {} ({} minute service)",
            provider_id, date, service_duration_minutes
        );

        let window = self
            .availability_service
            .availability_for_date(&provider_id.to_string(), date, auth_token)
            .await
            .map_err(map_provider_error)?;

        let Some(window) = window else {
            return Ok(SlotListResponse {
                provider_id,
                date,
                available: false,
                slots: vec![],
                message: Some("Provider is not available on this day".to_string()),
            });
        };

        let blocking = self
            .conflict_service
            .blocking_appointments_for_date(provider_id, date, None, auth_token)
            .await?;

        let busy: Vec<(NaiveTime, NaiveTime)> = blocking
            .iter()
            .map(|apt| (apt.start_time, apt.end_time))
            .collect();

        // Slots earlier than the current time are unbookable today.
        let cutoff = if date == now.date() {
            Some(now.time())
        } else {
            None
        };

        let slots = generate_slots(
            window.start_time,
            window.end_time,
            service_duration_minutes as i64,
            self.policy.slot_granularity_minutes,
            &busy,
            cutoff,
        );

        Ok(SlotListResponse {
            provider_id,
            date,
            available: true,
            slots,
            message: None,
        })
    }
}

fn map_provider_error(err: ProviderError) -> BookingError {
    match err {
        ProviderError::DatabaseError(e) => BookingError::DatabaseError(e),
        other => BookingError::DatabaseError(other.to_string()),
    }
}

/// Generate candidate starts from `window_start` while the whole service
/// still fits before `window_end`, stepping at `granularity_minutes`.
/// A candidate is available when `[candidate, candidate + duration)`
/// overlaps no busy interval and, when a cutoff is given (same-day
/// requests), the candidate is strictly after it.
pub fn generate_slots(
    window_start: NaiveTime,
    window_end: NaiveTime,
    duration_minutes: i64,
    granularity_minutes: i64,
    busy: &[(NaiveTime, NaiveTime)],
    cutoff: Option<NaiveTime>,
) -> Vec<SlotEntry> {
    let duration = ChronoDuration::minutes(duration_minutes);
    let step = ChronoDuration::minutes(granularity_minutes);

    let mut slots = Vec::new();
    let mut candidate = window_start;

    loop {
        // NaiveTime arithmetic wraps at midnight; a wrapped end means the
        // service no longer fits in the day.
        let (slot_end, wrapped) = candidate.overflowing_add_signed(duration);
        if wrapped != 0 || slot_end > window_end {
            break;
        }

        let occupied = busy
            .iter()
            .any(|(busy_start, busy_end)| {
                intervals_overlap(candidate, slot_end, *busy_start, *busy_end)
            });

        let too_soon = cutoff.is_some_and(|c| candidate <= c);

        slots.push(SlotEntry {
            time: candidate,
            available: !occupied && !too_soon,
        });

        let (next, wrapped) = candidate.overflowing_add_signed(step);
        if wrapped != 0 {
            break;
        }
        candidate = next;
    }

    slots
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_open_day_generates_grid() {
        // 09:00-17:00, 60 minute service, 15 minute steps.
        // Last viable start is 16:00.
        let slots = generate_slots(t(9, 0), t(17, 0), 60, 15, &[], None);

        assert_eq!(slots.first().map(|s| s.time), Some(t(9, 0)));
        assert_eq!(slots.last().map(|s| s.time), Some(t(16, 0)));
        assert_eq!(slots.len(), 29);
        assert!(slots.iter().all(|s| s.available));
    }

    #[test]
    fn test_booked_interval_marks_overlapping_candidates() {
        // Existing booking 10:00-11:00; 60 minute service.
        let busy = vec![(t(10, 0), t(11, 0))];
        let slots = generate_slots(t(9, 0), t(17, 0), 60, 15, &busy, None);

        let available_at = |time: NaiveTime| {
            slots
                .iter()
                .find(|s| s.time == time)
                .map(|s| s.available)
                .unwrap()
        };

        // 09:00 ends exactly at the booking start: free.
        assert!(available_at(t(9, 0)));
        // 09:15 through 10:45 all overlap 10:00-11:00.
        assert!(!available_at(t(9, 15)));
        assert!(!available_at(t(9, 30)));
        assert!(!available_at(t(10, 0)));
        assert!(!available_at(t(10, 30)));
        assert!(!available_at(t(10, 45)));
        // 11:00 starts exactly at the booking end: free.
        assert!(available_at(t(11, 0)));
    }

    #[test]
    fn test_longer_duration_only_loses_availability() {
        let busy = vec![(t(10, 0), t(11, 0)), (t(14, 30), t(15, 0))];
        let short = generate_slots(t(9, 0), t(17, 0), 30, 15, &busy, None);
        let long = generate_slots(t(9, 0), t(17, 0), 90, 15, &busy, None);

        for slot in &long {
            if slot.available {
                let same = short.iter().find(|s| s.time == slot.time).unwrap();
                assert!(
                    same.available,
                    "slot {} available for 90min but not for 30min",
                    slot.time
                );
            }
        }
        // And the long grid is a prefix of the short one.
        assert!(long.len() <= short.len());
    }

    #[test]
    fn test_same_day_cutoff_disables_past_candidates() {
        let slots = generate_slots(t(9, 0), t(17, 0), 30, 15, &[], Some(t(12, 0)));

        let available_at = |time: NaiveTime| {
            slots
                .iter()
                .find(|s| s.time == time)
                .map(|s| s.available)
                .unwrap()
        };

        assert!(!available_at(t(9, 0)));
        // A candidate exactly at the cutoff is not bookable either.
        assert!(!available_at(t(12, 0)));
        assert!(available_at(t(12, 15)));
    }

    #[test]
    fn test_duration_longer_than_window_yields_no_slots() {
        let slots = generate_slots(t(9, 0), t(10, 0), 90, 15, &[], None);
        assert!(slots.is_empty());
    }

    #[test]
    fn test_window_near_midnight_does_not_wrap() {
        let slots = generate_slots(t(23, 0), t(23, 45), 30, 15, &[], None);
        assert_eq!(slots.len(), 2);
        assert_eq!(slots.last().map(|s| s.time), Some(t(23, 15)));
    }
}
