// libs/booking-cell/src/services/booking.rs
use chrono::{Duration as ChronoDuration, NaiveDateTime, NaiveTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use std::sync::Arc;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use provider_cell::models::ProviderError;
use provider_cell::services::{CatalogService, ProviderService};

use notification_cell::{
    AppointmentNotificationContext, CalendarSyncAction, NotificationService,
};

use crate::models::{
    Appointment, AppointmentSearchQuery, AppointmentStatus, BookAppointmentRequest,
    BookingError, BookingPolicy, CancelAppointmentRequest, CancellationOutcome,
    RescheduleAppointmentRequest,
};
use crate::services::conflict::ConflictDetectionService;
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::pricing::PricingService;

/// Booking lifecycle events that fan out to the notification channels.
enum BookingEvent {
    Created,
    Rescheduled,
    Cancelled,
}

pub struct BookingService {
    supabase: Arc<SupabaseClient>,
    conflict_service: ConflictDetectionService,
    lifecycle_service: AppointmentLifecycleService,
    pricing_service: PricingService,
    provider_service: ProviderService,
    catalog_service: CatalogService,
    notification_service: NotificationService,
    policy: BookingPolicy,
}

impl BookingService {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));

        Self {
            conflict_service: ConflictDetectionService::new(Arc::clone(&supabase)),
            lifecycle_service: AppointmentLifecycleService::new(),
            pricing_service: PricingService::new(Arc::clone(&supabase)),
            provider_service: ProviderService::new(config),
            catalog_service: CatalogService::new(config),
            notification_service: NotificationService::new(config),
            supabase,
            policy: BookingPolicy::default(),
        }
    }

    // ==============================================================================
    // BOOKING OPERATIONS
    // ==============================================================================

    /// Book an appointment for a customer. Validates the service, the
    /// requested time, and the provider's calendar before inserting with
    /// `status = scheduled` and `payment_status = pending`.
    pub async fn book_appointment(
        &self,
        customer_id: Uuid,
        request: BookAppointmentRequest,
        now: NaiveDateTime,
        auth_token: &str,
    ) -> Result<Appointment, BookingError> {
        info!(
            "Booking appointment for customer {} with provider {} on {} at {}",
            customer_id, request.provider_id, request.date, request.start_time
        );

        let provider = self
            .provider_service
            .get_provider(&request.provider_id.to_string(), Some(auth_token))
            .await
            .map_err(map_provider_lookup_error)?;

        let service = self
            .catalog_service
            .get_service(&request.service_id.to_string(), Some(auth_token))
            .await
            .map_err(map_service_lookup_error)?;

        if service.provider_id != request.provider_id || !service.is_active {
            return Err(BookingError::ServiceNotBookable);
        }

        let end_time = service_end_time(request.start_time, service.duration_minutes)?;
        self.validate_appointment_timing(request.date.and_time(request.start_time), now)?;

        let conflict = self
            .conflict_service
            .has_conflict(
                request.provider_id,
                request.date,
                request.start_time,
                end_time,
                None,
                Some(auth_token),
            )
            .await?;

        if conflict {
            return Err(BookingError::ConflictDetected);
        }

        let mut amount = service.price;
        let coupon = match &request.coupon_code {
            Some(code) => {
                let coupon = self
                    .pricing_service
                    .validate_coupon(
                        request.provider_id,
                        code,
                        service.price,
                        now.and_utc(),
                        Some(auth_token),
                    )
                    .await?;
                amount = self.pricing_service.apply_coupon(&coupon, service.price);
                Some(coupon)
            }
            None => None,
        };

        // Deposit policy keys off the listed service price, not the
        // discounted amount.
        let deposit = self.pricing_service.deposit_terms(service.price);

        let record = json!({
            "customer_id": customer_id,
            "provider_id": request.provider_id,
            "service_id": request.service_id,
            "staff_id": request.staff_id,
            "date": request.date,
            "start_time": request.start_time,
            "end_time": end_time,
            "status": AppointmentStatus::Scheduled,
            "payment_status": "pending",
            "amount": amount,
            "tip_amount": null,
            "deposit_required": deposit.required,
            "deposit_amount": deposit.amount,
            "deposit_paid": false,
            "cancellation_policy": provider.cancellation_policy,
            "notes": request.notes,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339(),
        });

        let appointment = self.create_appointment_record(record, auth_token).await?;

        if let Some(coupon) = coupon {
            if let Err(e) = self
                .pricing_service
                .record_coupon_use(&coupon, auth_token)
                .await
            {
                warn!("Failed to record coupon redemption for {}: {}", coupon.code, e);
            }
        }

        self.notify_booking_event(&appointment, BookingEvent::Created, now, auth_token)
            .await;

        info!(
            "Appointment {} booked for {} ({} - {})",
            appointment.id,
            appointment.date,
            appointment.start_time,
            appointment.end_time
        );

        Ok(appointment)
    }

    /// Move an appointment to a new date and time. The new slot is
    /// validated exactly like a fresh booking, with the appointment
    /// itself excluded from conflict detection.
    pub async fn reschedule_appointment(
        &self,
        appointment_id: Uuid,
        request: RescheduleAppointmentRequest,
        now: NaiveDateTime,
        auth_token: &str,
    ) -> Result<Appointment, BookingError> {
        info!(
            "Rescheduling appointment {} to {} at {}",
            appointment_id, request.new_date, request.new_start_time
        );

        let appointment = self.fetch_appointment(appointment_id, auth_token).await?;

        if appointment.status.is_terminal() {
            return Err(BookingError::InvalidStatusTransition(appointment.status));
        }

        let service = self
            .catalog_service
            .get_service(&appointment.service_id.to_string(), Some(auth_token))
            .await
            .map_err(map_service_lookup_error)?;

        let new_end_time = service_end_time(request.new_start_time, service.duration_minutes)?;
        self.validate_appointment_timing(request.new_date.and_time(request.new_start_time), now)?;

        let conflict = self
            .conflict_service
            .has_conflict(
                appointment.provider_id,
                request.new_date,
                request.new_start_time,
                new_end_time,
                Some(appointment_id),
                Some(auth_token),
            )
            .await?;

        if conflict {
            return Err(BookingError::ConflictDetected);
        }

        if let Some(reason) = &request.reason {
            debug!("Reschedule reason for {}: {}", appointment_id, reason);
        }

        let mut updates = Map::new();
        updates.insert("date".to_string(), json!(request.new_date));
        updates.insert("start_time".to_string(), json!(request.new_start_time));
        updates.insert("end_time".to_string(), json!(new_end_time));

        let updated = self
            .update_appointment_record(appointment_id, updates, auth_token)
            .await?;

        self.notify_booking_event(&updated, BookingEvent::Rescheduled, now, auth_token)
            .await;

        Ok(updated)
    }

    /// Cancel an appointment. A cancellation inside the provider's
    /// notice window still goes through, but forfeits any paid deposit
    /// and is flagged in the outcome.
    pub async fn cancel_appointment(
        &self,
        appointment_id: Uuid,
        request: &CancelAppointmentRequest,
        now: NaiveDateTime,
        auth_token: &str,
    ) -> Result<CancellationOutcome, BookingError> {
        info!("Cancelling appointment {}", appointment_id);

        let appointment = self.fetch_appointment(appointment_id, auth_token).await?;

        self.lifecycle_service
            .validate_status_transition(&appointment.status, &AppointmentStatus::Cancelled)?;

        let notice = ChronoDuration::hours(appointment.cancellation_policy.notice_hours());
        let late_cancellation = now > appointment.start_datetime() - notice;
        let deposit_forfeited = late_cancellation && appointment.deposit_paid;

        if let Some(reason) = &request.reason {
            debug!("Cancellation reason for {}: {}", appointment_id, reason);
        }
        if late_cancellation {
            info!(
                "Late cancellation of appointment {} ({}h notice policy)",
                appointment_id,
                appointment.cancellation_policy.notice_hours()
            );
        }

        let mut updates = Map::new();
        updates.insert("status".to_string(), json!(AppointmentStatus::Cancelled));

        let updated = self
            .update_appointment_record(appointment_id, updates, auth_token)
            .await?;

        self.notify_booking_event(&updated, BookingEvent::Cancelled, now, auth_token)
            .await;

        Ok(CancellationOutcome {
            appointment: updated,
            late_cancellation,
            deposit_forfeited,
        })
    }

    /// Apply a lifecycle status change (`confirmed`, `completed`,
    /// `no_show`, ...) guarded by the transition rules.
    pub async fn update_appointment_status(
        &self,
        appointment_id: Uuid,
        new_status: AppointmentStatus,
        auth_token: &str,
    ) -> Result<Appointment, BookingError> {
        let appointment = self.fetch_appointment(appointment_id, auth_token).await?;

        self.lifecycle_service
            .validate_status_transition(&appointment.status, &new_status)?;

        let mut updates = Map::new();
        updates.insert("status".to_string(), json!(new_status));

        let updated = self
            .update_appointment_record(appointment_id, updates, auth_token)
            .await?;

        info!(
            "Appointment {} moved from {} to {}",
            appointment_id, appointment.status, new_status
        );

        Ok(updated)
    }

    // ==============================================================================
    // QUERIES
    // ==============================================================================

    pub async fn get_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, BookingError> {
        self.fetch_appointment(appointment_id, auth_token).await
    }

    /// List appointments with optional filters, newest first.
    pub async fn search_appointments(
        &self,
        query: &AppointmentSearchQuery,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, BookingError> {
        let mut query_parts = Vec::new();

        if let Some(customer_id) = query.customer_id {
            query_parts.push(format!("customer_id=eq.{}", customer_id));
        }
        if let Some(provider_id) = query.provider_id {
            query_parts.push(format!("provider_id=eq.{}", provider_id));
        }
        if let Some(date) = query.date {
            query_parts.push(format!("date=eq.{}", date));
        }
        if let Some(status) = query.status {
            query_parts.push(format!("status=eq.{}", status));
        }

        query_parts.push("order=date.desc,start_time.desc".to_string());
        query_parts.push(format!("limit={}", query.limit.unwrap_or(50)));
        if let Some(offset) = query.offset {
            query_parts.push(format!("offset={}", offset));
        }

        let path = format!("/rest/v1/appointments?{}", query_parts.join("&"));

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| BookingError::DatabaseError(e.to_string()))?;

        let appointments: Vec<Appointment> = result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Appointment>, _>>()
            .map_err(|e| BookingError::DatabaseError(format!("Failed to parse appointments: {}", e)))?;

        Ok(appointments)
    }

    // ==============================================================================
    // VALIDATION
    // ==============================================================================

    /// Reject requested start datetimes in the past, inside the minimum
    /// lead time, or beyond the advance booking horizon.
    fn validate_appointment_timing(
        &self,
        start_datetime: NaiveDateTime,
        now: NaiveDateTime,
    ) -> Result<(), BookingError> {
        if start_datetime <= now {
            return Err(BookingError::InvalidTime(
                "Appointment must be scheduled for a future time".to_string(),
            ));
        }

        let earliest = now + ChronoDuration::hours(self.policy.min_lead_time_hours);
        if start_datetime <= earliest {
            return Err(BookingError::InvalidTime(format!(
                "Appointments must be booked at least {} hours in advance",
                self.policy.min_lead_time_hours
            )));
        }

        let horizon = now + ChronoDuration::days(self.policy.max_advance_days);
        if start_datetime > horizon {
            return Err(BookingError::InvalidTime(format!(
                "Appointments can be booked at most {} days ahead",
                self.policy.max_advance_days
            )));
        }

        Ok(())
    }

    // ==============================================================================
    // PRIVATE HELPER METHODS
    // ==============================================================================

    async fn fetch_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, BookingError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| BookingError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(BookingError::NotFound);
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| BookingError::DatabaseError(format!("Failed to parse appointment: {}", e)))
    }

    async fn create_appointment_record(
        &self,
        record: Value,
        auth_token: &str,
    ) -> Result<Appointment, BookingError> {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/appointments",
                Some(auth_token),
                Some(record),
                Some(headers),
            )
            .await
            .map_err(|e| BookingError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(BookingError::DatabaseError(
                "Failed to create appointment record".to_string(),
            ));
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| BookingError::DatabaseError(format!("Failed to parse appointment: {}", e)))
    }

    async fn update_appointment_record(
        &self,
        appointment_id: Uuid,
        mut updates: Map<String, Value>,
        auth_token: &str,
    ) -> Result<Appointment, BookingError> {
        updates.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(Value::Object(updates)),
                Some(headers),
            )
            .await
            .map_err(|e| BookingError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(BookingError::NotFound);
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| BookingError::DatabaseError(format!("Failed to parse appointment: {}", e)))
    }

    // ==============================================================================
    // NOTIFICATION SIDE EFFECTS
    // ==============================================================================

    /// Run the outbound side effects for a booking event. Everything
    /// here is best-effort: failures are logged and never change the
    /// booking outcome.
    async fn notify_booking_event(
        &self,
        appointment: &Appointment,
        event: BookingEvent,
        now: NaiveDateTime,
        auth_token: &str,
    ) {
        match event {
            BookingEvent::Created => {
                let reminders = self
                    .notification_service
                    .schedule_appointment_reminders(
                        appointment.id,
                        appointment.customer_id,
                        appointment.start_datetime(),
                        now,
                        auth_token,
                    )
                    .await;
                if !reminders.success {
                    warn!(
                        "Reminder scheduling failed for appointment {}: {:?}",
                        appointment.id, reminders.error
                    );
                }

                let Some(ctx) = self.notification_context(appointment, auth_token).await else {
                    return;
                };

                let calendar = self
                    .notification_service
                    .sync_calendar_event(&ctx, CalendarSyncAction::Create)
                    .await;
                if !calendar.success {
                    warn!(
                        "Calendar sync failed for appointment {}: {:?}",
                        appointment.id, calendar.error
                    );
                }

                for outcome in self.notification_service.send_booking_confirmation(&ctx).await {
                    if !outcome.success {
                        warn!(
                            "Confirmation delivery failed for appointment {}: {:?}",
                            appointment.id, outcome.error
                        );
                    }
                }
            }
            BookingEvent::Rescheduled => {
                let reminders = self
                    .notification_service
                    .reschedule_appointment_reminders(
                        appointment.id,
                        appointment.customer_id,
                        appointment.start_datetime(),
                        now,
                        auth_token,
                    )
                    .await;
                if !reminders.success {
                    warn!(
                        "Reminder rescheduling failed for appointment {}: {:?}",
                        appointment.id, reminders.error
                    );
                }

                let Some(ctx) = self.notification_context(appointment, auth_token).await else {
                    return;
                };

                let calendar = self
                    .notification_service
                    .sync_calendar_event(&ctx, CalendarSyncAction::Update)
                    .await;
                if !calendar.success {
                    warn!(
                        "Calendar sync failed for appointment {}: {:?}",
                        appointment.id, calendar.error
                    );
                }

                for outcome in self.notification_service.send_reschedule_notice(&ctx).await {
                    if !outcome.success {
                        warn!(
                            "Reschedule notice delivery failed for appointment {}: {:?}",
                            appointment.id, outcome.error
                        );
                    }
                }
            }
            BookingEvent::Cancelled => {
                let reminders = self
                    .notification_service
                    .cancel_appointment_reminders(appointment.id, auth_token)
                    .await;
                if !reminders.success {
                    warn!(
                        "Reminder cleanup failed for appointment {}: {:?}",
                        appointment.id, reminders.error
                    );
                }

                let Some(ctx) = self.notification_context(appointment, auth_token).await else {
                    return;
                };

                let calendar = self
                    .notification_service
                    .sync_calendar_event(&ctx, CalendarSyncAction::Delete)
                    .await;
                if !calendar.success {
                    warn!(
                        "Calendar cleanup failed for appointment {}: {:?}",
                        appointment.id, calendar.error
                    );
                }

                for outcome in self.notification_service.send_cancellation_notice(&ctx).await {
                    if !outcome.success {
                        warn!(
                            "Cancellation notice delivery failed for appointment {}: {:?}",
                            appointment.id, outcome.error
                        );
                    }
                }
            }
        }
    }

    /// Assemble the delivery context for an appointment. Returns `None`
    /// when the provider or service lookup fails; notifications are then
    /// skipped for this event.
    async fn notification_context(
        &self,
        appointment: &Appointment,
        auth_token: &str,
    ) -> Option<AppointmentNotificationContext> {
        let provider = match self
            .provider_service
            .get_provider(&appointment.provider_id.to_string(), Some(auth_token))
            .await
        {
            Ok(provider) => provider,
            Err(e) => {
                warn!(
                    "Skipping notifications for appointment {}: provider lookup failed: {}",
                    appointment.id, e
                );
                return None;
            }
        };

        let service = match self
            .catalog_service
            .get_service(&appointment.service_id.to_string(), Some(auth_token))
            .await
        {
            Ok(service) => service,
            Err(e) => {
                warn!(
                    "Skipping notifications for appointment {}: service lookup failed: {}",
                    appointment.id, e
                );
                return None;
            }
        };

        let (customer_email, customer_phone) = self
            .customer_contact(appointment.customer_id, auth_token)
            .await;

        Some(AppointmentNotificationContext {
            appointment_id: appointment.id,
            customer_id: appointment.customer_id,
            customer_email,
            customer_phone,
            provider_name: provider.business_name,
            service_name: service.name,
            date: appointment.date,
            start_time: appointment.start_time,
            end_time: appointment.end_time,
        })
    }

    /// Best-effort contact lookup from the customer's profile row.
    async fn customer_contact(
        &self,
        customer_id: Uuid,
        auth_token: &str,
    ) -> (Option<String>, Option<String>) {
        let path = format!(
            "/rest/v1/profiles?id=eq.{}&select=email,phone",
            customer_id
        );

        let result: Result<Vec<Value>, _> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await;

        match result {
            Ok(rows) => match rows.first() {
                Some(row) => (
                    row.get("email").and_then(Value::as_str).map(str::to_string),
                    row.get("phone").and_then(Value::as_str).map(str::to_string),
                ),
                None => (None, None),
            },
            Err(e) => {
                warn!("Contact lookup failed for customer {}: {}", customer_id, e);
                (None, None)
            }
        }
    }
}

fn map_provider_lookup_error(err: ProviderError) -> BookingError {
    match err {
        ProviderError::NotFound => BookingError::ProviderNotFound,
        ProviderError::DatabaseError(e) => BookingError::DatabaseError(e),
        other => BookingError::DatabaseError(other.to_string()),
    }
}

fn map_service_lookup_error(err: ProviderError) -> BookingError {
    match err {
        ProviderError::ServiceNotFound | ProviderError::NotFound => BookingError::ServiceNotFound,
        ProviderError::DatabaseError(e) => BookingError::DatabaseError(e),
        other => BookingError::DatabaseError(other.to_string()),
    }
}

/// Derive the end time from a start and a service duration. A service
/// that would run past midnight cannot be booked.
fn service_end_time(start: NaiveTime, duration_minutes: i32) -> Result<NaiveTime, BookingError> {
    if duration_minutes <= 0 {
        return Err(BookingError::ValidationError(
            "Service duration must be positive".to_string(),
        ));
    }

    let (end, wrapped) = start.overflowing_add_signed(ChronoDuration::minutes(duration_minutes as i64));
    if wrapped != 0 {
        return Err(BookingError::InvalidTime(
            "Appointment must end within the same day".to_string(),
        ));
    }

    Ok(end)
}
