// libs/notification-cell/src/services/notification.rs
use chrono::NaiveDateTime;
use tracing::debug;
use uuid::Uuid;

use std::sync::Arc;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{AppointmentNotificationContext, CalendarSyncAction, SendOutcome};
use crate::services::calendar::CalendarClient;
use crate::services::email::EmailSender;
use crate::services::reminders::ReminderScheduler;
use crate::services::sms::SmsSender;

/// Facade over every outbound channel. Booking flows call one method
/// per event and treat the returned outcomes as advisory.
pub struct NotificationService {
    email: EmailSender,
    sms: SmsSender,
    calendar: CalendarClient,
    reminders: ReminderScheduler,
}

impl NotificationService {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));

        Self {
            email: EmailSender::new(config),
            sms: SmsSender::new(config),
            calendar: CalendarClient::new(config),
            reminders: ReminderScheduler::new(supabase),
        }
    }

    pub async fn send_booking_confirmation(
        &self,
        ctx: &AppointmentNotificationContext,
    ) -> Vec<SendOutcome> {
        let subject = format!("Booking confirmed: {}", ctx.service_name);
        let body = format!(
            "Your {} appointment with {} is confirmed for {}.",
            ctx.service_name,
            ctx.provider_name,
            ctx.when()
        );
        let sms_body = format!(
            "Confirmed: {} with {} on {}.",
            ctx.service_name,
            ctx.provider_name,
            ctx.when()
        );

        self.send_to_customer(ctx, &subject, &body, &sms_body).await
    }

    pub async fn send_reschedule_notice(
        &self,
        ctx: &AppointmentNotificationContext,
    ) -> Vec<SendOutcome> {
        let subject = format!("Booking rescheduled: {}", ctx.service_name);
        let body = format!(
            "Your {} appointment with {} has been moved to {}.",
            ctx.service_name,
            ctx.provider_name,
            ctx.when()
        );
        let sms_body = format!(
            "Rescheduled: {} with {} now on {}.",
            ctx.service_name,
            ctx.provider_name,
            ctx.when()
        );

        self.send_to_customer(ctx, &subject, &body, &sms_body).await
    }

    pub async fn send_cancellation_notice(
        &self,
        ctx: &AppointmentNotificationContext,
    ) -> Vec<SendOutcome> {
        let subject = format!("Booking cancelled: {}", ctx.service_name);
        let body = format!(
            "Your {} appointment with {} on {} has been cancelled.",
            ctx.service_name,
            ctx.provider_name,
            ctx.when()
        );
        let sms_body = format!(
            "Cancelled: {} with {} on {}.",
            ctx.service_name,
            ctx.provider_name,
            ctx.when()
        );

        self.send_to_customer(ctx, &subject, &body, &sms_body).await
    }

    pub async fn schedule_appointment_reminders(
        &self,
        appointment_id: Uuid,
        customer_id: Uuid,
        start: NaiveDateTime,
        now: NaiveDateTime,
        auth_token: &str,
    ) -> SendOutcome {
        self.reminders
            .schedule_for_appointment(appointment_id, customer_id, start, now, auth_token)
            .await
    }

    pub async fn reschedule_appointment_reminders(
        &self,
        appointment_id: Uuid,
        customer_id: Uuid,
        new_start: NaiveDateTime,
        now: NaiveDateTime,
        auth_token: &str,
    ) -> SendOutcome {
        self.reminders
            .reschedule_for_appointment(appointment_id, customer_id, new_start, now, auth_token)
            .await
    }

    pub async fn cancel_appointment_reminders(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> SendOutcome {
        self.reminders
            .cancel_for_appointment(appointment_id, auth_token)
            .await
    }

    pub async fn sync_calendar_event(
        &self,
        ctx: &AppointmentNotificationContext,
        action: CalendarSyncAction,
    ) -> SendOutcome {
        match action {
            CalendarSyncAction::Create => self.calendar.create_event(ctx).await,
            CalendarSyncAction::Update => self.calendar.update_event(ctx).await,
            CalendarSyncAction::Delete => self.calendar.delete_event(ctx.appointment_id).await,
        }
    }

    async fn send_to_customer(
        &self,
        ctx: &AppointmentNotificationContext,
        subject: &str,
        body: &str,
        sms_body: &str,
    ) -> Vec<SendOutcome> {
        let mut outcomes = Vec::with_capacity(2);

        match ctx.customer_email.as_deref() {
            Some(email) => outcomes.push(self.email.send(email, subject, body).await),
            None => {
                debug!("No email on file for customer {}", ctx.customer_id);
                outcomes.push(SendOutcome::failed("No email address on file"));
            }
        }

        match ctx.customer_phone.as_deref() {
            Some(phone) => outcomes.push(self.sms.send(phone, sms_body).await),
            None => {
                debug!("No phone on file for customer {}", ctx.customer_id);
                outcomes.push(SendOutcome::failed("No phone number on file"));
            }
        }

        outcomes
    }
}
