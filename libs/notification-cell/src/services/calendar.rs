// libs/notification-cell/src/services/calendar.rs
use reqwest::Client;
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;

use crate::models::{AppointmentNotificationContext, SendOutcome};

/// Client for the external calendar service. Events are keyed by
/// appointment id so create/update/delete stay idempotent on our side.
pub struct CalendarClient {
    client: Client,
    api_url: String,
    api_token: String,
    configured: bool,
}

impl CalendarClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            api_url: config.calendar_api_url.clone(),
            api_token: config.calendar_api_token.clone(),
            configured: config.is_calendar_configured(),
        }
    }

    pub async fn create_event(&self, ctx: &AppointmentNotificationContext) -> SendOutcome {
        if !self.configured {
            debug!("Calendar sync not configured, skipping create");
            return SendOutcome::failed("Calendar sync is not configured");
        }

        let url = format!("{}/events", self.api_url);
        self.post_event(&url, reqwest::Method::POST, ctx).await
    }

    pub async fn update_event(&self, ctx: &AppointmentNotificationContext) -> SendOutcome {
        if !self.configured {
            debug!("Calendar sync not configured, skipping update");
            return SendOutcome::failed("Calendar sync is not configured");
        }

        let url = format!("{}/events/{}", self.api_url, ctx.appointment_id);
        self.post_event(&url, reqwest::Method::PUT, ctx).await
    }

    pub async fn delete_event(&self, appointment_id: Uuid) -> SendOutcome {
        if !self.configured {
            debug!("Calendar sync not configured, skipping delete");
            return SendOutcome::failed("Calendar sync is not configured");
        }

        let url = format!("{}/events/{}", self.api_url, appointment_id);

        let response = self
            .client
            .delete(&url)
            .header("Authorization", format!("Bearer {}", self.api_token))
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => {
                info!("Calendar event deleted for appointment {}", appointment_id);
                SendOutcome::ok()
            }
            Ok(resp) => {
                let status = resp.status();
                warn!("Calendar API rejected delete: {}", status);
                SendOutcome::failed(format!("HTTP {}", status))
            }
            Err(e) => {
                warn!("Calendar API unreachable: {}", e);
                SendOutcome::failed(e.to_string())
            }
        }
    }

    async fn post_event(
        &self,
        url: &str,
        method: reqwest::Method,
        ctx: &AppointmentNotificationContext,
    ) -> SendOutcome {
        let payload = json!({
            "external_id": ctx.appointment_id,
            "title": format!("{} - {}", ctx.service_name, ctx.provider_name),
            "date": ctx.date,
            "start_time": ctx.start_time,
            "end_time": ctx.end_time,
        });

        debug!("Syncing calendar event for appointment {}", ctx.appointment_id);

        let response = self
            .client
            .request(method, url)
            .header("Authorization", format!("Bearer {}", self.api_token))
            .json(&payload)
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => {
                info!("Calendar event synced for appointment {}", ctx.appointment_id);
                SendOutcome::ok()
            }
            Ok(resp) => {
                let status = resp.status();
                let text = resp.text().await.unwrap_or_default();
                warn!("Calendar API rejected event: {} - {}", status, text);
                SendOutcome::failed(format!("HTTP {}: {}", status, text))
            }
            Err(e) => {
                warn!("Calendar API unreachable: {}", e);
                SendOutcome::failed(e.to_string())
            }
        }
    }
}
