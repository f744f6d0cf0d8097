// libs/notification-cell/src/services/email.rs
use reqwest::Client;
use serde_json::json;
use tracing::{debug, info, warn};

use shared_config::AppConfig;

use crate::models::SendOutcome;

/// Transactional email delivery over a JSON HTTP API.
pub struct EmailSender {
    client: Client,
    api_url: String,
    api_key: String,
    from_address: String,
    configured: bool,
}

impl EmailSender {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            api_url: config.email_api_url.clone(),
            api_key: config.email_api_key.clone(),
            from_address: config.email_from_address.clone(),
            configured: config.is_email_configured(),
        }
    }

    /// Send one email. An unconfigured subsystem reports failure without
    /// making any network call.
    pub async fn send(&self, to: &str, subject: &str, body: &str) -> SendOutcome {
        if !self.configured {
            debug!("Email delivery not configured, skipping send to {}", to);
            return SendOutcome::failed("Email delivery is not configured");
        }

        let url = format!("{}/send", self.api_url);
        let payload = json!({
            "from": self.from_address,
            "to": to,
            "subject": subject,
            "text": body,
        });

        debug!("Sending email to {} via {}", to, url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&payload)
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => {
                info!("Email sent to {}: {}", to, subject);
                SendOutcome::ok()
            }
            Ok(resp) => {
                let status = resp.status();
                let text = resp.text().await.unwrap_or_default();
                warn!("Email API rejected send to {}: {} - {}", to, status, text);
                SendOutcome::failed(format!("HTTP {}: {}", status, text))
            }
            Err(e) => {
                warn!("Email API unreachable: {}", e);
                SendOutcome::failed(e.to_string())
            }
        }
    }
}
