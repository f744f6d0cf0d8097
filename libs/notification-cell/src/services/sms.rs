// libs/notification-cell/src/services/sms.rs
use base64::{engine::general_purpose, Engine as _};
use reqwest::Client;
use tracing::{debug, info, warn};

use shared_config::AppConfig;

use crate::models::SendOutcome;

/// SMS delivery through the Twilio Messages API.
pub struct SmsSender {
    client: Client,
    base_url: String,
    account_sid: String,
    auth_token: String,
    from_number: String,
    configured: bool,
}

impl SmsSender {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.twilio_base_url.clone(),
            account_sid: config.twilio_account_sid.clone(),
            auth_token: config.twilio_auth_token.clone(),
            from_number: config.twilio_from_number.clone(),
            configured: config.is_sms_configured(),
        }
    }

    /// Send one SMS. An unconfigured subsystem reports failure without
    /// making any network call.
    pub async fn send(&self, to: &str, body: &str) -> SendOutcome {
        if !self.configured {
            debug!("SMS delivery not configured, skipping send to {}", to);
            return SendOutcome::failed("SMS delivery is not configured");
        }

        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.base_url, self.account_sid
        );
        let credentials =
            general_purpose::STANDARD.encode(format!("{}:{}", self.account_sid, self.auth_token));
        let params = [
            ("From", self.from_number.as_str()),
            ("To", to),
            ("Body", body),
        ];

        debug!("Sending SMS to {} via {}", to, url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Basic {}", credentials))
            .form(&params)
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => {
                info!("SMS sent to {}", to);
                SendOutcome::ok()
            }
            Ok(resp) => {
                let status = resp.status();
                let text = resp.text().await.unwrap_or_default();
                warn!("SMS API rejected send to {}: {} - {}", to, status, text);
                SendOutcome::failed(format!("HTTP {}: {}", status, text))
            }
            Err(e) => {
                warn!("SMS API unreachable: {}", e);
                SendOutcome::failed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_utils::test_utils::TestConfig;

    #[tokio::test]
    async fn test_unconfigured_sender_fails_without_calling_out() {
        let mut config = TestConfig::default().to_app_config();
        config.twilio_account_sid = String::new();
        let sender = SmsSender::new(&config);

        let outcome = sender.send("+15551230000", "Reminder").await;

        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("not configured"));
    }
}
