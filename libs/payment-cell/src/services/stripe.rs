use hmac::{Hmac, Mac};
use reqwest::Client;
use sha2::Sha256;
use tracing::{debug, error, info};
use uuid::Uuid;

use shared_config::AppConfig;

use crate::models::{CheckoutSession, PaymentError, PaymentPurpose};

type HmacSha256 = Hmac<Sha256>;

/// Convert a dollar amount to the integer minor units (cents) the
/// payment vendor expects on the wire.
pub fn to_minor_units(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

/// Verify a `t=<timestamp>,v1=<hex digest>` signature header against the
/// webhook secret. The signed payload is `"{timestamp}.{body}"`, so a
/// valid digest also pins the timestamp it was produced for.
pub fn verify_webhook_signature(
    payload: &str,
    signature_header: &str,
    secret: &str,
) -> Result<(), PaymentError> {
    let mut timestamp: Option<&str> = None;
    let mut candidates: Vec<&str> = Vec::new();

    for part in signature_header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => candidates.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(PaymentError::SignatureInvalid)?;
    if candidates.is_empty() {
        return Err(PaymentError::SignatureInvalid);
    }

    let signed_payload = format!("{}.{}", timestamp, payload);

    for candidate in candidates {
        let digest = match hex::decode(candidate) {
            Ok(bytes) => bytes,
            Err(_) => continue,
        };

        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|_| PaymentError::SignatureInvalid)?;
        mac.update(signed_payload.as_bytes());

        if mac.verify_slice(&digest).is_ok() {
            return Ok(());
        }
    }

    Err(PaymentError::SignatureInvalid)
}

/// Client for the payment vendor's hosted checkout API.
pub struct StripeClient {
    client: Client,
    base_url: String,
    secret_key: String,
    success_url: String,
    cancel_url: String,
    configured: bool,
}

impl StripeClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.stripe_base_url.clone(),
            secret_key: config.stripe_secret_key.clone(),
            success_url: config.checkout_success_url.clone(),
            cancel_url: config.checkout_cancel_url.clone(),
            configured: config.is_payments_configured(),
        }
    }

    /// Create a hosted checkout session for a single appointment charge.
    /// POST /checkout/sessions (form-encoded)
    pub async fn create_checkout_session(
        &self,
        appointment_id: Uuid,
        purpose: PaymentPurpose,
        description: &str,
        amount: f64,
        tip_amount: Option<f64>,
    ) -> Result<CheckoutSession, PaymentError> {
        if !self.configured {
            return Err(PaymentError::ExternalServiceError(
                "Payment processing is not configured".to_string(),
            ));
        }

        let url = format!("{}/checkout/sessions", self.base_url);

        let mut form: Vec<(&str, String)> = vec![
            ("mode", "payment".to_string()),
            ("success_url", self.success_url.clone()),
            ("cancel_url", self.cancel_url.clone()),
            ("line_items[0][price_data][currency]", "usd".to_string()),
            (
                "line_items[0][price_data][unit_amount]",
                to_minor_units(amount).to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]",
                description.to_string(),
            ),
            ("line_items[0][quantity]", "1".to_string()),
            ("metadata[appointment_id]", appointment_id.to_string()),
            ("metadata[purpose]", purpose.as_str().to_string()),
        ];

        if let Some(tip) = tip_amount {
            form.push(("metadata[tip_amount]", tip.to_string()));
        }

        debug!(
            "Creating {} checkout session for appointment {} at {}",
            purpose, appointment_id, url
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        let response_text = response.text().await?;

        if !status.is_success() {
            error!(
                "Checkout session creation failed: {} - {}",
                status, response_text
            );
            return Err(PaymentError::ExternalServiceError(format!(
                "Payment vendor returned HTTP {}",
                status
            )));
        }

        let session: CheckoutSession = serde_json::from_str(&response_text).map_err(|e| {
            PaymentError::ExternalServiceError(format!("Failed to parse checkout response: {}", e))
        })?;

        info!(
            "Created checkout session {} for appointment {}",
            session.id, appointment_id
        );
        Ok(session)
    }
}
