use std::sync::Arc;

use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use booking_cell::models::{Appointment, AppointmentStatus, BookingError, PaymentStatus};
use booking_cell::services::PricingService;
use provider_cell::models::ProviderError;
use provider_cell::services::CatalogService;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    CheckoutSession, PaymentError, PaymentPurpose, PaymentQuote, WebhookOutcome,
};
use crate::services::stripe::{verify_webhook_signature, StripeClient};

/// Orchestrates checkout sessions, webhook settlement and price quotes.
///
/// The webhook path is the only code that flips an appointment to paid;
/// checkout itself just hands the customer to the vendor's hosted page.
pub struct PaymentService {
    supabase: Arc<SupabaseClient>,
    stripe: StripeClient,
    pricing: PricingService,
    catalog: CatalogService,
    webhook_secret: String,
}

impl PaymentService {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));

        Self {
            stripe: StripeClient::new(config),
            pricing: PricingService::new(Arc::clone(&supabase)),
            catalog: CatalogService::new(config),
            webhook_secret: config.stripe_webhook_secret.clone(),
            supabase,
        }
    }

    // ==============================================================================
    // CHECKOUT
    // ==============================================================================

    /// Start a hosted checkout session for an appointment. Charges the
    /// outstanding deposit when one is owed, otherwise the full amount
    /// plus any tip the customer added.
    pub async fn create_checkout(
        &self,
        appointment_id: Uuid,
        tip_amount: Option<f64>,
        auth_token: &str,
    ) -> Result<(CheckoutSession, PaymentPurpose), PaymentError> {
        if let Some(tip) = tip_amount {
            if tip < 0.0 {
                return Err(PaymentError::ValidationError(
                    "Tip amount cannot be negative".to_string(),
                ));
            }
        }

        let appointment = self.fetch_appointment(appointment_id, auth_token).await?;

        if appointment.payment_status == PaymentStatus::Paid {
            return Err(PaymentError::AlreadyPaid);
        }
        if appointment.status == AppointmentStatus::Cancelled {
            return Err(PaymentError::ValidationError(
                "Cancelled appointments cannot be paid".to_string(),
            ));
        }

        let (purpose, amount, metadata_tip) =
            if appointment.deposit_required && !appointment.deposit_paid {
                let deposit = appointment.deposit_amount.ok_or_else(|| {
                    PaymentError::ValidationError(
                        "Appointment is missing its deposit amount".to_string(),
                    )
                })?;
                // Tips wait for the final charge
                (PaymentPurpose::Deposit, deposit, None)
            } else {
                let tip = tip_amount.filter(|t| *t > 0.0);
                let amount = appointment.amount + tip.unwrap_or(0.0);
                (PaymentPurpose::Balance, amount, tip)
            };

        let description = match purpose {
            PaymentPurpose::Deposit => "Booking deposit",
            PaymentPurpose::Balance => "Appointment payment",
        };

        let session = self
            .stripe
            .create_checkout_session(appointment_id, purpose, description, amount, metadata_tip)
            .await?;

        info!(
            "Checkout session {} opened for appointment {} ({}, ${:.2})",
            session.id, appointment_id, purpose, amount
        );

        Ok((session, purpose))
    }

    // ==============================================================================
    // WEBHOOK SETTLEMENT
    // ==============================================================================

    /// Verify and apply a payment vendor webhook. Only
    /// `checkout.session.completed` events mutate anything; everything
    /// else is acknowledged and dropped.
    pub async fn handle_webhook(
        &self,
        payload: &str,
        signature_header: &str,
    ) -> Result<WebhookOutcome, PaymentError> {
        verify_webhook_signature(payload, signature_header, &self.webhook_secret)?;

        let event: Value = serde_json::from_str(payload)
            .map_err(|e| PaymentError::MalformedEvent(format!("Invalid JSON: {}", e)))?;

        let event_type = event["type"].as_str().unwrap_or_default();
        if event_type != "checkout.session.completed" {
            debug!("Ignoring webhook event type '{}'", event_type);
            return Ok(WebhookOutcome::Ignored);
        }

        let metadata = &event["data"]["object"]["metadata"];

        let appointment_id = metadata["appointment_id"]
            .as_str()
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or_else(|| {
                PaymentError::MalformedEvent("Missing appointment_id in session metadata".to_string())
            })?;

        let purpose = metadata["purpose"]
            .as_str()
            .and_then(PaymentPurpose::parse)
            .ok_or_else(|| {
                PaymentError::MalformedEvent("Missing purpose in session metadata".to_string())
            })?;

        match purpose {
            PaymentPurpose::Deposit => {
                let mut updates = Map::new();
                updates.insert("deposit_paid".to_string(), json!(true));
                self.update_appointment_record(appointment_id, updates)
                    .await?;

                info!("Deposit recorded as paid for appointment {}", appointment_id);
                Ok(WebhookOutcome::DepositPaid(appointment_id))
            }
            PaymentPurpose::Balance => {
                let tip = metadata["tip_amount"]
                    .as_str()
                    .and_then(|s| s.parse::<f64>().ok());

                let mut updates = Map::new();
                updates.insert("payment_status".to_string(), json!("paid"));
                if let Some(tip) = tip {
                    updates.insert("tip_amount".to_string(), json!(tip));
                }
                self.update_appointment_record(appointment_id, updates)
                    .await?;

                info!("Payment recorded for appointment {}", appointment_id);
                Ok(WebhookOutcome::BalancePaid(appointment_id))
            }
        }
    }

    // ==============================================================================
    // QUOTES
    // ==============================================================================

    /// Price a service before booking: list price, coupon-adjusted amount
    /// due, and the deposit terms the booking will carry.
    pub async fn quote(
        &self,
        service_id: Uuid,
        coupon_code: Option<&str>,
        auth_token: &str,
    ) -> Result<PaymentQuote, PaymentError> {
        let service = self
            .catalog
            .get_service(&service_id.to_string(), Some(auth_token))
            .await
            .map_err(|e| match e {
                ProviderError::ServiceNotFound => PaymentError::ServiceNotFound,
                other => PaymentError::DatabaseError(other.to_string()),
            })?;

        let deposit = self.pricing.deposit_terms(service.price);

        let mut amount_due = service.price;
        let mut applied_code = None;

        if let Some(code) = coupon_code {
            let coupon = self
                .pricing
                .validate_coupon(service.provider_id, code, service.price, Utc::now(), Some(auth_token))
                .await
                .map_err(|e| match e {
                    BookingError::InvalidCoupon(msg) => PaymentError::InvalidCoupon(msg),
                    other => PaymentError::DatabaseError(other.to_string()),
                })?;

            amount_due = self.pricing.apply_coupon(&coupon, service.price);
            applied_code = Some(coupon.code);
        }

        Ok(PaymentQuote {
            service_id,
            list_price: service.price,
            amount_due,
            coupon_code: applied_code,
            deposit_required: deposit.required,
            deposit_amount: deposit.amount,
        })
    }

    // ==============================================================================
    // PRIVATE HELPER METHODS
    // ==============================================================================

    async fn fetch_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, PaymentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| PaymentError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(PaymentError::AppointmentNotFound);
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| PaymentError::DatabaseError(format!("Failed to parse appointment: {}", e)))
    }

    /// Webhook writes run without a user token: the vendor is the
    /// caller, so the update goes through the service's own key.
    async fn update_appointment_record(
        &self,
        appointment_id: Uuid,
        mut updates: Map<String, Value>,
    ) -> Result<Appointment, PaymentError> {
        updates.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                None,
                Some(Value::Object(updates)),
                Some(headers),
            )
            .await
            .map_err(|e| PaymentError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            warn!(
                "Webhook referenced appointment {} but no row was updated",
                appointment_id
            );
            return Err(PaymentError::AppointmentNotFound);
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| PaymentError::DatabaseError(format!("Failed to parse appointment: {}", e)))
    }
}
