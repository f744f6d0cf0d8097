// libs/payment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Query, State},
    http::HeaderMap,
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use booking_cell::models::BookingError;
use booking_cell::services::BookingService;

use crate::models::{CheckoutRequest, PaymentError, WebhookOutcome};
use crate::services::PaymentService;

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct QuoteQuery {
    pub service_id: Uuid,
    pub coupon_code: Option<String>,
}

// ==============================================================================
// ERROR MAPPING
// ==============================================================================

fn map_payment_error(err: PaymentError) -> AppError {
    match err {
        PaymentError::AppointmentNotFound => {
            AppError::NotFound("Appointment not found".to_string())
        }
        PaymentError::ServiceNotFound => AppError::NotFound("Service not found".to_string()),
        PaymentError::AlreadyPaid => {
            AppError::Conflict("Appointment is already paid".to_string())
        }
        PaymentError::SignatureInvalid => {
            AppError::BadRequest("Invalid webhook signature".to_string())
        }
        PaymentError::MalformedEvent(msg) => AppError::BadRequest(msg),
        PaymentError::InvalidCoupon(msg) => {
            AppError::BadRequest(format!("Invalid coupon: {}", msg))
        }
        PaymentError::ValidationError(msg) => AppError::BadRequest(msg),
        PaymentError::DatabaseError(msg) => AppError::Database(msg),
        PaymentError::ExternalServiceError(msg) => AppError::ExternalService(msg),
    }
}

// ==============================================================================
// HANDLERS
// ==============================================================================

/// POST /payments/checkout - Open a hosted checkout session for an appointment
#[axum::debug_handler]
pub async fn create_checkout_session(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    let booking_service = BookingService::new(&state);
    let appointment = booking_service
        .get_appointment(request.appointment_id, token)
        .await
        .map_err(|e| match e {
            BookingError::NotFound => AppError::NotFound("Appointment not found".to_string()),
            other => AppError::Database(other.to_string()),
        })?;

    let is_admin = user.role.as_deref() == Some("admin");
    if appointment.customer_id.to_string() != user.id && !is_admin {
        return Err(AppError::Forbidden(
            "Not authorized to pay for this appointment".to_string(),
        ));
    }

    let payment_service = PaymentService::new(&state);
    let (session, purpose) = payment_service
        .create_checkout(request.appointment_id, request.tip_amount, token)
        .await
        .map_err(map_payment_error)?;

    Ok(Json(json!({
        "url": session.url,
        "session_id": session.id,
        "purpose": purpose,
    })))
}

/// POST /payments/webhook - Receive payment vendor events
///
/// No bearer token here; the vendor authenticates with the signature
/// header. The raw body has to reach the verifier untouched, so this
/// takes `String` rather than a typed extractor.
#[axum::debug_handler]
pub async fn stripe_webhook(
    State(state): State<Arc<AppConfig>>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<Value>, AppError> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("Missing signature header".to_string()))?;

    let payment_service = PaymentService::new(&state);
    let outcome = payment_service
        .handle_webhook(&body, signature)
        .await
        .map_err(map_payment_error)?;

    match outcome {
        WebhookOutcome::DepositPaid(id) => info!("Webhook settled deposit for appointment {}", id),
        WebhookOutcome::BalancePaid(id) => info!("Webhook settled balance for appointment {}", id),
        WebhookOutcome::Ignored => {}
    }

    Ok(Json(json!({"received": true})))
}

/// GET /payments/quote - Price a service with optional coupon and deposit terms
#[axum::debug_handler]
pub async fn get_payment_quote(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<QuoteQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(_user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    let payment_service = PaymentService::new(&state);
    let quote = payment_service
        .quote(query.service_id, query.coupon_code.as_deref(), token)
        .await
        .map_err(map_payment_error)?;

    Ok(Json(json!(quote)))
}
