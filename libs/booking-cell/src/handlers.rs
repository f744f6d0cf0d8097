// libs/booking-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use chrono::{NaiveDate, Utc};
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use provider_cell::models::ProviderError;
use provider_cell::services::{CatalogService, ProviderService};

use crate::models::{
    Appointment, AppointmentSearchQuery, BookAppointmentRequest, BookingError,
    CancelAppointmentRequest, RescheduleAppointmentRequest, UpdateStatusRequest,
};
use crate::services::booking::BookingService;
use crate::services::slots::SlotCalculationService;

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct SlotQuery {
    pub provider_id: Uuid,
    pub date: NaiveDate,
    pub service_id: Uuid,
}

// ==============================================================================
// ERROR MAPPING
// ==============================================================================

fn map_booking_error(err: BookingError) -> AppError {
    match err {
        BookingError::NotFound => AppError::NotFound("Appointment not found".to_string()),
        BookingError::ProviderNotFound => AppError::NotFound("Provider not found".to_string()),
        BookingError::ServiceNotFound => AppError::NotFound("Service not found".to_string()),
        BookingError::ServiceNotBookable => {
            AppError::BadRequest("Service is not available for booking".to_string())
        }
        BookingError::InvalidTime(msg) => AppError::BadRequest(msg),
        BookingError::ConflictDetected => {
            AppError::Conflict("Appointment slot conflicts with an existing booking".to_string())
        }
        BookingError::InvalidStatusTransition(status) => {
            AppError::BadRequest(format!("Cannot modify appointment in status: {}", status))
        }
        BookingError::InvalidCoupon(msg) => AppError::BadRequest(format!("Invalid coupon: {}", msg)),
        BookingError::Unauthorized => {
            AppError::Forbidden("Not authorized to access this appointment".to_string())
        }
        BookingError::ValidationError(msg) => AppError::BadRequest(msg),
        BookingError::DatabaseError(msg) => AppError::Database(msg),
        BookingError::ExternalServiceError(msg) => AppError::ExternalService(msg),
    }
}

/// An appointment can be acted on by the customer who booked it, by the
/// owner of the provider's calendar and by admins.
async fn ensure_appointment_access(
    state: &Arc<AppConfig>,
    appointment: &Appointment,
    user: &User,
    auth_token: &str,
) -> Result<(), AppError> {
    if appointment.customer_id.to_string() == user.id {
        return Ok(());
    }
    if user.role.as_deref() == Some("admin") {
        return Ok(());
    }

    let provider_service = ProviderService::new(state);
    if let Ok(provider) = provider_service
        .get_provider(&appointment.provider_id.to_string(), Some(auth_token))
        .await
    {
        if provider.owner_id.to_string() == user.id {
            return Ok(());
        }
    }

    Err(AppError::Forbidden(
        "Not authorized to access this appointment".to_string(),
    ))
}

// ==============================================================================
// PUBLIC SLOT HANDLERS
// ==============================================================================

/// Bookable slots for a provider, date and service. Public so booking
/// pages can render before sign-in.
#[axum::debug_handler]
pub async fn get_available_slots_public(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<SlotQuery>,
) -> Result<Json<Value>, AppError> {
    let catalog_service = CatalogService::new(&state);

    let service = catalog_service
        .get_service(&query.service_id.to_string(), None)
        .await
        .map_err(|e| match e {
            ProviderError::ServiceNotFound | ProviderError::NotFound => {
                AppError::NotFound("Service not found".to_string())
            }
            other => AppError::Database(other.to_string()),
        })?;

    if service.provider_id != query.provider_id {
        return Err(AppError::BadRequest(
            "Service does not belong to this provider".to_string(),
        ));
    }
    if !service.is_active {
        return Err(AppError::BadRequest(
            "Service is not available for booking".to_string(),
        ));
    }

    let slot_service = SlotCalculationService::new(&state);
    let slots = slot_service
        .get_available_slots(
            query.provider_id,
            query.date,
            service.duration_minutes,
            Utc::now().naive_utc(),
            None,
        )
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!(slots)))
}

// ==============================================================================
// APPOINTMENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    let customer_id = Uuid::parse_str(&user.id)
        .map_err(|_| AppError::BadRequest("Invalid user ID".to_string()))?;

    let booking_service = BookingService::new(&state);

    let appointment = booking_service
        .book_appointment(customer_id, request, Utc::now().naive_utc(), token)
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment booked successfully"
    })))
}

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<Arc<AppConfig>>,
    Query(mut query): Query<AppointmentSearchQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let is_admin = user.role.as_deref() == Some("admin");

    // Non-admins see their own bookings, or their own provider calendar.
    if !is_admin {
        match query.provider_id {
            Some(provider_id) => {
                let provider_service = ProviderService::new(&state);
                let provider = provider_service
                    .get_provider(&provider_id.to_string(), Some(token))
                    .await
                    .map_err(|_| {
                        AppError::Forbidden(
                            "Not authorized to view this provider's appointments".to_string(),
                        )
                    })?;

                if provider.owner_id.to_string() != user.id {
                    return Err(AppError::Forbidden(
                        "Not authorized to view this provider's appointments".to_string(),
                    ));
                }
            }
            None => {
                let customer_id = Uuid::parse_str(&user.id)
                    .map_err(|_| AppError::BadRequest("Invalid user ID".to_string()))?;
                query.customer_id = Some(customer_id);
            }
        }
    }

    let booking_service = BookingService::new(&state);
    let appointments = booking_service
        .search_appointments(&query, token)
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let booking_service = BookingService::new(&state);

    let appointment = booking_service
        .get_appointment(appointment_id, token)
        .await
        .map_err(map_booking_error)?;

    ensure_appointment_access(&state, &appointment, &user, token).await?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn reschedule_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<RescheduleAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let booking_service = BookingService::new(&state);

    let appointment = booking_service
        .get_appointment(appointment_id, token)
        .await
        .map_err(map_booking_error)?;

    ensure_appointment_access(&state, &appointment, &user, token).await?;

    let rescheduled = booking_service
        .reschedule_appointment(appointment_id, request, Utc::now().naive_utc(), token)
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": rescheduled,
        "message": "Appointment rescheduled successfully"
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CancelAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let booking_service = BookingService::new(&state);

    let appointment = booking_service
        .get_appointment(appointment_id, token)
        .await
        .map_err(map_booking_error)?;

    ensure_appointment_access(&state, &appointment, &user, token).await?;

    let outcome = booking_service
        .cancel_appointment(appointment_id, &request, Utc::now().naive_utc(), token)
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": outcome.appointment,
        "late_cancellation": outcome.late_cancellation,
        "deposit_forfeited": outcome.deposit_forfeited,
        "message": "Appointment cancelled"
    })))
}

/// Providers move bookings through their lifecycle; customers use the
/// cancel endpoint instead.
#[axum::debug_handler]
pub async fn update_appointment_status(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let booking_service = BookingService::new(&state);

    let appointment = booking_service
        .get_appointment(appointment_id, token)
        .await
        .map_err(map_booking_error)?;

    let is_admin = user.role.as_deref() == Some("admin");
    if !is_admin {
        let provider_service = ProviderService::new(&state);
        let provider = provider_service
            .get_provider(&appointment.provider_id.to_string(), Some(token))
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if provider.owner_id.to_string() != user.id {
            return Err(AppError::Forbidden(
                "Only the provider can update appointment status".to_string(),
            ));
        }
    }

    let updated = booking_service
        .update_appointment_status(appointment_id, request.status, token)
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": updated,
        "message": "Appointment status updated"
    })))
}
