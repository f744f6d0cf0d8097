// libs/booking-cell/src/models.rs
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc, NaiveDate, NaiveDateTime, NaiveTime};
use std::fmt;

use provider_cell::models::CancellationPolicy;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub provider_id: Uuid,
    pub service_id: Uuid,
    pub staff_id: Option<Uuid>,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: AppointmentStatus,
    pub payment_status: PaymentStatus,
    pub amount: f64,
    pub tip_amount: Option<f64>,
    pub deposit_required: bool,
    pub deposit_amount: Option<f64>,
    pub deposit_paid: bool,
    pub cancellation_policy: CancellationPolicy,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// Combined start of the booked window. Times are half-open
    /// `[start_time, end_time)`.
    pub fn start_datetime(&self) -> NaiveDateTime {
        self.date.and_time(self.start_time)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    /// Terminal statuses admit no further transition.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Completed | AppointmentStatus::Cancelled)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::NoShow => write!(f, "no_show"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Refunded,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "pending"),
            PaymentStatus::Paid => write!(f, "paid"),
            PaymentStatus::Refunded => write!(f, "refunded"),
        }
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub provider_id: Uuid,
    pub service_id: Uuid,
    pub staff_id: Option<Uuid>,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub coupon_code: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleAppointmentRequest {
    pub new_date: NaiveDate,
    pub new_start_time: NaiveTime,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelAppointmentRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: AppointmentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentSearchQuery {
    pub customer_id: Option<Uuid>,
    pub provider_id: Option<Uuid>,
    pub date: Option<NaiveDate>,
    pub status: Option<AppointmentStatus>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

/// Outcome of a cancellation, including whether the notice window was
/// missed and a paid deposit forfeited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancellationOutcome {
    pub appointment: Appointment,
    pub late_cancellation: bool,
    pub deposit_forfeited: bool,
}

// ==============================================================================
// SLOT CALCULATION MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotEntry {
    pub time: NaiveTime,
    pub available: bool,
}

/// Calculated day view for a provider. `available: false` with empty
/// slots means the provider is closed that day; otherwise every
/// candidate start is listed and individually marked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotListResponse {
    pub provider_id: Uuid,
    pub date: NaiveDate,
    pub available: bool,
    pub slots: Vec<SlotEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// ==============================================================================
// CONFLICT DETECTION MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictCheckResponse {
    pub has_conflict: bool,
    pub conflicting_appointments: Vec<Appointment>,
}

// ==============================================================================
// PRICING MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coupon {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: f64,
    pub min_amount: Option<f64>,
    pub max_uses: Option<i32>,
    pub times_used: i32,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    Percentage,
    Fixed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum MembershipTier {
    Bronze,
    Silver,
    Gold,
    Platinum,
}

impl MembershipTier {
    pub fn points_multiplier(&self) -> f64 {
        match self {
            MembershipTier::Bronze => 1.0,
            MembershipTier::Silver => 1.25,
            MembershipTier::Gold => 1.5,
            MembershipTier::Platinum => 2.0,
        }
    }
}

impl fmt::Display for MembershipTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MembershipTier::Bronze => write!(f, "bronze"),
            MembershipTier::Silver => write!(f, "silver"),
            MembershipTier::Gold => write!(f, "gold"),
            MembershipTier::Platinum => write!(f, "platinum"),
        }
    }
}

/// Deposit terms for one appointment, derived from the service price.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DepositTerms {
    pub required: bool,
    pub amount: Option<f64>,
}

// ==============================================================================
// BOOKING POLICY
// ==============================================================================

#[derive(Debug, Clone)]
pub struct BookingPolicy {
    pub min_lead_time_hours: i64,
    pub max_advance_days: i64,
    pub slot_granularity_minutes: i64,
}

impl Default for BookingPolicy {
    fn default() -> Self {
        Self {
            min_lead_time_hours: 2,
            max_advance_days: 90,
            slot_granularity_minutes: 15,
        }
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum BookingError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Provider not found")]
    ProviderNotFound,

    #[error("Service not found")]
    ServiceNotFound,

    #[error("Service cannot be booked")]
    ServiceNotBookable,

    #[error("Invalid appointment time: {0}")]
    InvalidTime(String),

    #[error("Appointment conflicts with existing booking")]
    ConflictDetected,

    #[error("Appointment cannot be modified in current status: {0}")]
    InvalidStatusTransition(AppointmentStatus),

    #[error("Invalid coupon: {0}")]
    InvalidCoupon(String),

    #[error("Unauthorized access to appointment")]
    Unauthorized,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("External service error: {0}")]
    ExternalServiceError(String),
}
