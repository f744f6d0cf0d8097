use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc, NaiveTime};

/// How much notice a provider requires before a fee-free cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancellationPolicy {
    Flexible,
    Moderate,
    Strict,
}

impl CancellationPolicy {
    pub fn notice_hours(&self) -> i64 {
        match self {
            CancellationPolicy::Flexible => 2,
            CancellationPolicy::Moderate => 24,
            CancellationPolicy::Strict => 48,
        }
    }
}

impl std::fmt::Display for CancellationPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CancellationPolicy::Flexible => write!(f, "flexible"),
            CancellationPolicy::Moderate => write!(f, "moderate"),
            CancellationPolicy::Strict => write!(f, "strict"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub business_name: String,
    pub description: Option<String>,
    pub phone: Option<String>,
    pub booking_slug: String,
    pub cancellation_policy: CancellationPolicy,
    pub average_rating: f64,
    pub review_count: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A bookable offering (cut, colour, manicure, ...). Inactive services
/// stay on record for old appointments but cannot be booked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub duration_minutes: i32,
    pub price: f64,
    pub category: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffMember {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub name: String,
    pub title: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// One weekly opening-hours row. `day_of_week` is 0 = Sunday through
/// 6 = Saturday; the slot calculator assumes at most one active row per
/// provider per weekday.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Availability {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub day_of_week: i32,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProviderRequest {
    pub business_name: String,
    pub description: Option<String>,
    pub phone: Option<String>,
    pub booking_slug: String,
    pub cancellation_policy: Option<CancellationPolicy>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateProviderRequest {
    pub business_name: Option<String>,
    pub description: Option<String>,
    pub phone: Option<String>,
    pub booking_slug: Option<String>,
    pub cancellation_policy: Option<CancellationPolicy>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateServiceRequest {
    pub name: String,
    pub description: Option<String>,
    pub duration_minutes: i32,
    pub price: f64,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateServiceRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub duration_minutes: Option<i32>,
    pub price: Option<f64>,
    pub category: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateStaffRequest {
    pub name: String,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetAvailabilityRequest {
    pub day_of_week: i32,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderSearchFilters {
    pub search: Option<String>,
    pub category: Option<String>,
    pub min_rating: Option<f64>,
}

// Error types specific to provider operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ProviderError {
    NotFound,
    ServiceNotFound,
    StaffNotFound,
    AvailabilityNotFound,
    SlugTaken(String),
    InvalidSlug(String),
    UnauthorizedAccess,
    ValidationError(String),
    DatabaseError(String),
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderError::NotFound => write!(f, "Provider not found"),
            ProviderError::ServiceNotFound => write!(f, "Service not found"),
            ProviderError::StaffNotFound => write!(f, "Staff member not found"),
            ProviderError::AvailabilityNotFound => write!(f, "Availability not found"),
            ProviderError::SlugTaken(slug) => write!(f, "Booking slug '{}' is already taken", slug),
            ProviderError::InvalidSlug(slug) => write!(f, "Invalid booking slug '{}'", slug),
            ProviderError::UnauthorizedAccess => write!(f, "Unauthorized access to provider data"),
            ProviderError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            ProviderError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
        }
    }
}

impl std::error::Error for ProviderError {}
