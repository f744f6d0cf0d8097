// libs/analytics-cell/src/models.rs
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ==============================================================================
// ANALYTICS MODELS
// ==============================================================================

/// Revenue and engagement summary for one provider over a date range,
/// computed on demand from their appointments and reviews.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderAnalytics {
    pub provider_id: Uuid,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub total_revenue: f64,
    pub total_tips: f64,
    pub total_bookings: i32,
    pub completed_bookings: i32,
    pub average_booking_value: f64,
    pub retention_rate: f64,
    pub cancellation_rate: f64,
    pub average_rating: f64,
    pub peak_hours: Vec<PeakHour>,
}

/// One hour-of-day bucket and how many bookings started in it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PeakHour {
    pub hour: u32,
    pub bookings: i32,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
