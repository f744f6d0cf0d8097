pub mod handlers;
pub mod router;
pub mod models;
pub mod services;

// Re-export all models and services for external use
pub use models::*;
pub use services::*;

// Specifically re-export the types other cells lean on
pub use models::{PeakHour, ProviderAnalytics};
