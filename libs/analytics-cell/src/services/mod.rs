// libs/analytics-cell/src/services/mod.rs

pub mod analytics;

pub use analytics::AnalyticsService;
