use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use analytics_cell::router::analytics_routes;
use booking_cell::router::appointment_routes;
use payment_cell::router::payment_routes;
use provider_cell::router::provider_routes;
use review_cell::router::review_routes;
use shared_config::AppConfig;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "BeautyBook API is running!" }))
        .nest("/providers", provider_routes(state.clone()))
        .nest("/appointments", appointment_routes(state.clone()))
        .nest("/reviews", review_routes(state.clone()))
        .nest("/analytics", analytics_routes(state.clone()))
        .nest("/payments", payment_routes(state.clone()))
}
