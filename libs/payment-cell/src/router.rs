use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn payment_routes(state: Arc<AppConfig>) -> Router {
    // Public routes (no authentication required)
    // The webhook authenticates with its signature header instead.
    let public_routes = Router::new().route("/webhook", post(handlers::stripe_webhook));

    // Protected routes (authentication required)
    let protected_routes = Router::new()
        .route("/checkout", post(handlers::create_checkout_session))
        .route("/quote", get(handlers::get_payment_quote))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
