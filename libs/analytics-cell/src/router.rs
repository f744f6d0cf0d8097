use std::sync::Arc;

use axum::{middleware, routing::get, Router};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn analytics_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(handlers::get_provider_analytics))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
