use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put, delete},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn provider_routes(state: Arc<AppConfig>) -> Router {
    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/search", get(handlers::search_providers_public))
        .route("/slug/{slug}", get(handlers::get_provider_by_slug_public))
        .route("/{provider_id}", get(handlers::get_provider_public))
        .route("/{provider_id}/services", get(handlers::list_services_public))
        .route("/{provider_id}/availability", get(handlers::list_availability_public));

    // Protected routes (authentication required)
    let protected_routes = Router::new()
        // Provider profile management
        .route("/", post(handlers::create_provider))
        .route("/{provider_id}", put(handlers::update_provider))

        // Service catalog management
        .route("/{provider_id}/services", post(handlers::create_service))
        .route("/{provider_id}/services/{service_id}", put(handlers::update_service))
        .route("/{provider_id}/services/{service_id}", delete(handlers::deactivate_service))

        // Staff roster management
        .route("/{provider_id}/staff", post(handlers::add_staff_member))
        .route("/{provider_id}/staff", get(handlers::list_staff))
        .route("/{provider_id}/staff/{staff_id}", delete(handlers::remove_staff_member))

        // Weekly hours management
        .route("/{provider_id}/availability", post(handlers::set_availability))
        .route("/{provider_id}/availability/{availability_id}", delete(handlers::delete_availability))

        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
