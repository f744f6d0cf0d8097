use std::sync::Arc;

use axum::{
    extract::{Path, Query, State, Extension},
    Json,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde::Deserialize;
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    CreateProviderRequest, UpdateProviderRequest, ProviderSearchFilters,
    CreateServiceRequest, UpdateServiceRequest, CreateStaffRequest,
    SetAvailabilityRequest, Provider, ProviderError,
};
use crate::services::{AvailabilityService, CatalogService, ProviderService};

#[derive(Debug, Deserialize)]
pub struct ProviderSearchQuery {
    pub search: Option<String>,
    pub category: Option<String>,
    pub min_rating: Option<f64>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

fn map_provider_error(err: ProviderError) -> AppError {
    match err {
        ProviderError::NotFound => AppError::NotFound("Provider not found".to_string()),
        ProviderError::ServiceNotFound => AppError::NotFound("Service not found".to_string()),
        ProviderError::StaffNotFound => AppError::NotFound("Staff member not found".to_string()),
        ProviderError::AvailabilityNotFound => {
            AppError::NotFound("Availability entry not found".to_string())
        }
        ProviderError::SlugTaken(slug) => {
            AppError::Conflict(format!("Booking slug '{}' is already in use", slug))
        }
        ProviderError::InvalidSlug(msg) => AppError::ValidationError(msg),
        ProviderError::ValidationError(msg) => AppError::ValidationError(msg),
        ProviderError::UnauthorizedAccess => {
            AppError::Forbidden("Not authorized to manage this provider".to_string())
        }
        ProviderError::DatabaseError(msg) => AppError::Database(msg),
    }
}

// Fetches the provider and rejects callers who neither own it nor hold the
// admin role. Returns the provider so handlers can reuse the fetched row.
async fn ensure_provider_access(
    provider_service: &ProviderService,
    provider_id: &str,
    user: &User,
    token: &str,
) -> Result<Provider, AppError> {
    let provider = provider_service
        .get_provider(provider_id, Some(token))
        .await
        .map_err(map_provider_error)?;

    let is_admin = user.role.as_deref() == Some("admin");
    let is_owner = provider.owner_id.to_string() == user.id;

    if !is_admin && !is_owner {
        return Err(AppError::Forbidden(
            "Not authorized to manage this provider".to_string(),
        ));
    }

    Ok(provider)
}

// ==============================================================================
// PUBLIC HANDLERS (NO AUTHENTICATION REQUIRED)
// ==============================================================================

#[axum::debug_handler]
pub async fn search_providers_public(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<ProviderSearchQuery>,
) -> Result<Json<Value>, AppError> {
    let provider_service = ProviderService::new(&state);

    let filters = ProviderSearchFilters {
        search: query.search,
        category: query.category,
        min_rating: query.min_rating,
    };

    let providers = provider_service
        .search_providers(filters, None, query.limit, query.offset)
        .await
        .map_err(map_provider_error)?;

    Ok(Json(json!({
        "providers": providers,
        "total": providers.len()
    })))
}

#[axum::debug_handler]
pub async fn get_provider_public(
    State(state): State<Arc<AppConfig>>,
    Path(provider_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let provider_service = ProviderService::new(&state);

    let provider = provider_service
        .get_provider(&provider_id, None)
        .await
        .map_err(map_provider_error)?;

    Ok(Json(json!(provider)))
}

#[axum::debug_handler]
pub async fn get_provider_by_slug_public(
    State(state): State<Arc<AppConfig>>,
    Path(slug): Path<String>,
) -> Result<Json<Value>, AppError> {
    let provider_service = ProviderService::new(&state);

    let provider = provider_service
        .get_provider_by_slug(&slug, None)
        .await
        .map_err(map_provider_error)?;

    Ok(Json(json!(provider)))
}

#[axum::debug_handler]
pub async fn list_services_public(
    State(state): State<Arc<AppConfig>>,
    Path(provider_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let catalog_service = CatalogService::new(&state);

    let services = catalog_service
        .list_services(&provider_id, false, None)
        .await
        .map_err(map_provider_error)?;

    Ok(Json(json!({
        "services": services,
        "total": services.len()
    })))
}

#[axum::debug_handler]
pub async fn list_availability_public(
    State(state): State<Arc<AppConfig>>,
    Path(provider_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let availability_service = AvailabilityService::new(&state);

    let availability = availability_service
        .list_availability(&provider_id, None)
        .await
        .map_err(map_provider_error)?;

    Ok(Json(json!({
        "provider_id": provider_id,
        "availability": availability
    })))
}

// ==============================================================================
// PROTECTED PROVIDER PROFILE HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_provider(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateProviderRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    // Customers cannot open a provider profile
    let is_admin = user.role.as_deref() == Some("admin");
    let is_provider = user.role.as_deref() == Some("provider");

    if !is_admin && !is_provider {
        return Err(AppError::Forbidden(
            "Only provider accounts can create a provider profile".to_string(),
        ));
    }

    let owner_id = uuid::Uuid::parse_str(&user.id)
        .map_err(|_| AppError::BadRequest("Invalid user ID".to_string()))?;

    let provider_service = ProviderService::new(&state);

    let provider = provider_service
        .create_provider(owner_id, request, token)
        .await
        .map_err(map_provider_error)?;

    Ok(Json(json!(provider)))
}

#[axum::debug_handler]
pub async fn update_provider(
    State(state): State<Arc<AppConfig>>,
    Path(provider_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateProviderRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let provider_service = ProviderService::new(&state);

    ensure_provider_access(&provider_service, &provider_id, &user, token).await?;

    let updated = provider_service
        .update_provider(&provider_id, request, token)
        .await
        .map_err(map_provider_error)?;

    Ok(Json(json!(updated)))
}

// ==============================================================================
// SERVICE CATALOG HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_service(
    State(state): State<Arc<AppConfig>>,
    Path(provider_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateServiceRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let provider_service = ProviderService::new(&state);

    ensure_provider_access(&provider_service, &provider_id, &user, token).await?;

    let catalog_service = CatalogService::new(&state);

    let service = catalog_service
        .create_service(&provider_id, request, token)
        .await
        .map_err(map_provider_error)?;

    Ok(Json(json!(service)))
}

#[axum::debug_handler]
pub async fn update_service(
    State(state): State<Arc<AppConfig>>,
    Path((provider_id, service_id)): Path<(String, String)>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateServiceRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let provider_service = ProviderService::new(&state);

    ensure_provider_access(&provider_service, &provider_id, &user, token).await?;

    let catalog_service = CatalogService::new(&state);

    let updated = catalog_service
        .update_service(&provider_id, &service_id, request, token)
        .await
        .map_err(map_provider_error)?;

    Ok(Json(json!(updated)))
}

#[axum::debug_handler]
pub async fn deactivate_service(
    State(state): State<Arc<AppConfig>>,
    Path((provider_id, service_id)): Path<(String, String)>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let provider_service = ProviderService::new(&state);

    ensure_provider_access(&provider_service, &provider_id, &user, token).await?;

    let catalog_service = CatalogService::new(&state);

    catalog_service
        .deactivate_service(&provider_id, &service_id, token)
        .await
        .map_err(map_provider_error)?;

    Ok(Json(json!({ "success": true })))
}

// ==============================================================================
// STAFF HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn add_staff_member(
    State(state): State<Arc<AppConfig>>,
    Path(provider_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateStaffRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let provider_service = ProviderService::new(&state);

    ensure_provider_access(&provider_service, &provider_id, &user, token).await?;

    let catalog_service = CatalogService::new(&state);

    let staff = catalog_service
        .add_staff_member(&provider_id, request, token)
        .await
        .map_err(map_provider_error)?;

    Ok(Json(json!(staff)))
}

#[axum::debug_handler]
pub async fn list_staff(
    State(state): State<Arc<AppConfig>>,
    Path(provider_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let provider_service = ProviderService::new(&state);

    ensure_provider_access(&provider_service, &provider_id, &user, token).await?;

    let catalog_service = CatalogService::new(&state);

    let staff = catalog_service
        .list_staff(&provider_id, token)
        .await
        .map_err(map_provider_error)?;

    Ok(Json(json!({
        "staff": staff,
        "total": staff.len()
    })))
}

#[axum::debug_handler]
pub async fn remove_staff_member(
    State(state): State<Arc<AppConfig>>,
    Path((provider_id, staff_id)): Path<(String, String)>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let provider_service = ProviderService::new(&state);

    ensure_provider_access(&provider_service, &provider_id, &user, token).await?;

    let catalog_service = CatalogService::new(&state);

    catalog_service
        .remove_staff_member(&provider_id, &staff_id, token)
        .await
        .map_err(map_provider_error)?;

    Ok(Json(json!({ "success": true })))
}

// ==============================================================================
// AVAILABILITY HANDLERS (Provider Configuration)
// ==============================================================================

#[axum::debug_handler]
pub async fn set_availability(
    State(state): State<Arc<AppConfig>>,
    Path(provider_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<SetAvailabilityRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let provider_service = ProviderService::new(&state);

    ensure_provider_access(&provider_service, &provider_id, &user, token).await?;

    let availability_service = AvailabilityService::new(&state);

    let availability = availability_service
        .set_weekly_hours(&provider_id, request, token)
        .await
        .map_err(map_provider_error)?;

    Ok(Json(json!(availability)))
}

#[axum::debug_handler]
pub async fn delete_availability(
    State(state): State<Arc<AppConfig>>,
    Path((provider_id, availability_id)): Path<(String, String)>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let provider_service = ProviderService::new(&state);

    ensure_provider_access(&provider_service, &provider_id, &user, token).await?;

    let availability_service = AvailabilityService::new(&state);

    availability_service
        .deactivate_availability(&provider_id, &availability_id, token)
        .await
        .map_err(map_provider_error)?;

    Ok(Json(json!({ "success": true })))
}
