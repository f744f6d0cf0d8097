// libs/analytics-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use chrono::NaiveDate;
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use provider_cell::services::ProviderService;
use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::AnalyticsError;
use crate::services::AnalyticsService;

#[derive(Debug, Deserialize)]
pub struct AnalyticsQuery {
    pub provider_id: Uuid,
    pub from: NaiveDate,
    pub to: NaiveDate,
}

fn map_analytics_error(err: AnalyticsError) -> AppError {
    match err {
        AnalyticsError::ValidationError(msg) => AppError::BadRequest(msg),
        AnalyticsError::DatabaseError(msg) => AppError::Database(msg),
    }
}

/// Providers see their own numbers; admins see everyone's.
#[axum::debug_handler]
pub async fn get_provider_analytics(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<AnalyticsQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    if user.role.as_deref() != Some("admin") {
        let provider_service = ProviderService::new(&state);
        let provider = provider_service
            .get_provider(&query.provider_id.to_string(), Some(token))
            .await
            .map_err(|_| {
                AppError::Forbidden("Not authorized to view this provider's analytics".to_string())
            })?;

        if provider.owner_id.to_string() != user.id {
            return Err(AppError::Forbidden(
                "Not authorized to view this provider's analytics".to_string(),
            ));
        }
    }

    let analytics_service = AnalyticsService::new(&state);
    let analytics = analytics_service
        .provider_analytics(query.provider_id, query.from, query.to, token)
        .await
        .map_err(map_analytics_error)?;

    Ok(Json(json!(analytics)))
}
