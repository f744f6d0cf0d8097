// libs/review-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{CreateReviewRequest, Review, ReviewError, UpdateReviewRequest};
use crate::services::ReviewService;

#[derive(Debug, Deserialize)]
pub struct ReviewListQuery {
    pub provider_id: Uuid,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

fn map_review_error(err: ReviewError) -> AppError {
    match err {
        ReviewError::NotFound => AppError::NotFound("Review not found".to_string()),
        ReviewError::AppointmentNotFound => {
            AppError::NotFound("Appointment not found".to_string())
        }
        ReviewError::AlreadyReviewed => {
            AppError::Conflict("Appointment already has a review".to_string())
        }
        ReviewError::UnauthorizedAccess => {
            AppError::Forbidden("Not authorized to modify this review".to_string())
        }
        ReviewError::ValidationError(msg) => AppError::BadRequest(msg),
        ReviewError::DatabaseError(msg) => AppError::Database(msg),
    }
}

fn is_owner_or_admin(review: &Review, user: &User) -> bool {
    review.customer_id.to_string() == user.id || user.role.as_deref() == Some("admin")
}

// ==============================================================================
// PUBLIC HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_reviews_public(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<ReviewListQuery>,
) -> Result<Json<Value>, AppError> {
    let review_service = ReviewService::new(&state);

    let reviews = review_service
        .list_reviews(query.provider_id, query.limit, query.offset, None)
        .await
        .map_err(map_review_error)?;

    Ok(Json(json!({
        "reviews": reviews,
        "total": reviews.len()
    })))
}

// ==============================================================================
// PROTECTED HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_review(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateReviewRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    let customer_id = Uuid::parse_str(&user.id)
        .map_err(|_| AppError::BadRequest("Invalid user ID".to_string()))?;

    let review_service = ReviewService::new(&state);

    let review = review_service
        .create_review(customer_id, request, token)
        .await
        .map_err(map_review_error)?;

    Ok(Json(json!({
        "success": true,
        "review": review,
        "message": "Review submitted"
    })))
}

#[axum::debug_handler]
pub async fn update_review(
    State(state): State<Arc<AppConfig>>,
    Path(review_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateReviewRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let review_service = ReviewService::new(&state);

    let review = review_service
        .get_review(review_id, Some(token))
        .await
        .map_err(map_review_error)?;

    if !is_owner_or_admin(&review, &user) {
        return Err(AppError::Forbidden(
            "You can only update your own reviews".to_string(),
        ));
    }

    let updated = review_service
        .update_review(review_id, request, token)
        .await
        .map_err(map_review_error)?;

    Ok(Json(json!({
        "success": true,
        "review": updated,
        "message": "Review updated"
    })))
}

#[axum::debug_handler]
pub async fn delete_review(
    State(state): State<Arc<AppConfig>>,
    Path(review_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let review_service = ReviewService::new(&state);

    let review = review_service
        .get_review(review_id, Some(token))
        .await
        .map_err(map_review_error)?;

    if !is_owner_or_admin(&review, &user) {
        return Err(AppError::Forbidden(
            "You can only delete your own reviews".to_string(),
        ));
    }

    review_service
        .delete_review(review_id, token)
        .await
        .map_err(map_review_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Review deleted"
    })))
}
