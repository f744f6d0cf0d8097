use chrono::Utc;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use booking_cell::models::{Appointment, AppointmentStatus};
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{CreateReviewRequest, Review, ReviewError, UpdateReviewRequest};

/// Arithmetic mean and count over a set of ratings. An empty set
/// aggregates to `(0.0, 0)` so providers without reviews read as
/// unrated rather than carrying a stale average.
pub fn aggregate_ratings(ratings: &[i32]) -> (f64, i32) {
    if ratings.is_empty() {
        return (0.0, 0);
    }

    let sum: i32 = ratings.iter().sum();
    (f64::from(sum) / ratings.len() as f64, ratings.len() as i32)
}

fn validate_rating(rating: i32) -> Result<(), ReviewError> {
    if !(1..=5).contains(&rating) {
        return Err(ReviewError::ValidationError(
            "Rating must be between 1 and 5".to_string(),
        ));
    }
    Ok(())
}

#[derive(Deserialize)]
struct RatingRow {
    rating: i32,
}

pub struct ReviewService {
    supabase: SupabaseClient,
}

impl ReviewService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Create a review for a completed appointment. One review per
    /// appointment; the provider's aggregate is refreshed afterwards.
    pub async fn create_review(
        &self,
        customer_id: Uuid,
        request: CreateReviewRequest,
        auth_token: &str,
    ) -> Result<Review, ReviewError> {
        debug!(
            "Creating review for appointment {} by customer {}",
            request.appointment_id, customer_id
        );

        validate_rating(request.rating)?;

        let appointment = self
            .fetch_appointment(request.appointment_id, auth_token)
            .await?;

        if appointment.customer_id != customer_id {
            return Err(ReviewError::UnauthorizedAccess);
        }
        if appointment.provider_id != request.provider_id {
            return Err(ReviewError::ValidationError(
                "Appointment is not with this provider".to_string(),
            ));
        }
        if appointment.status != AppointmentStatus::Completed {
            return Err(ReviewError::ValidationError(
                "Only completed appointments can be reviewed".to_string(),
            ));
        }

        let existing: Vec<Value> = self
            .supabase
            .request(
                Method::GET,
                &format!(
                    "/rest/v1/reviews?appointment_id=eq.{}&limit=1",
                    request.appointment_id
                ),
                Some(auth_token),
                None,
            )
            .await
            .map_err(|e| ReviewError::DatabaseError(e.to_string()))?;

        if !existing.is_empty() {
            return Err(ReviewError::AlreadyReviewed);
        }

        let now = Utc::now();
        let record = json!({
            "customer_id": customer_id,
            "provider_id": request.provider_id,
            "appointment_id": request.appointment_id,
            "rating": request.rating,
            "comment": request.comment,
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339()
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/reviews",
                Some(auth_token),
                Some(record),
                Some(headers),
            )
            .await
            .map_err(|e| ReviewError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(ReviewError::DatabaseError(
                "Failed to create review record".to_string(),
            ));
        }

        let review: Review = serde_json::from_value(result[0].clone())
            .map_err(|e| ReviewError::DatabaseError(format!("Failed to parse review: {}", e)))?;
        info!(
            "Review {} created for provider {}",
            review.id, review.provider_id
        );

        self.refresh_after_write(review.provider_id, auth_token).await;

        Ok(review)
    }

    pub async fn get_review(
        &self,
        review_id: Uuid,
        auth_token: Option<&str>,
    ) -> Result<Review, ReviewError> {
        let path = format!("/rest/v1/reviews?id=eq.{}", review_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, auth_token, None)
            .await
            .map_err(|e| ReviewError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(ReviewError::NotFound);
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| ReviewError::DatabaseError(format!("Failed to parse review: {}", e)))
    }

    /// Reviews for a provider, newest first.
    pub async fn list_reviews(
        &self,
        provider_id: Uuid,
        limit: Option<i32>,
        offset: Option<i32>,
        auth_token: Option<&str>,
    ) -> Result<Vec<Review>, ReviewError> {
        let mut path = format!(
            "/rest/v1/reviews?provider_id=eq.{}&order=created_at.desc&limit={}",
            provider_id,
            limit.unwrap_or(50)
        );
        if let Some(offset) = offset {
            path.push_str(&format!("&offset={}", offset));
        }

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, auth_token, None)
            .await
            .map_err(|e| ReviewError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Review>, _>>()
            .map_err(|e| ReviewError::DatabaseError(format!("Failed to parse reviews: {}", e)))
    }

    pub async fn update_review(
        &self,
        review_id: Uuid,
        request: UpdateReviewRequest,
        auth_token: &str,
    ) -> Result<Review, ReviewError> {
        if request.rating.is_none() && request.comment.is_none() {
            return Err(ReviewError::ValidationError(
                "No fields provided to update".to_string(),
            ));
        }

        let mut updates = Map::new();
        if let Some(rating) = request.rating {
            validate_rating(rating)?;
            updates.insert("rating".to_string(), json!(rating));
        }
        if let Some(comment) = request.comment {
            updates.insert("comment".to_string(), json!(comment));
        }
        updates.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &format!("/rest/v1/reviews?id=eq.{}", review_id),
                Some(auth_token),
                Some(Value::Object(updates)),
                Some(headers),
            )
            .await
            .map_err(|e| ReviewError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(ReviewError::NotFound);
        }

        let review: Review = serde_json::from_value(result[0].clone())
            .map_err(|e| ReviewError::DatabaseError(format!("Failed to parse review: {}", e)))?;

        self.refresh_after_write(review.provider_id, auth_token).await;

        Ok(review)
    }

    pub async fn delete_review(
        &self,
        review_id: Uuid,
        auth_token: &str,
    ) -> Result<(), ReviewError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::DELETE,
                &format!("/rest/v1/reviews?id=eq.{}", review_id),
                Some(auth_token),
                None,
                Some(headers),
            )
            .await
            .map_err(|e| ReviewError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(ReviewError::NotFound);
        }

        let deleted: Review = serde_json::from_value(result[0].clone())
            .map_err(|e| ReviewError::DatabaseError(format!("Failed to parse review: {}", e)))?;
        info!(
            "Review {} deleted for provider {}",
            review_id, deleted.provider_id
        );

        self.refresh_after_write(deleted.provider_id, auth_token).await;

        Ok(())
    }

    // ==============================================================================
    // PRIVATE HELPER METHODS
    // ==============================================================================

    async fn fetch_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, ReviewError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ReviewError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(ReviewError::AppointmentNotFound);
        }

        serde_json::from_value(result[0].clone()).map_err(|e| {
            ReviewError::DatabaseError(format!("Failed to parse appointment: {}", e))
        })
    }

    /// Recompute the denormalized rating aggregate from every review the
    /// provider has. Runs after each write; a failure leaves the
    /// aggregate stale until the next write repeats the computation.
    async fn refresh_provider_rating(
        &self,
        provider_id: Uuid,
        auth_token: &str,
    ) -> Result<(), ReviewError> {
        let rows: Vec<RatingRow> = self
            .supabase
            .request(
                Method::GET,
                &format!("/rest/v1/reviews?provider_id=eq.{}&select=rating", provider_id),
                Some(auth_token),
                None,
            )
            .await
            .map_err(|e| ReviewError::DatabaseError(e.to_string()))?;

        let ratings: Vec<i32> = rows.into_iter().map(|r| r.rating).collect();
        let (average_rating, review_count) = aggregate_ratings(&ratings);

        let update = json!({
            "average_rating": average_rating,
            "review_count": review_count,
            "updated_at": Utc::now().to_rfc3339()
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &format!("/rest/v1/providers?id=eq.{}", provider_id),
                Some(auth_token),
                Some(update),
                Some(headers),
            )
            .await
            .map_err(|e| ReviewError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(ReviewError::DatabaseError(
                "Provider row missing during rating refresh".to_string(),
            ));
        }

        debug!(
            "Provider {} aggregate refreshed: {} reviews, average {}",
            provider_id, review_count, average_rating
        );

        Ok(())
    }

    async fn refresh_after_write(&self, provider_id: Uuid, auth_token: &str) {
        if let Err(e) = self.refresh_provider_rating(provider_id, auth_token).await {
            warn!(
                "Failed to refresh rating aggregate for provider {}: {}",
                provider_id, e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_empty_reads_as_unrated() {
        assert_eq!(aggregate_ratings(&[]), (0.0, 0));
    }

    #[test]
    fn test_aggregate_single_rating() {
        assert_eq!(aggregate_ratings(&[4]), (4.0, 1));
    }

    #[test]
    fn test_aggregate_mean_and_count() {
        assert_eq!(aggregate_ratings(&[5, 4, 3]), (4.0, 3));
        assert_eq!(aggregate_ratings(&[5, 4]), (4.5, 2));
    }

    #[test]
    fn test_aggregate_is_idempotent_over_same_input() {
        let ratings = [5, 3, 4, 4];
        assert_eq!(aggregate_ratings(&ratings), aggregate_ratings(&ratings));
    }

    #[test]
    fn test_rating_bounds() {
        assert!(validate_rating(1).is_ok());
        assert!(validate_rating(5).is_ok());
        assert!(validate_rating(0).is_err());
        assert!(validate_rating(6).is_err());
        assert!(validate_rating(-1).is_err());
    }
}
