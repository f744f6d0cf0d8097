use chrono::{Datelike, NaiveDate, Utc, Weekday};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{Availability, ProviderError, SetAvailabilityRequest};

/// Weekly opening hours for a provider, one row per weekday.
pub struct AvailabilityService {
    supabase: SupabaseClient,
}

impl AvailabilityService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Create or replace the weekly hours row for one weekday.
    pub async fn set_weekly_hours(
        &self,
        provider_id: &str,
        request: SetAvailabilityRequest,
        auth_token: &str,
    ) -> Result<Availability, ProviderError> {
        debug!(
            "Setting availability for provider {} on day {}",
            provider_id, request.day_of_week
        );

        if request.day_of_week < 0 || request.day_of_week > 6 {
            return Err(ProviderError::ValidationError(
                "Day of week must be between 0 (Sunday) and 6 (Saturday)".to_string(),
            ));
        }
        if request.start_time >= request.end_time {
            return Err(ProviderError::ValidationError(
                "Start time must be before end time".to_string(),
            ));
        }

        let existing = self
            .active_row_for_day(provider_id, request.day_of_week, Some(auth_token))
            .await?;

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = match existing {
            Some(row) => {
                let update_data = json!({
                    "start_time": request.start_time.format("%H:%M:%S").to_string(),
                    "end_time": request.end_time.format("%H:%M:%S").to_string(),
                    "is_active": true,
                    "updated_at": Utc::now().to_rfc3339()
                });
                let path = format!("/rest/v1/availabilities?id=eq.{}", row.id);
                self.supabase.request_with_headers(
                    Method::PATCH,
                    &path,
                    Some(auth_token),
                    Some(update_data),
                    Some(headers),
                ).await.map_err(|e| ProviderError::DatabaseError(e.to_string()))?
            }
            None => {
                let now = Utc::now();
                let availability_data = json!({
                    "provider_id": provider_id,
                    "day_of_week": request.day_of_week,
                    "start_time": request.start_time.format("%H:%M:%S").to_string(),
                    "end_time": request.end_time.format("%H:%M:%S").to_string(),
                    "is_active": true,
                    "created_at": now.to_rfc3339(),
                    "updated_at": now.to_rfc3339()
                });
                self.supabase.request_with_headers(
                    Method::POST,
                    "/rest/v1/availabilities",
                    Some(auth_token),
                    Some(availability_data),
                    Some(headers),
                ).await.map_err(|e| ProviderError::DatabaseError(e.to_string()))?
            }
        };

        if result.is_empty() {
            return Err(ProviderError::DatabaseError("Failed to save availability".to_string()));
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| ProviderError::DatabaseError(format!("Failed to parse availability: {}", e)))
    }

    /// All active weekly rows for a provider, Sunday first.
    pub async fn list_availability(
        &self,
        provider_id: &str,
        auth_token: Option<&str>,
    ) -> Result<Vec<Availability>, ProviderError> {
        debug!("Fetching availability for provider: {}", provider_id);

        let path = format!(
            "/rest/v1/availabilities?provider_id=eq.{}&is_active=eq.true&order=day_of_week.asc,start_time.asc",
            provider_id
        );
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            auth_token,
            None,
        ).await.map_err(|e| ProviderError::DatabaseError(e.to_string()))?;

        result.into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<Availability>, _>>()
            .map_err(|e| ProviderError::DatabaseError(format!("Failed to parse availability: {}", e)))
    }

    /// The active hours row governing a calendar date, if the provider
    /// opens that day.
    pub async fn availability_for_date(
        &self,
        provider_id: &str,
        date: NaiveDate,
        auth_token: Option<&str>,
    ) -> Result<Option<Availability>, ProviderError> {
        let day_of_week = day_of_week_index(date);
        self.active_row_for_day(provider_id, day_of_week, auth_token).await
    }

    pub async fn deactivate_availability(
        &self,
        provider_id: &str,
        availability_id: &str,
        auth_token: &str,
    ) -> Result<(), ProviderError> {
        debug!(
            "Deactivating availability {} for provider {}",
            availability_id, provider_id
        );

        let update_data = json!({
            "is_active": false,
            "updated_at": Utc::now().to_rfc3339()
        });

        let path = format!(
            "/rest/v1/availabilities?id=eq.{}&provider_id=eq.{}",
            availability_id, provider_id
        );
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(update_data),
            Some(headers),
        ).await.map_err(|e| ProviderError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(ProviderError::AvailabilityNotFound);
        }

        Ok(())
    }

    async fn active_row_for_day(
        &self,
        provider_id: &str,
        day_of_week: i32,
        auth_token: Option<&str>,
    ) -> Result<Option<Availability>, ProviderError> {
        let path = format!(
            "/rest/v1/availabilities?provider_id=eq.{}&day_of_week=eq.{}&is_active=eq.true",
            provider_id, day_of_week
        );
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            auth_token,
            None,
        ).await.map_err(|e| ProviderError::DatabaseError(e.to_string()))?;

        match result.into_iter().next() {
            Some(row) => serde_json::from_value(row)
                .map(Some)
                .map_err(|e| ProviderError::DatabaseError(format!("Failed to parse availability: {}", e))),
            None => Ok(None),
        }
    }
}

/// 0 = Sunday through 6 = Saturday, matching the stored convention.
pub fn day_of_week_index(date: NaiveDate) -> i32 {
    match date.weekday() {
        Weekday::Sun => 0,
        Weekday::Mon => 1,
        Weekday::Tue => 2,
        Weekday::Wed => 3,
        Weekday::Thu => 4,
        Weekday::Fri => 5,
        Weekday::Sat => 6,
    }
}
