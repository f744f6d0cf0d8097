use regex::Regex;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;
use chrono::Utc;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    CancellationPolicy, CreateProviderRequest, Provider, ProviderError,
    ProviderSearchFilters, UpdateProviderRequest,
};

pub struct ProviderService {
    supabase: SupabaseClient,
}

impl ProviderService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Create a provider profile owned by the authenticated user.
    pub async fn create_provider(
        &self,
        owner_id: Uuid,
        request: CreateProviderRequest,
        auth_token: &str,
    ) -> Result<Provider, ProviderError> {
        debug!("Creating provider profile for owner: {}", owner_id);

        if request.business_name.trim().is_empty() {
            return Err(ProviderError::ValidationError("Business name is required".to_string()));
        }
        validate_slug(&request.booking_slug)?;
        self.ensure_slug_free(&request.booking_slug, None, auth_token).await?;

        let policy = request.cancellation_policy.unwrap_or(CancellationPolicy::Moderate);
        let now = Utc::now();
        let provider_data = json!({
            "owner_id": owner_id,
            "business_name": request.business_name,
            "description": request.description,
            "phone": request.phone,
            "booking_slug": request.booking_slug,
            "cancellation_policy": policy.to_string(),
            "average_rating": 0.0,
            "review_count": 0,
            "is_active": true,
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339()
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/providers",
            Some(auth_token),
            Some(provider_data),
            Some(headers),
        ).await.map_err(|e| ProviderError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(ProviderError::DatabaseError("Failed to create provider profile".to_string()));
        }

        let provider: Provider = serde_json::from_value(result[0].clone())
            .map_err(|e| ProviderError::DatabaseError(format!("Failed to parse created provider: {}", e)))?;
        info!("Provider profile {} created for owner {}", provider.id, owner_id);

        Ok(provider)
    }

    pub async fn get_provider(
        &self,
        provider_id: &str,
        auth_token: Option<&str>,
    ) -> Result<Provider, ProviderError> {
        debug!("Fetching provider profile: {}", provider_id);

        let path = format!("/rest/v1/providers?id=eq.{}", provider_id);
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            auth_token,
            None,
        ).await.map_err(|e| ProviderError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(ProviderError::NotFound);
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| ProviderError::DatabaseError(format!("Failed to parse provider: {}", e)))
    }

    /// Public booking-page lookup by slug. Inactive providers are hidden.
    pub async fn get_provider_by_slug(
        &self,
        slug: &str,
        auth_token: Option<&str>,
    ) -> Result<Provider, ProviderError> {
        debug!("Fetching provider by slug: {}", slug);

        let path = format!(
            "/rest/v1/providers?booking_slug=eq.{}&is_active=eq.true",
            urlencoding::encode(slug)
        );
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            auth_token,
            None,
        ).await.map_err(|e| ProviderError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(ProviderError::NotFound);
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| ProviderError::DatabaseError(format!("Failed to parse provider: {}", e)))
    }

    pub async fn update_provider(
        &self,
        provider_id: &str,
        request: UpdateProviderRequest,
        auth_token: &str,
    ) -> Result<Provider, ProviderError> {
        debug!("Updating provider profile: {}", provider_id);

        if let Some(ref slug) = request.booking_slug {
            validate_slug(slug)?;
            self.ensure_slug_free(slug, Some(provider_id), auth_token).await?;
        }

        let mut update_data = serde_json::Map::new();

        if let Some(name) = request.business_name {
            update_data.insert("business_name".to_string(), json!(name));
        }
        if let Some(description) = request.description {
            update_data.insert("description".to_string(), json!(description));
        }
        if let Some(phone) = request.phone {
            update_data.insert("phone".to_string(), json!(phone));
        }
        if let Some(slug) = request.booking_slug {
            update_data.insert("booking_slug".to_string(), json!(slug));
        }
        if let Some(policy) = request.cancellation_policy {
            update_data.insert("cancellation_policy".to_string(), json!(policy.to_string()));
        }
        if let Some(active) = request.is_active {
            update_data.insert("is_active".to_string(), json!(active));
        }

        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/providers?id=eq.{}", provider_id);
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(Value::Object(update_data)),
            Some(headers),
        ).await.map_err(|e| ProviderError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(ProviderError::NotFound);
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| ProviderError::DatabaseError(format!("Failed to parse updated provider: {}", e)))
    }

    /// Public search over active providers, best-rated first.
    pub async fn search_providers(
        &self,
        filters: ProviderSearchFilters,
        auth_token: Option<&str>,
        limit: Option<i32>,
        offset: Option<i32>,
    ) -> Result<Vec<Provider>, ProviderError> {
        debug!("Searching providers with filters: {:?}", filters);

        let mut query_parts = vec!["is_active=eq.true".to_string()];

        if let Some(search) = filters.search {
            query_parts.push(format!(
                "business_name=ilike.{}",
                urlencoding::encode(&format!("%{}%", search))
            ));
        }
        if let Some(min_rating) = filters.min_rating {
            query_parts.push(format!("average_rating=gte.{}", min_rating));
        }

        let mut path = format!("/rest/v1/providers?{}", query_parts.join("&"));
        path.push_str("&order=average_rating.desc,review_count.desc");

        if let Some(limit_val) = limit {
            path.push_str(&format!("&limit={}", limit_val));
        }
        if let Some(offset_val) = offset {
            path.push_str(&format!("&offset={}", offset_val));
        }

        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            auth_token,
            None,
        ).await.map_err(|e| ProviderError::DatabaseError(e.to_string()))?;

        let mut providers: Vec<Provider> = result.into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<Provider>, _>>()
            .map_err(|e| ProviderError::DatabaseError(format!("Failed to parse providers: {}", e)))?;

        // Category filtering goes through the catalog, not the provider row
        if let Some(category) = filters.category {
            providers = self.filter_by_category(providers, &category, auth_token).await?;
        }

        Ok(providers)
    }

    async fn filter_by_category(
        &self,
        providers: Vec<Provider>,
        category: &str,
        auth_token: Option<&str>,
    ) -> Result<Vec<Provider>, ProviderError> {
        let path = format!(
            "/rest/v1/services?category=eq.{}&is_active=eq.true&select=provider_id",
            urlencoding::encode(category)
        );
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            auth_token,
            None,
        ).await.map_err(|e| ProviderError::DatabaseError(e.to_string()))?;

        let provider_ids: Vec<String> = result.iter()
            .filter_map(|row| row["provider_id"].as_str().map(String::from))
            .collect();

        Ok(providers.into_iter()
            .filter(|p| provider_ids.contains(&p.id.to_string()))
            .collect())
    }

    async fn ensure_slug_free(
        &self,
        slug: &str,
        exclude_provider_id: Option<&str>,
        auth_token: &str,
    ) -> Result<(), ProviderError> {
        let mut path = format!(
            "/rest/v1/providers?booking_slug=eq.{}",
            urlencoding::encode(slug)
        );
        if let Some(id) = exclude_provider_id {
            path.push_str(&format!("&id=neq.{}", id));
        }

        let existing: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| ProviderError::DatabaseError(e.to_string()))?;

        if !existing.is_empty() {
            return Err(ProviderError::SlugTaken(slug.to_string()));
        }

        Ok(())
    }
}

/// Slugs are lowercase alphanumerics separated by single hyphens.
pub fn validate_slug(slug: &str) -> Result<(), ProviderError> {
    let pattern = Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$").unwrap();
    if slug.len() < 3 || slug.len() > 60 || !pattern.is_match(slug) {
        return Err(ProviderError::InvalidSlug(slug.to_string()));
    }
    Ok(())
}
