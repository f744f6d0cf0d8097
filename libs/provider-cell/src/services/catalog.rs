use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use chrono::Utc;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    CreateServiceRequest, CreateStaffRequest, ProviderError, Service,
    StaffMember, UpdateServiceRequest,
};

/// CRUD over a provider's service menu and staff roster.
pub struct CatalogService {
    supabase: SupabaseClient,
}

impl CatalogService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn create_service(
        &self,
        provider_id: &str,
        request: CreateServiceRequest,
        auth_token: &str,
    ) -> Result<Service, ProviderError> {
        debug!("Creating service '{}' for provider {}", request.name, provider_id);

        validate_service_fields(&request.name, request.duration_minutes, request.price)?;

        let now = Utc::now();
        let service_data = json!({
            "provider_id": provider_id,
            "name": request.name,
            "description": request.description,
            "duration_minutes": request.duration_minutes,
            "price": request.price,
            "category": request.category,
            "is_active": true,
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339()
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/services",
            Some(auth_token),
            Some(service_data),
            Some(headers),
        ).await.map_err(|e| ProviderError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(ProviderError::DatabaseError("Failed to create service".to_string()));
        }

        let service: Service = serde_json::from_value(result[0].clone())
            .map_err(|e| ProviderError::DatabaseError(format!("Failed to parse created service: {}", e)))?;
        info!("Service {} created for provider {}", service.id, provider_id);

        Ok(service)
    }

    pub async fn get_service(
        &self,
        service_id: &str,
        auth_token: Option<&str>,
    ) -> Result<Service, ProviderError> {
        let path = format!("/rest/v1/services?id=eq.{}", service_id);
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            auth_token,
            None,
        ).await.map_err(|e| ProviderError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(ProviderError::ServiceNotFound);
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| ProviderError::DatabaseError(format!("Failed to parse service: {}", e)))
    }

    /// Public service menu. Set `include_inactive` for the owner's
    /// management view.
    pub async fn list_services(
        &self,
        provider_id: &str,
        include_inactive: bool,
        auth_token: Option<&str>,
    ) -> Result<Vec<Service>, ProviderError> {
        debug!("Listing services for provider {}", provider_id);

        let mut path = format!(
            "/rest/v1/services?provider_id=eq.{}&order=category.asc,name.asc",
            provider_id
        );
        if !include_inactive {
            path.push_str("&is_active=eq.true");
        }

        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            auth_token,
            None,
        ).await.map_err(|e| ProviderError::DatabaseError(e.to_string()))?;

        result.into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<Service>, _>>()
            .map_err(|e| ProviderError::DatabaseError(format!("Failed to parse services: {}", e)))
    }

    pub async fn update_service(
        &self,
        provider_id: &str,
        service_id: &str,
        request: UpdateServiceRequest,
        auth_token: &str,
    ) -> Result<Service, ProviderError> {
        debug!("Updating service {} for provider {}", service_id, provider_id);

        if let Some(duration) = request.duration_minutes {
            if duration <= 0 {
                return Err(ProviderError::ValidationError("Duration must be positive".to_string()));
            }
        }
        if let Some(price) = request.price {
            if price < 0.0 {
                return Err(ProviderError::ValidationError("Price cannot be negative".to_string()));
            }
        }

        let mut update_data = serde_json::Map::new();

        if let Some(name) = request.name {
            if name.trim().is_empty() {
                return Err(ProviderError::ValidationError("Service name is required".to_string()));
            }
            update_data.insert("name".to_string(), json!(name));
        }
        if let Some(description) = request.description {
            update_data.insert("description".to_string(), json!(description));
        }
        if let Some(duration) = request.duration_minutes {
            update_data.insert("duration_minutes".to_string(), json!(duration));
        }
        if let Some(price) = request.price {
            update_data.insert("price".to_string(), json!(price));
        }
        if let Some(category) = request.category {
            update_data.insert("category".to_string(), json!(category));
        }
        if let Some(active) = request.is_active {
            update_data.insert("is_active".to_string(), json!(active));
        }

        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!(
            "/rest/v1/services?id=eq.{}&provider_id=eq.{}",
            service_id, provider_id
        );
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
            return Err(ProviderError::ServiceNotFound);
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| ProviderError::DatabaseError(format!("Failed to parse updated service: {}", e)))
    }

    /// Deactivates rather than deletes so past appointments keep their
    /// service reference.
    pub async fn deactivate_service(
        &self,
        provider_id: &str,
        service_id: &str,
        auth_token: &str,
    ) -> Result<(), ProviderError> {
        debug!("Deactivating service {} for provider {}", service_id, provider_id);

        let update_data = json!({
            "is_active": false,
            "updated_at": Utc::now().to_rfc3339()
        });

        let path = format!(
            "/rest/v1/services?id=eq.{}&provider_id=eq.{}",
            service_id, provider_id
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
            return Err(ProviderError::ServiceNotFound);
        }

        Ok(())
    }

    pub async fn add_staff_member(
        &self,
        provider_id: &str,
        request: CreateStaffRequest,
        auth_token: &str,
    ) -> Result<StaffMember, ProviderError> {
        debug!("Adding staff member '{}' to provider {}", request.name, provider_id);

        if request.name.trim().is_empty() {
            return Err(ProviderError::ValidationError("Staff name is required".to_string()));
        }

        let staff_data = json!({
            "provider_id": provider_id,
            "name": request.name,
            "title": request.title,
            "is_active": true,
            "created_at": Utc::now().to_rfc3339()
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/staff_members",
            Some(auth_token),
            Some(staff_data),
            Some(headers),
        ).await.map_err(|e| ProviderError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(ProviderError::DatabaseError("Failed to add staff member".to_string()));
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| ProviderError::DatabaseError(format!("Failed to parse staff member: {}", e)))
    }

    pub async fn list_staff(
        &self,
        provider_id: &str,
        auth_token: &str,
    ) -> Result<Vec<StaffMember>, ProviderError> {
        let path = format!(
            "/rest/v1/staff_members?provider_id=eq.{}&is_active=eq.true&order=name.asc",
            provider_id
        );
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| ProviderError::DatabaseError(e.to_string()))?;

        result.into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<StaffMember>, _>>()
            .map_err(|e| ProviderError::DatabaseError(format!("Failed to parse staff: {}", e)))
    }

    pub async fn remove_staff_member(
        &self,
        provider_id: &str,
        staff_id: &str,
        auth_token: &str,
    ) -> Result<(), ProviderError> {
        debug!("Removing staff member {} from provider {}", staff_id, provider_id);

        let update_data = json!({ "is_active": false });

        let path = format!(
            "/rest/v1/staff_members?id=eq.{}&provider_id=eq.{}",
            staff_id, provider_id
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
            return Err(ProviderError::StaffNotFound);
        }

        Ok(())
    }
}

fn validate_service_fields(name: &str, duration_minutes: i32, price: f64) -> Result<(), ProviderError> {
    if name.trim().is_empty() {
        return Err(ProviderError::ValidationError("Service name is required".to_string()));
    }
    if duration_minutes <= 0 {
        return Err(ProviderError::ValidationError("Duration must be positive".to_string()));
    }
    if price < 0.0 {
        return Err(ProviderError::ValidationError("Price cannot be negative".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn rejects_invalid_service_fields() {
        assert_matches!(
            validate_service_fields("", 30, 25.0),
            Err(ProviderError::ValidationError(_))
        );
        assert_matches!(
            validate_service_fields("Cut", 0, 25.0),
            Err(ProviderError::ValidationError(_))
        );
        assert_matches!(
            validate_service_fields("Cut", -15, 25.0),
            Err(ProviderError::ValidationError(_))
        );
        assert_matches!(
            validate_service_fields("Cut", 30, -1.0),
            Err(ProviderError::ValidationError(_))
        );
    }

    #[test]
    fn accepts_valid_service_fields() {
        assert!(validate_service_fields("Cut", 30, 0.0).is_ok());
        assert!(validate_service_fields("Balayage", 120, 240.0).is_ok());
    }
}
