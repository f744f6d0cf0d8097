use std::sync::Arc;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use base64::{Engine as _, engine::general_purpose};
use serde_json::json;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub stripe_base_url: String,
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    pub email_api_url: String,
    pub twilio_base_url: String,
    pub calendar_api_url: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            stripe_base_url: "http://localhost:12111/v1".to_string(),
            stripe_secret_key: "sk_test_key".to_string(),
            stripe_webhook_secret: "whsec_test_secret".to_string(),
            email_api_url: "http://localhost:8025".to_string(),
            twilio_base_url: "http://localhost:4010".to_string(),
            calendar_api_url: "http://localhost:7070".to_string(),
        }
    }
}

impl TestConfig {
    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            stripe_secret_key: self.stripe_secret_key.clone(),
            stripe_webhook_secret: self.stripe_webhook_secret.clone(),
            stripe_base_url: self.stripe_base_url.clone(),
            checkout_success_url: "http://localhost:3001/booking/success".to_string(),
            checkout_cancel_url: "http://localhost:3001/booking/cancelled".to_string(),
            email_api_url: self.email_api_url.clone(),
            email_api_key: "test-email-key".to_string(),
            email_from_address: "bookings@test.beautybook.app".to_string(),
            twilio_base_url: self.twilio_base_url.clone(),
            twilio_account_sid: "ACtest".to_string(),
            twilio_auth_token: "test-twilio-token".to_string(),
            twilio_from_number: "+15005550006".to_string(),
            calendar_api_url: self.calendar_api_url.clone(),
            calendar_api_token: "test-calendar-token".to_string(),
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "test@example.com".to_string(),
            role: "customer".to_string(),
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn customer(email: &str) -> Self {
        Self::new(email, "customer")
    }

    pub fn provider(email: &str) -> Self {
        Self::new(email, "provider")
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "admin")
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn provider_response(provider_id: &str, owner_id: &str) -> serde_json::Value {
        json!({
            "id": provider_id,
            "owner_id": owner_id,
            "business_name": "Glow Studio",
            "description": "Hair and nails in the city centre",
            "phone": "+15551234567",
            "booking_slug": "glow-studio",
            "cancellation_policy": "moderate",
            "average_rating": 4.6,
            "review_count": 12,
            "is_active": true,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn service_response(service_id: &str, provider_id: &str, price: f64, duration_minutes: i32) -> serde_json::Value {
        json!({
            "id": service_id,
            "provider_id": provider_id,
            "name": "Classic Manicure",
            "description": "Shape, buff and polish",
            "duration_minutes": duration_minutes,
            "price": price,
            "category": "nails",
            "is_active": true,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn availability_response(provider_id: &str, day_of_week: i32, start: &str, end: &str) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "provider_id": provider_id,
            "day_of_week": day_of_week,
            "start_time": start,
            "end_time": end,
            "is_active": true,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn appointment_response(
        customer_id: &str,
        provider_id: &str,
        service_id: &str,
        date: &str,
        start: &str,
        end: &str,
        status: &str,
    ) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "customer_id": customer_id,
            "provider_id": provider_id,
            "service_id": service_id,
            "staff_id": null,
            "date": date,
            "start_time": start,
            "end_time": end,
            "status": status,
            "payment_status": "pending",
            "amount": 60.0,
            "tip_amount": null,
            "deposit_required": false,
            "deposit_amount": null,
            "deposit_paid": false,
            "cancellation_policy": "moderate",
            "notes": null,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn staff_response(provider_id: &str, name: &str) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "provider_id": provider_id,
            "name": name,
            "title": "Senior stylist",
            "is_active": true,
            "created_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn review_response(customer_id: &str, provider_id: &str, appointment_id: &str, rating: i32) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "customer_id": customer_id,
            "provider_id": provider_id,
            "appointment_id": appointment_id,
            "rating": rating,
            "comment": "Lovely experience",
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn error_response(message: &str, code: &str) -> serde_json::Value {
        json!({
            "error": {
                "message": message,
                "code": code
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_creation() {
        let config = TestConfig::default();
        let app_config = config.to_app_config();

        assert_eq!(app_config.supabase_url, "http://localhost:54321");
        assert_eq!(app_config.supabase_anon_key, "test-anon-key");
        assert!(!app_config.supabase_jwt_secret.is_empty());
        assert!(app_config.is_payments_configured());
    }

    #[test]
    fn test_user_creation() {
        let user = TestUser::provider("owner@example.com");
        assert_eq!(user.email, "owner@example.com");
        assert_eq!(user.role, "provider");

        let user_model = user.to_user();
        assert_eq!(user_model.email, Some(user.email.clone()));
        assert_eq!(user_model.role, Some(user.role.clone()));
        assert_eq!(user_model.id, user.id);
    }

    #[test]
    fn test_jwt_token_creation() {
        let user = TestUser::default();
        let secret = "test-secret";
        let token = JwtTestUtils::create_test_token(&user, secret, Some(1));

        assert!(token.contains('.'));
        assert_eq!(token.split('.').count(), 3);
    }

    #[test]
    fn test_created_token_passes_validation() {
        let config = TestConfig::default();
        let user = TestUser::customer("walkin@example.com");
        let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(1));

        let validated = crate::jwt::validate_token(&token, &config.jwt_secret).unwrap();
        assert_eq!(validated.id, user.id);
        assert_eq!(validated.email, Some(user.email.clone()));
        assert_eq!(validated.role, Some("customer".to_string()));
    }

    #[test]
    fn test_expired_token_rejected() {
        let config = TestConfig::default();
        let user = TestUser::default();
        let token = JwtTestUtils::create_expired_token(&user, &config.jwt_secret);

        assert!(crate::jwt::validate_token(&token, &config.jwt_secret).is_err());
    }

    #[test]
    fn test_invalid_signature_token_rejected() {
        let config = TestConfig::default();
        let user = TestUser::default();
        let token = JwtTestUtils::create_invalid_signature_token(&user);

        assert!(crate::jwt::validate_token(&token, &config.jwt_secret).is_err());
    }

    #[test]
    fn test_malformed_token_rejected() {
        let config = TestConfig::default();
        let token = JwtTestUtils::create_malformed_token();

        assert!(crate::jwt::validate_token(&token, &config.jwt_secret).is_err());
    }
}
