use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    pub stripe_base_url: String,
    pub checkout_success_url: String,
    pub checkout_cancel_url: String,
    pub email_api_url: String,
    pub email_api_key: String,
    pub email_from_address: String,
    pub twilio_base_url: String,
    pub twilio_account_sid: String,
    pub twilio_auth_token: String,
    pub twilio_from_number: String,
    pub calendar_api_url: String,
    pub calendar_api_token: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            stripe_secret_key: env::var("STRIPE_SECRET_KEY")
                .unwrap_or_else(|_| {
                    warn!("STRIPE_SECRET_KEY not set, using empty value");
                    String::new()
                }),
            stripe_webhook_secret: env::var("STRIPE_WEBHOOK_SECRET")
                .unwrap_or_else(|_| {
                    warn!("STRIPE_WEBHOOK_SECRET not set, using empty value");
                    String::new()
                }),
            stripe_base_url: env::var("STRIPE_BASE_URL")
                .unwrap_or_else(|_| {
                    warn!("STRIPE_BASE_URL not set, using default");
                    "https://api.stripe.com/v1".to_string()
                }),
            checkout_success_url: env::var("CHECKOUT_SUCCESS_URL")
                .unwrap_or_else(|_| {
                    warn!("CHECKOUT_SUCCESS_URL not set, using empty value");
                    String::new()
                }),
            checkout_cancel_url: env::var("CHECKOUT_CANCEL_URL")
                .unwrap_or_else(|_| {
                    warn!("CHECKOUT_CANCEL_URL not set, using empty value");
                    String::new()
                }),
            email_api_url: env::var("EMAIL_API_URL")
                .unwrap_or_else(|_| {
                    warn!("EMAIL_API_URL not set, using empty value");
                    String::new()
                }),
            email_api_key: env::var("EMAIL_API_KEY")
                .unwrap_or_else(|_| {
                    warn!("EMAIL_API_KEY not set, using empty value");
                    String::new()
                }),
            email_from_address: env::var("EMAIL_FROM_ADDRESS")
                .unwrap_or_else(|_| {
                    warn!("EMAIL_FROM_ADDRESS not set, using default");
                    "bookings@beautybook.app".to_string()
                }),
            twilio_base_url: env::var("TWILIO_BASE_URL")
                .unwrap_or_else(|_| {
                    warn!("TWILIO_BASE_URL not set, using default");
                    "https://api.twilio.com".to_string()
                }),
            twilio_account_sid: env::var("TWILIO_ACCOUNT_SID")
                .unwrap_or_else(|_| {
                    warn!("TWILIO_ACCOUNT_SID not set, using empty value");
                    String::new()
                }),
            twilio_auth_token: env::var("TWILIO_AUTH_TOKEN")
                .unwrap_or_else(|_| {
                    warn!("TWILIO_AUTH_TOKEN not set, using empty value");
                    String::new()
                }),
            twilio_from_number: env::var("TWILIO_FROM_NUMBER")
                .unwrap_or_else(|_| {
                    warn!("TWILIO_FROM_NUMBER not set, using empty value");
                    String::new()
                }),
            calendar_api_url: env::var("CALENDAR_API_URL")
                .unwrap_or_else(|_| {
                    warn!("CALENDAR_API_URL not set, using empty value");
                    String::new()
                }),
            calendar_api_token: env::var("CALENDAR_API_TOKEN")
                .unwrap_or_else(|_| {
                    warn!("CALENDAR_API_TOKEN not set, using empty value");
                    String::new()
                }),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    pub fn is_payments_configured(&self) -> bool {
        !self.stripe_secret_key.is_empty()
            && !self.stripe_base_url.is_empty()
    }

    pub fn is_email_configured(&self) -> bool {
        !self.email_api_url.is_empty()
            && !self.email_api_key.is_empty()
            && !self.email_from_address.is_empty()
    }

    pub fn is_sms_configured(&self) -> bool {
        !self.twilio_account_sid.is_empty()
            && !self.twilio_auth_token.is_empty()
            && !self.twilio_from_number.is_empty()
    }

    pub fn is_calendar_configured(&self) -> bool {
        !self.calendar_api_url.is_empty()
            && !self.calendar_api_token.is_empty()
    }
}
