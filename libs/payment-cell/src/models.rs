use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// What a checkout session is collecting money for. Rides the session
/// metadata so the webhook knows which flag to flip on completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentPurpose {
    Deposit,
    Balance,
}

impl PaymentPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentPurpose::Deposit => "deposit",
            PaymentPurpose::Balance => "balance",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "deposit" => Some(PaymentPurpose::Deposit),
            "balance" => Some(PaymentPurpose::Balance),
            _ => None,
        }
    }
}

impl fmt::Display for PaymentPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    pub appointment_id: Uuid,
    /// Optional gratuity, only honored on the final balance charge.
    pub tip_amount: Option<f64>,
}

/// The slice of the vendor's checkout session the API passes back to
/// the client: where to send the customer and which session to watch.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentQuote {
    pub service_id: Uuid,
    pub list_price: f64,
    pub amount_due: f64,
    pub coupon_code: Option<String>,
    pub deposit_required: bool,
    pub deposit_amount: Option<f64>,
}

/// What a verified webhook event did to the appointment it referenced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    DepositPaid(Uuid),
    BalancePaid(Uuid),
    Ignored,
}

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("Appointment not found")]
    AppointmentNotFound,

    #[error("Service not found")]
    ServiceNotFound,

    #[error("Appointment is already paid")]
    AlreadyPaid,

    #[error("Invalid webhook signature")]
    SignatureInvalid,

    #[error("Malformed webhook event: {0}")]
    MalformedEvent(String),

    #[error("Invalid coupon: {0}")]
    InvalidCoupon(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Payment provider error: {0}")]
    ExternalServiceError(String),
}

impl From<reqwest::Error> for PaymentError {
    fn from(err: reqwest::Error) -> Self {
        PaymentError::ExternalServiceError(err.to_string())
    }
}
