pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::*;
pub use services::*;

// Specifically re-export the types other cells lean on
pub use models::{CheckoutSession, PaymentPurpose, PaymentQuote, WebhookOutcome};
