pub mod payments;
pub mod stripe;

pub use payments::PaymentService;
pub use stripe::{to_minor_units, verify_webhook_signature, StripeClient};
