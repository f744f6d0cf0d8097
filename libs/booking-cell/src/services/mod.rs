// libs/booking-cell/src/services/mod.rs

pub mod booking;
pub mod conflict;
pub mod lifecycle;
pub mod pricing;
pub mod slots;

pub use booking::BookingService;
pub use conflict::ConflictDetectionService;
pub use lifecycle::AppointmentLifecycleService;
pub use pricing::PricingService;
pub use slots::SlotCalculationService;
