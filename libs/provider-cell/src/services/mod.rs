pub mod provider;
pub mod catalog;
pub mod availability;

pub use provider::ProviderService;
pub use catalog::CatalogService;
pub use availability::AvailabilityService;
