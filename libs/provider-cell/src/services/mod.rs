pub mod availability;
pub mod catalog;
pub mod code;
pub mod provider;

pub use availability::AvailabilityService;
pub use catalog::CatalogService;
pub use provider::ProviderService;
