pub mod pricing;
pub mod rates;
pub mod reconciliation;

pub use pricing::PricingService;
pub use rates::RateTableService;
pub use reconciliation::ReconciliationService;
