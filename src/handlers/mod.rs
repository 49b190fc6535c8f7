use std::sync::Arc;

use crate::services::{PricingService, RateTableService, ReconciliationService};

pub mod pricing;
pub mod reconciliation;

/// Shared service handles for the HTTP layer.
#[derive(Clone)]
pub struct AppServices {
    pub pricing: Arc<PricingService>,
    pub rates: Arc<RateTableService>,
    pub reconciliation: Arc<ReconciliationService>,
}
