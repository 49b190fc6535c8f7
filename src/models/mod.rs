pub mod invoice;
pub mod job_pricing;
pub mod purchase_order;
pub mod rate_table;
pub mod reconciliation_audit;
