//! Flags quotes priced below the size's approved floor. Advisory only: the
//! result annotates the priced job for the approval workflow and never
//! blocks a calculation.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::engine::{AllocationError, RateCard};
use super::units::to_total;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalCheck {
    pub requires_approval: bool,
    /// How far the quote falls below the floor over the full quantity.
    /// Absent when the quote clears the threshold.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shortfall_total: Option<Decimal>,
}

impl ApprovalCheck {
    pub fn clear() -> Self {
        Self {
            requires_approval: false,
            shortfall_total: None,
        }
    }
}

/// Compares the actual customer rate against the size's floor: the minimum
/// approved rate when one is defined, otherwise the standard rate.
pub fn detect(
    customer_cpm: Decimal,
    quantity: i64,
    rates: &RateCard,
) -> Result<ApprovalCheck, AllocationError> {
    let threshold = rates.minimum_rate_per_m.unwrap_or(rates.standard_rate_per_m);
    if customer_cpm >= threshold {
        return Ok(ApprovalCheck::clear());
    }
    Ok(ApprovalCheck {
        requires_approval: true,
        shortfall_total: Some(to_total(threshold - customer_cpm, quantity)?),
    })
}
