//! Multi-party margin allocation.
//!
//! Given a job's quantity, per-size baseline rates, and one of three
//! paper-supply arrangements, computes how the customer's payment divides
//! among broker, intermediary, and printer. Everything is computed at CPM
//! (per-thousand) granularity first and scaled to totals once, so the
//! stored total/CPM pairs cannot drift apart. Forward pricing (from the
//! rate card) and reverse pricing (from an already-invoiced customer
//! amount) share the same per-mode formulas; only the source of the
//! customer rate differs.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::mode::AllocationMode;
use super::units::{round_cents, round_cpm, to_cpm, to_total};

/// Fatal calculation failures. Warnings live in the consistency validator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AllocationError {
    #[error("quantity must be positive, got {0}")]
    InvalidQuantity(i64),
    #[error("no rate table entry for size '{0}' and no override supplied")]
    UnknownSize(String),
    #[error("unrecognized allocation mode tag '{0}'")]
    InvalidMode(String),
    #[error("broker margin is negative (${0} total); job cannot be saved")]
    NegativeBrokerMargin(Decimal),
}

/// Per-size baseline rates, all expressed per thousand units except the
/// paper cost which is per pound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateCard {
    pub size_key: String,
    /// Printer's charge per M.
    pub print_cost_per_m: Decimal,
    /// Actual paper cost per M (paper weight/M x cost/lb, or an override).
    pub material_cost_per_m: Decimal,
    /// What the intermediary bills the broker for paper, per M. Includes
    /// the intermediary's paper markup in Standard mode.
    pub material_charge_per_m: Decimal,
    /// Rate quoted to the customer per M when nothing pins the total.
    pub standard_rate_per_m: Decimal,
    /// Floor below which a quote requires managerial approval.
    pub minimum_rate_per_m: Option<Decimal>,
}

/// One allocation request. `known_customer_total` switches the engine into
/// reverse mode: the invoiced amount is taken verbatim and the margins are
/// back-solved from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationRequest {
    pub quantity: i64,
    pub mode: AllocationMode,
    pub rates: RateCard,
    pub known_customer_total: Option<Decimal>,
}

/// A monetary quantity carried both as a job total and a per-thousand rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub total: Decimal,
    pub cpm: Decimal,
}

impl Line {
    fn from_cpm(cpm: Decimal, quantity: i64) -> Result<Self, AllocationError> {
        Ok(Self {
            total: to_total(cpm, quantity)?,
            cpm: round_cpm(cpm),
        })
    }

    /// Keeps a pinned total verbatim and derives only the CPM from it.
    fn pinned(total: Decimal, quantity: i64) -> Result<Self, AllocationError> {
        Ok(Self {
            total: round_cents(total),
            cpm: round_cpm(to_cpm(total, quantity)?),
        })
    }
}

/// The complete, internally consistent division of a job's money.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Breakdown {
    pub quantity: i64,
    pub mode: AllocationMode,
    /// What the customer pays the broker.
    pub customer: Line,
    pub broker_margin: Line,
    /// Everything the intermediary invoices the broker.
    pub intermediary_total: Line,
    pub intermediary_print_margin: Line,
    /// Paper markup (charge minus cost); forced to zero outside Standard.
    pub intermediary_material_margin: Line,
    pub intermediary_total_margin: Line,
    pub printer_total: Line,
    pub material_cost: Line,
    pub material_charge: Line,
}

impl Breakdown {
    /// The pool left after printer and paper charges, per M. Meaningful in
    /// the two 50/50 modes; zero by construction in supply mode.
    pub fn margin_pool_cpm(&self) -> Decimal {
        self.customer.cpm - self.printer_total.cpm - self.material_charge.cpm
    }
}

const HALF: Decimal = dec!(0.5);
const BROKER_SHARE: Decimal = dec!(0.10);
const INTERMEDIARY_SHARE: Decimal = dec!(0.90);
const PRINTER_SHARE: Decimal = dec!(0.80);

/// Runs one allocation. Pure: no I/O, no shared state.
pub fn allocate(request: &AllocationRequest) -> Result<Breakdown, AllocationError> {
    let quantity = request.quantity;
    if quantity <= 0 {
        return Err(AllocationError::InvalidQuantity(quantity));
    }

    let rates = &request.rates;
    let print_cpm = rates.print_cost_per_m;
    let material_cost_cpm = rates.material_cost_per_m;

    // Reverse mode starts from the invoiced amount; forward mode prices
    // from the rate card. Same formulas either way below this point.
    let (customer_cpm, customer) = match request.known_customer_total {
        Some(total) => (to_cpm(total, quantity)?, Line::pinned(total, quantity)?),
        None => {
            let cpm = rates.standard_rate_per_m;
            (cpm, Line::from_cpm(cpm, quantity)?)
        }
    };

    let line = |cpm: Decimal| Line::from_cpm(cpm, quantity);

    let breakdown = match request.mode {
        AllocationMode::Standard => {
            let material_charge_cpm = rates.material_charge_per_m;
            let markup_cpm = material_charge_cpm - material_cost_cpm;
            let pool_cpm = customer_cpm - print_cpm - material_charge_cpm;
            let broker_cpm = pool_cpm * HALF;
            let intermediary_print_cpm = pool_cpm * HALF;

            Breakdown {
                quantity,
                mode: request.mode,
                customer,
                broker_margin: line(broker_cpm)?,
                intermediary_total: line(print_cpm + material_charge_cpm + intermediary_print_cpm)?,
                intermediary_print_margin: line(intermediary_print_cpm)?,
                intermediary_material_margin: line(markup_cpm)?,
                intermediary_total_margin: line(intermediary_print_cpm + markup_cpm)?,
                printer_total: line(print_cpm)?,
                material_cost: line(material_cost_cpm)?,
                material_charge: line(material_charge_cpm)?,
            }
        }
        AllocationMode::PrinterSuppliesMaterial => {
            // Fixed 10/10/80 split of customer revenue; paper moves at cost.
            let broker_cpm = customer_cpm * BROKER_SHARE;
            let intermediary_print_cpm = customer_cpm * BROKER_SHARE;

            Breakdown {
                quantity,
                mode: request.mode,
                customer,
                broker_margin: line(broker_cpm)?,
                intermediary_total: line(customer_cpm * INTERMEDIARY_SHARE)?,
                intermediary_print_margin: line(intermediary_print_cpm)?,
                intermediary_material_margin: line(Decimal::ZERO)?,
                intermediary_total_margin: line(intermediary_print_cpm)?,
                printer_total: line(customer_cpm * PRINTER_SHARE)?,
                material_cost: line(material_cost_cpm)?,
                material_charge: line(material_cost_cpm)?,
            }
        }
        AllocationMode::IntermediaryWaivesMaterialMargin => {
            // Paper at cost widens the pool; the wider pool splits 50/50.
            let pool_cpm = customer_cpm - print_cpm - material_cost_cpm;
            let broker_cpm = pool_cpm * HALF;
            let intermediary_print_cpm = pool_cpm * HALF;

            Breakdown {
                quantity,
                mode: request.mode,
                customer,
                broker_margin: line(broker_cpm)?,
                intermediary_total: line(print_cpm + material_cost_cpm + intermediary_print_cpm)?,
                intermediary_print_margin: line(intermediary_print_cpm)?,
                intermediary_material_margin: line(Decimal::ZERO)?,
                intermediary_total_margin: line(intermediary_print_cpm)?,
                printer_total: line(print_cpm)?,
                material_cost: line(material_cost_cpm)?,
                material_charge: line(material_cost_cpm)?,
            }
        }
    };

    Ok(breakdown)
}
