//! Consistency checks over a computed or stored breakdown.
//!
//! Errors block a save; warnings are surfaced to the caller so historical
//! data that already violates them stays visible until it is repaired.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::engine::{Breakdown, Line};
use super::mode::AllocationMode;
use super::units::to_total;

/// One cent, the tolerance for every cross-field arithmetic identity.
pub const CENT: Decimal = dec!(0.01);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    NonPositiveCustomerTotal,
    NegativeBrokerMargin,
    NegativeIntermediaryMargin,
    MaterialMarkupNotZeroed,
    CrossFieldMismatch,
    TotalCpmDrift,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub code: IssueCode,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub errors: Vec<Issue>,
    pub warnings: Vec<Issue>,
}

impl ValidationReport {
    /// A job may only be persisted when nothing fatal was found.
    pub fn is_savable(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, code: IssueCode, message: String) {
        self.errors.push(Issue { code, message });
    }

    fn warn(&mut self, code: IssueCode, message: String) {
        self.warnings.push(Issue { code, message });
    }
}

/// Checks a breakdown against its own invariants.
pub fn validate(breakdown: &Breakdown) -> ValidationReport {
    let mut report = ValidationReport::default();

    if breakdown.customer.total <= Decimal::ZERO {
        report.error(
            IssueCode::NonPositiveCustomerTotal,
            format!("customer total is {}", breakdown.customer.total),
        );
    }

    if breakdown.broker_margin.total < Decimal::ZERO {
        report.error(
            IssueCode::NegativeBrokerMargin,
            format!("broker margin is {}", breakdown.broker_margin.total),
        );
    }

    if breakdown.intermediary_total_margin.total < Decimal::ZERO {
        report.warn(
            IssueCode::NegativeIntermediaryMargin,
            format!(
                "intermediary total margin is {}",
                breakdown.intermediary_total_margin.total
            ),
        );
    }

    // In supply/waiver modes the paper markup must be exactly zero. This is
    // the check the old portal lacked: its fix-scripts repeatedly repaired
    // paper margins that were never zeroed when the arrangement changed.
    if breakdown.mode.material_at_cost()
        && breakdown.intermediary_material_margin.total != Decimal::ZERO
    {
        report.error(
            IssueCode::MaterialMarkupNotZeroed,
            format!(
                "mode {} bills paper at cost but material margin is {}",
                breakdown.mode, breakdown.intermediary_material_margin.total
            ),
        );
    }

    // The intermediary invoice decomposes differently per arrangement: when
    // the printer supplies the paper, the paper never passes through the
    // intermediary and the charge term drops out of the identity.
    let expected_intermediary = match breakdown.mode {
        AllocationMode::PrinterSuppliesMaterial => {
            breakdown.printer_total.total + breakdown.intermediary_print_margin.total
        }
        AllocationMode::Standard | AllocationMode::IntermediaryWaivesMaterialMargin => {
            breakdown.printer_total.total
                + breakdown.material_charge.total
                + breakdown.intermediary_print_margin.total
        }
    };
    if (breakdown.intermediary_total.total - expected_intermediary).abs() > CENT {
        report.warn(
            IssueCode::CrossFieldMismatch,
            format!(
                "intermediary total {} != expected {} for mode {}",
                breakdown.intermediary_total.total, expected_intermediary, breakdown.mode
            ),
        );
    }

    for (name, line) in pairs(breakdown) {
        if let Ok(expected) = to_total(line.cpm, breakdown.quantity) {
            if (line.total - expected).abs() > CENT {
                report.warn(
                    IssueCode::TotalCpmDrift,
                    format!(
                        "{name}: total {} does not match cpm {} x {}/1000",
                        line.total, line.cpm, breakdown.quantity
                    ),
                );
            }
        }
    }

    report
}

fn pairs(breakdown: &Breakdown) -> [(&'static str, Line); 9] {
    [
        ("customer", breakdown.customer),
        ("broker_margin", breakdown.broker_margin),
        ("intermediary_total", breakdown.intermediary_total),
        ("intermediary_print_margin", breakdown.intermediary_print_margin),
        (
            "intermediary_material_margin",
            breakdown.intermediary_material_margin,
        ),
        ("intermediary_total_margin", breakdown.intermediary_total_margin),
        ("printer_total", breakdown.printer_total),
        ("material_cost", breakdown.material_cost),
        ("material_charge", breakdown.material_charge),
    ]
}
