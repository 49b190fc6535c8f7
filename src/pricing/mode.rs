use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::engine::AllocationError;

/// The paper-supply / margin-sharing arrangement for a job.
///
/// Exactly one of three arrangements applies to a job. The legacy portal
/// stored two independent booleans for this, which let both be set at once;
/// a closed enum makes that state unrepresentable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum AllocationMode {
    /// Intermediary buys paper and resells it to the broker at the rate-table
    /// charge; the remaining margin pool splits 50/50.
    #[sea_orm(string_value = "standard")]
    Standard,
    /// Printer supplies the paper directly; customer revenue splits
    /// 10% broker / 10% intermediary / 80% printer.
    #[sea_orm(string_value = "printer_supplies_material")]
    PrinterSuppliesMaterial,
    /// Intermediary bills paper at cost (no markup) in exchange for half of
    /// the larger margin pool.
    #[sea_orm(string_value = "intermediary_waives_material_margin")]
    IntermediaryWaivesMaterialMargin,
}

impl AllocationMode {
    /// True for the arrangements in which paper is billed at cost.
    pub fn material_at_cost(self) -> bool {
        !matches!(self, AllocationMode::Standard)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AllocationMode::Standard => "standard",
            AllocationMode::PrinterSuppliesMaterial => "printer_supplies_material",
            AllocationMode::IntermediaryWaivesMaterialMargin => {
                "intermediary_waives_material_margin"
            }
        }
    }
}

impl fmt::Display for AllocationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AllocationMode {
    type Err = AllocationError;

    /// Parses the mode tags accepted at the CLI/API boundary. Past this
    /// point the closed enum guarantees the mode is one of the three.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(AllocationMode::Standard),
            "printer_supplies_material" | "supply" => Ok(AllocationMode::PrinterSuppliesMaterial),
            "intermediary_waives_material_margin" | "waiver" => {
                Ok(AllocationMode::IntermediaryWaivesMaterialMargin)
            }
            other => Err(AllocationError::InvalidMode(other.to_string())),
        }
    }
}

/// The four parties a job's money moves between.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum Party {
    #[sea_orm(string_value = "customer")]
    Customer,
    #[sea_orm(string_value = "broker")]
    Broker,
    #[sea_orm(string_value = "intermediary")]
    Intermediary,
    #[sea_orm(string_value = "printer")]
    Printer,
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Party::Customer => "customer",
            Party::Broker => "broker",
            Party::Intermediary => "intermediary",
            Party::Printer => "printer",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn mode_tags_round_trip_through_parsing() {
        for mode in [
            AllocationMode::Standard,
            AllocationMode::PrinterSuppliesMaterial,
            AllocationMode::IntermediaryWaivesMaterialMargin,
        ] {
            assert_eq!(mode.as_str().parse::<AllocationMode>().unwrap(), mode);
        }
    }

    #[test]
    fn short_aliases_parse() {
        assert_eq!(
            "supply".parse::<AllocationMode>().unwrap(),
            AllocationMode::PrinterSuppliesMaterial
        );
        assert_eq!(
            "waiver".parse::<AllocationMode>().unwrap(),
            AllocationMode::IntermediaryWaivesMaterialMargin
        );
    }

    #[test]
    fn unknown_tag_is_invalid_mode() {
        assert_matches!(
            "both_flags_set".parse::<AllocationMode>(),
            Err(AllocationError::InvalidMode(_))
        );
    }

    #[test]
    fn only_standard_carries_material_markup() {
        assert!(!AllocationMode::Standard.material_at_cost());
        assert!(AllocationMode::PrinterSuppliesMaterial.material_at_cost());
        assert!(AllocationMode::IntermediaryWaivesMaterialMargin.material_at_cost());
    }
}
