use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pricing::RateCard;

/// Per-size baseline rates. One row per sheet size the brokerage quotes.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "rate_table_entries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub size_key: String,
    pub description: Option<String>,
    /// Printer's charge per thousand pieces.
    pub print_cost_per_m: Decimal,
    /// Paper weight per thousand pieces, in pounds.
    pub paper_weight_per_m: Decimal,
    pub paper_cost_per_lb: Decimal,
    /// Intermediary's paper resale rate to the broker, per thousand.
    pub paper_charge_per_m: Decimal,
    pub standard_rate_per_m: Decimal,
    /// Floor below which a quote needs managerial approval.
    pub minimum_rate_per_m: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// The actual paper cost per thousand pieces.
    pub fn material_cost_per_m(&self) -> Decimal {
        self.paper_weight_per_m * self.paper_cost_per_lb
    }

    pub fn rate_card(&self) -> RateCard {
        RateCard {
            size_key: self.size_key.clone(),
            print_cost_per_m: self.print_cost_per_m,
            material_cost_per_m: self.material_cost_per_m(),
            material_charge_per_m: self.paper_charge_per_m,
            standard_rate_per_m: self.standard_rate_per_m,
            minimum_rate_per_m: self.minimum_rate_per_m,
        }
    }
}
