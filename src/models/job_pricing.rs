use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pricing::{AllocationMode, Breakdown, Line};

/// One row per priced job. Every total column is paired with a CPM column;
/// the pair must agree within one cent of `cpm x quantity / 1000`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "job_pricing")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub job_number: String,
    pub quantity: i64,
    pub size_key: String,
    pub mode: AllocationMode,

    pub customer_total: Decimal,
    pub customer_cpm: Decimal,
    pub broker_margin: Decimal,
    pub broker_margin_cpm: Decimal,
    pub intermediary_total: Decimal,
    pub intermediary_total_cpm: Decimal,
    pub intermediary_print_margin: Decimal,
    pub intermediary_print_margin_cpm: Decimal,
    pub intermediary_material_margin: Decimal,
    pub intermediary_material_margin_cpm: Decimal,
    pub intermediary_total_margin: Decimal,
    pub intermediary_total_margin_cpm: Decimal,
    pub printer_total: Decimal,
    pub printer_total_cpm: Decimal,
    pub material_cost: Decimal,
    pub material_cost_cpm: Decimal,
    pub material_charge: Decimal,
    pub material_charge_cpm: Decimal,

    pub requires_approval: bool,
    pub approval_shortfall: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "crate::models::purchase_order::Entity")]
    PurchaseOrders,
    #[sea_orm(has_many = "crate::models::invoice::Entity")]
    Invoices,
}

impl Related<crate::models::purchase_order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PurchaseOrders.def()
    }
}

impl Related<crate::models::invoice::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Invoices.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Reassembles the stored columns into the engine's breakdown shape.
    pub fn breakdown(&self) -> Breakdown {
        let line = |total, cpm| Line { total, cpm };
        Breakdown {
            quantity: self.quantity,
            mode: self.mode,
            customer: line(self.customer_total, self.customer_cpm),
            broker_margin: line(self.broker_margin, self.broker_margin_cpm),
            intermediary_total: line(self.intermediary_total, self.intermediary_total_cpm),
            intermediary_print_margin: line(
                self.intermediary_print_margin,
                self.intermediary_print_margin_cpm,
            ),
            intermediary_material_margin: line(
                self.intermediary_material_margin,
                self.intermediary_material_margin_cpm,
            ),
            intermediary_total_margin: line(
                self.intermediary_total_margin,
                self.intermediary_total_margin_cpm,
            ),
            printer_total: line(self.printer_total, self.printer_total_cpm),
            material_cost: line(self.material_cost, self.material_cost_cpm),
            material_charge: line(self.material_charge, self.material_charge_cpm),
        }
    }
}

/// Writes every total/CPM pair of a breakdown into an active model.
pub fn apply_breakdown(model: &mut ActiveModel, breakdown: &Breakdown) {
    model.quantity = Set(breakdown.quantity);
    model.mode = Set(breakdown.mode);
    model.customer_total = Set(breakdown.customer.total);
    model.customer_cpm = Set(breakdown.customer.cpm);
    model.broker_margin = Set(breakdown.broker_margin.total);
    model.broker_margin_cpm = Set(breakdown.broker_margin.cpm);
    model.intermediary_total = Set(breakdown.intermediary_total.total);
    model.intermediary_total_cpm = Set(breakdown.intermediary_total.cpm);
    model.intermediary_print_margin = Set(breakdown.intermediary_print_margin.total);
    model.intermediary_print_margin_cpm = Set(breakdown.intermediary_print_margin.cpm);
    model.intermediary_material_margin = Set(breakdown.intermediary_material_margin.total);
    model.intermediary_material_margin_cpm = Set(breakdown.intermediary_material_margin.cpm);
    model.intermediary_total_margin = Set(breakdown.intermediary_total_margin.total);
    model.intermediary_total_margin_cpm = Set(breakdown.intermediary_total_margin.cpm);
    model.printer_total = Set(breakdown.printer_total.total);
    model.printer_total_cpm = Set(breakdown.printer_total.cpm);
    model.material_cost = Set(breakdown.material_cost.total);
    model.material_cost_cpm = Set(breakdown.material_cost.cpm);
    model.material_charge = Set(breakdown.material_charge.total);
    model.material_charge_cpm = Set(breakdown.material_charge.cpm);
}
