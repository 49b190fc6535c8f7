use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pricing::Party;

#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    #[sea_orm(string_value = "Draft")]
    Draft,
    #[sea_orm(string_value = "Issued")]
    Issued,
    #[sea_orm(string_value = "Paid")]
    Paid,
    #[sea_orm(string_value = "Void")]
    Void,
}

/// Directional billing record between two parties for one job. Once an
/// invoice is cut, its amount is the source of truth for that leg:
/// recalculation starts from the invoiced amount and never overrides it.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "invoices")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub invoice_number: String,
    pub job_id: Uuid,
    pub from_party: Party,
    pub to_party: Party,
    pub amount: Decimal,
    pub status: InvoiceStatus,
    pub issued_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "crate::models::job_pricing::Entity",
        from = "Column::JobId",
        to = "crate::models::job_pricing::Column::Id"
    )]
    Job,
}

impl Related<crate::models::job_pricing::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Job.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// An invoice pins its leg while it is live (not voided).
    pub fn pins_amount(&self) -> bool {
        !matches!(self.status, InvoiceStatus::Void)
    }
}
