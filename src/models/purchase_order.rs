use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pricing::Party;

/// Directional purchase order between two parties for one job.
/// Invariant: `margin_amount = original_amount - vendor_amount`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "purchase_orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub po_number: String,
    pub job_id: Uuid,
    pub from_party: Party,
    pub to_party: Party,
    /// The amount the issuing party collects on this leg.
    pub original_amount: Decimal,
    /// The amount passed through to the vendor on this leg.
    pub vendor_amount: Decimal,
    pub margin_amount: Decimal,
    pub notes: Option<String>,
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
    /// True when the stored amounts satisfy the margin identity.
    pub fn margin_consistent(&self) -> bool {
        self.margin_amount == self.original_amount - self.vendor_amount
    }
}
