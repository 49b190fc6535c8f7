use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::rate_table;
use crate::pricing::{AllocationError, RateCard};

/// Lookup and maintenance of the per-size baseline rate table.
#[derive(Clone)]
pub struct RateTableService {
    db: Arc<DatabaseConnection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateTableUpsert {
    pub size_key: String,
    pub description: Option<String>,
    pub print_cost_per_m: Decimal,
    pub paper_weight_per_m: Decimal,
    pub paper_cost_per_lb: Decimal,
    pub paper_charge_per_m: Decimal,
    pub standard_rate_per_m: Decimal,
    pub minimum_rate_per_m: Option<Decimal>,
}

impl RateTableService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn get_entry(
        &self,
        size_key: &str,
    ) -> Result<Option<rate_table::Model>, ServiceError> {
        rate_table::Entity::find()
            .filter(rate_table::Column::SizeKey.eq(size_key))
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Resolves the rate card for a size, failing with `UnknownSize` when
    /// the table has no entry.
    #[instrument(skip(self))]
    pub async fn rate_card(&self, size_key: &str) -> Result<RateCard, ServiceError> {
        let entry = self
            .get_entry(size_key)
            .await?
            .ok_or_else(|| AllocationError::UnknownSize(size_key.to_string()))?;
        Ok(entry.rate_card())
    }

    pub async fn list_entries(&self) -> Result<Vec<rate_table::Model>, ServiceError> {
        rate_table::Entity::find()
            .order_by_asc(rate_table::Column::SizeKey)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Creates or updates the entry for a size key.
    #[instrument(skip(self, input), fields(size_key = %input.size_key))]
    pub async fn upsert_entry(
        &self,
        input: RateTableUpsert,
    ) -> Result<rate_table::Model, ServiceError> {
        let now = Utc::now();
        let existing = self.get_entry(&input.size_key).await?;

        let model = rate_table::ActiveModel {
            id: Set(existing.as_ref().map(|e| e.id).unwrap_or_else(Uuid::new_v4)),
            size_key: Set(input.size_key),
            description: Set(input.description),
            print_cost_per_m: Set(input.print_cost_per_m),
            paper_weight_per_m: Set(input.paper_weight_per_m),
            paper_cost_per_lb: Set(input.paper_cost_per_lb),
            paper_charge_per_m: Set(input.paper_charge_per_m),
            standard_rate_per_m: Set(input.standard_rate_per_m),
            minimum_rate_per_m: Set(input.minimum_rate_per_m),
            created_at: Set(existing.as_ref().map(|e| e.created_at).unwrap_or(now)),
            updated_at: Set(now),
        };

        let saved = if existing.is_some() {
            model.update(&*self.db).await
        } else {
            model.insert(&*self.db).await
        }
        .map_err(ServiceError::db_error)?;

        Ok(saved)
    }
}
