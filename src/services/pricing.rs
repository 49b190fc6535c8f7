use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::config::PartiesConfig;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{job_pricing, purchase_order};
use crate::pricing::{
    allocate, detect, validate, AllocationError, AllocationMode, AllocationRequest, ApprovalCheck,
    Breakdown, IssueCode, Party, RateCard, ValidationReport,
};

use super::rates::RateTableService;

/// Prices jobs: rate lookup, margin allocation, undercharge detection, and
/// consistency validation, then persistence of the job record and its two
/// purchase-order legs.
#[derive(Clone)]
pub struct PricingService {
    db: Arc<DatabaseConnection>,
    rates: RateTableService,
    event_sender: EventSender,
    parties: PartiesConfig,
}

/// Input to one pricing run. Either `size_key` or `rate_overrides` must be
/// present; `known_customer_total` switches to reverse allocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingRequest {
    pub quantity: i64,
    pub mode: AllocationMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_overrides: Option<RateCard>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub known_customer_total: Option<Decimal>,
}

/// A fully priced job: the breakdown plus everything the caller needs to
/// decide whether it can be saved or needs approval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricedJob {
    pub breakdown: Breakdown,
    pub validation: ValidationReport,
    pub approval: ApprovalCheck,
}

impl PricingService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        rates: RateTableService,
        event_sender: EventSender,
        parties: PartiesConfig,
    ) -> Self {
        Self {
            db,
            rates,
            event_sender,
            parties,
        }
    }

    /// Runs the allocation engine for a request and annotates the result.
    /// Pure apart from the rate-table lookup; persists nothing.
    #[instrument(skip(self, request), fields(quantity = request.quantity, mode = %request.mode))]
    pub async fn allocate_job(&self, request: &PricingRequest) -> Result<PricedJob, ServiceError> {
        let rates = match (&request.rate_overrides, &request.size_key) {
            (Some(overrides), _) => overrides.clone(),
            (None, Some(size_key)) => self.rates.rate_card(size_key).await?,
            (None, None) => {
                return Err(AllocationError::UnknownSize("<none>".to_string()).into());
            }
        };

        let breakdown = allocate(&AllocationRequest {
            quantity: request.quantity,
            mode: request.mode,
            rates: rates.clone(),
            known_customer_total: request.known_customer_total,
        })?;

        let approval = detect(breakdown.customer.cpm, breakdown.quantity, &rates)?;
        let validation = validate(&breakdown);

        Ok(PricedJob {
            breakdown,
            validation,
            approval,
        })
    }

    /// Persists a priced job and both purchase-order legs in one
    /// transaction. Refuses anything the validator marked fatal: a job with
    /// negative broker margin is never savable.
    #[instrument(skip(self, priced), fields(%job_number))]
    pub async fn save_job(
        &self,
        job_number: &str,
        size_key: &str,
        priced: &PricedJob,
    ) -> Result<Uuid, ServiceError> {
        if !priced.validation.is_savable() {
            if priced
                .validation
                .errors
                .iter()
                .any(|i| i.code == IssueCode::NegativeBrokerMargin)
            {
                return Err(AllocationError::NegativeBrokerMargin(
                    priced.breakdown.broker_margin.total,
                )
                .into());
            }
            let messages: Vec<_> = priced
                .validation
                .errors
                .iter()
                .map(|i| i.message.clone())
                .collect();
            return Err(ServiceError::ValidationError(messages.join("; ")));
        }

        let existing = job_pricing::Entity::find()
            .filter(job_pricing::Column::JobNumber.eq(job_number))
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(format!(
                "job {job_number} is already priced"
            )));
        }

        let job_id = Uuid::new_v4();
        let now = Utc::now();
        let breakdown = &priced.breakdown;

        let mut job = job_pricing::ActiveModel {
            id: Set(job_id),
            job_number: Set(job_number.to_string()),
            size_key: Set(size_key.to_string()),
            requires_approval: Set(priced.approval.requires_approval),
            approval_shortfall: Set(priced.approval.shortfall_total),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        job_pricing::apply_breakdown(&mut job, breakdown);

        let legs = purchase_order_legs(breakdown, &self.parties, job_id, job_number, now);

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
        job.insert(&txn).await.map_err(ServiceError::db_error)?;
        for leg in legs {
            leg.insert(&txn).await.map_err(ServiceError::db_error)?;
        }
        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(%job_id, customer_total = %breakdown.customer.total, "job pricing saved");
        self.event_sender
            .send(Event::JobPriced {
                job_id,
                job_number: job_number.to_string(),
                customer_total: breakdown.customer.total,
            })
            .await;
        if let Some(shortfall) = priced.approval.shortfall_total {
            self.event_sender
                .send(Event::ApprovalRequired {
                    job_id,
                    job_number: job_number.to_string(),
                    shortfall_total: shortfall,
                })
                .await;
        }

        Ok(job_id)
    }

    pub async fn get_job(&self, job_number: &str) -> Result<job_pricing::Model, ServiceError> {
        job_pricing::Entity::find()
            .filter(job_pricing::Column::JobNumber.eq(job_number))
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("job {job_number}")))
    }
}

/// The two purchase-order legs implied by a breakdown. Margins are derived
/// as `original - vendor` so the stored invariant holds to the cent even
/// when independently rounded totals disagree with the margin column by a
/// hair.
pub fn purchase_order_legs(
    breakdown: &Breakdown,
    parties: &PartiesConfig,
    job_id: Uuid,
    job_number: &str,
    now: chrono::DateTime<Utc>,
) -> Vec<purchase_order::ActiveModel> {
    let leg = |code: &str, from, to, original: Decimal, vendor: Decimal| {
        purchase_order::ActiveModel {
            id: Set(Uuid::new_v4()),
            po_number: Set(format!("PO-{code}-{job_number}")),
            job_id: Set(job_id),
            from_party: Set(from),
            to_party: Set(to),
            original_amount: Set(original),
            vendor_amount: Set(vendor),
            margin_amount: Set(original - vendor),
            notes: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
    };

    vec![
        leg(
            &parties.broker.code,
            Party::Broker,
            Party::Intermediary,
            breakdown.customer.total,
            breakdown.intermediary_total.total,
        ),
        leg(
            &parties.intermediary.code,
            Party::Intermediary,
            Party::Printer,
            breakdown.intermediary_total.total,
            breakdown.printer_total.total,
        ),
    ]
}
