//! Batch reconciliation of stored pricing records.
//!
//! Re-runs the allocation engine over existing jobs, diffs every persisted
//! field against the freshly computed value, and either reports the drift
//! (dry-run) or repairs it (apply). This is the single disciplined
//! replacement for the old portal's pile of one-off fix-up scripts: one
//! formula path, one tolerance, one audit trail.
//!
//! Records are processed independently and concurrently; each record's
//! compare-and-persist step runs inside its own transaction, so a failure
//! on one job never poisons the rest of the batch, and cancellation can
//! only fall between records.

use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::ReconciliationConfig;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{invoice, job_pricing, purchase_order};
use crate::pricing::{allocate, detect, AllocationRequest, ApprovalCheck, Breakdown, Party};

use super::rates::RateTableService;

/// CPM columns are stored at 4 decimal places; anything within half of the
/// last stored digit is re-rounding noise, not drift.
const CPM_TOLERANCE: Decimal = dec!(0.0005);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    DryRun,
    Apply,
}

impl RunMode {
    pub fn is_apply(self) -> bool {
        matches!(self, RunMode::Apply)
    }
}

/// Which stored records to reconcile. Empty selector means everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobSelector {
    pub job_ids: Option<Vec<Uuid>>,
    pub job_numbers: Option<Vec<String>>,
    pub size_key: Option<String>,
    pub mode: Option<crate::pricing::AllocationMode>,
    pub limit: Option<u64>,
}

/// One stored value that disagrees with the recomputed value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDiff {
    pub field: String,
    pub stored: Decimal,
    pub computed: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordDiff {
    pub job_id: Uuid,
    pub job_number: String,
    /// True when a live customer invoice pinned the total (reverse mode).
    pub invoice_pinned: bool,
    pub fields: Vec<FieldDiff>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordError {
    pub job_id: Uuid,
    pub job_number: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub run_id: Uuid,
    pub run_mode: RunMode,
    /// Records with drift: repaired in apply mode, reported in dry-run.
    pub fixed: Vec<RecordDiff>,
    /// Records whose stored values already match; never written.
    pub skipped: Vec<String>,
    pub errors: Vec<RecordError>,
}

impl ReconciliationReport {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

enum Outcome {
    Fixed(RecordDiff),
    Skipped(String),
    Failed(RecordError),
}

#[derive(Clone)]
pub struct ReconciliationService {
    db: Arc<DatabaseConnection>,
    rates: RateTableService,
    event_sender: EventSender,
    config: ReconciliationConfig,
}

impl ReconciliationService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        rates: RateTableService,
        event_sender: EventSender,
        config: ReconciliationConfig,
    ) -> Self {
        Self {
            db,
            rates,
            event_sender,
            config,
        }
    }

    /// Reconciles every selected record. Per-record failures land in the
    /// report; only selector-level database failures abort the run.
    #[instrument(skip(self, selector), fields(run_mode = ?run_mode, actor = %actor))]
    pub async fn run(
        &self,
        selector: &JobSelector,
        run_mode: RunMode,
        actor: &str,
    ) -> Result<ReconciliationReport, ServiceError> {
        let run_id = Uuid::new_v4();
        let jobs = self.select_jobs(selector).await?;
        info!(%run_id, records = jobs.len(), "reconciliation run started");

        let outcomes: Vec<Outcome> = stream::iter(
            jobs.into_iter()
                .map(|job| self.reconcile_one(run_id, job, run_mode, actor)),
        )
        .buffer_unordered(self.config.batch_concurrency)
        .collect()
        .await;

        let mut report = ReconciliationReport {
            run_id,
            run_mode,
            fixed: Vec::new(),
            skipped: Vec::new(),
            errors: Vec::new(),
        };
        for outcome in outcomes {
            match outcome {
                Outcome::Fixed(diff) => report.fixed.push(diff),
                Outcome::Skipped(job_number) => report.skipped.push(job_number),
                Outcome::Failed(err) => report.errors.push(err),
            }
        }
        report.fixed.sort_by(|a, b| a.job_number.cmp(&b.job_number));
        report.skipped.sort();
        report.errors.sort_by(|a, b| a.job_number.cmp(&b.job_number));

        info!(
            %run_id,
            fixed = report.fixed.len(),
            skipped = report.skipped.len(),
            errors = report.errors.len(),
            "reconciliation run finished"
        );
        Ok(report)
    }

    async fn select_jobs(
        &self,
        selector: &JobSelector,
    ) -> Result<Vec<job_pricing::Model>, ServiceError> {
        let mut query = job_pricing::Entity::find();
        if let Some(ids) = &selector.job_ids {
            query = query.filter(job_pricing::Column::Id.is_in(ids.clone()));
        }
        if let Some(numbers) = &selector.job_numbers {
            query = query.filter(job_pricing::Column::JobNumber.is_in(numbers.clone()));
        }
        if let Some(size_key) = &selector.size_key {
            query = query.filter(job_pricing::Column::SizeKey.eq(size_key.clone()));
        }
        if let Some(mode) = selector.mode {
            query = query.filter(job_pricing::Column::Mode.eq(mode));
        }
        query = query.order_by_asc(job_pricing::Column::JobNumber);
        if let Some(limit) = selector.limit {
            query = query.limit(limit);
        }
        query.all(&*self.db).await.map_err(ServiceError::db_error)
    }

    /// Reconciles a single job. Never propagates an error: each record's
    /// failure is isolated into the report and the batch continues.
    async fn reconcile_one(
        &self,
        run_id: Uuid,
        job: job_pricing::Model,
        run_mode: RunMode,
        actor: &str,
    ) -> Outcome {
        let job_id = job.id;
        let job_number = job.job_number.clone();
        match self.try_reconcile_one(run_id, job, run_mode, actor).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(%job_id, %job_number, error = %err, "record reconciliation failed");
                Outcome::Failed(RecordError {
                    job_id,
                    job_number,
                    error: err.to_string(),
                })
            }
        }
    }

    async fn try_reconcile_one(
        &self,
        run_id: Uuid,
        job: job_pricing::Model,
        run_mode: RunMode,
        actor: &str,
    ) -> Result<Outcome, ServiceError> {
        let rates = self.rates.rate_card(&job.size_key).await?;

        // A live broker-to-customer invoice pins the customer amount: its
        // value is the source of truth and the same per-mode formulas are
        // back-solved from it.
        let pinned_total = self.pinned_customer_total(job.id).await?;
        let invoice_pinned = pinned_total.is_some();

        let computed = allocate(&AllocationRequest {
            quantity: job.quantity,
            mode: job.mode,
            rates: rates.clone(),
            known_customer_total: pinned_total,
        })?;
        let approval = detect(computed.customer.cpm, computed.quantity, &rates)?;

        let purchase_orders = purchase_order::Entity::find()
            .filter(purchase_order::Column::JobId.eq(job.id))
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;

        let fields = self.diff_record(&job, &computed, &approval, &purchase_orders);
        if fields.is_empty() {
            return Ok(Outcome::Skipped(job.job_number));
        }

        if run_mode.is_apply() {
            self.apply_record(run_id, &job, &computed, &approval, &purchase_orders, &fields, actor)
                .await?;
            self.event_sender
                .send(Event::JobReconciled {
                    job_id: job.id,
                    run_id,
                    fields_changed: fields.len(),
                })
                .await;
        }

        Ok(Outcome::Fixed(RecordDiff {
            job_id: job.id,
            job_number: job.job_number,
            invoice_pinned,
            fields,
        }))
    }

    async fn pinned_customer_total(&self, job_id: Uuid) -> Result<Option<Decimal>, ServiceError> {
        let latest = invoice::Entity::find()
            .filter(invoice::Column::JobId.eq(job_id))
            .filter(invoice::Column::FromParty.eq(Party::Broker))
            .filter(invoice::Column::ToParty.eq(Party::Customer))
            .order_by_desc(invoice::Column::CreatedAt)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        Ok(latest.into_iter().find(|i| i.pins_amount()).map(|i| i.amount))
    }

    fn money_tolerance(&self) -> Decimal {
        Decimal::new(i64::from(self.config.tolerance_cents), 2)
    }

    /// Diffs every stored field of the job record and its purchase-order
    /// legs against the recomputed values.
    fn diff_record(
        &self,
        job: &job_pricing::Model,
        computed: &Breakdown,
        approval: &ApprovalCheck,
        purchase_orders: &[purchase_order::Model],
    ) -> Vec<FieldDiff> {
        let tolerance = self.money_tolerance();
        let mut diffs = Vec::new();
        let stored = job.breakdown();

        let mut push = |field: &str, stored: Decimal, computed: Decimal, tol: Decimal| {
            if (stored - computed).abs() > tol {
                diffs.push(FieldDiff {
                    field: field.to_string(),
                    stored,
                    computed,
                });
            }
        };

        let pairs = [
            ("customer", stored.customer, computed.customer),
            ("broker_margin", stored.broker_margin, computed.broker_margin),
            (
                "intermediary_total",
                stored.intermediary_total,
                computed.intermediary_total,
            ),
            (
                "intermediary_print_margin",
                stored.intermediary_print_margin,
                computed.intermediary_print_margin,
            ),
            (
                "intermediary_material_margin",
                stored.intermediary_material_margin,
                computed.intermediary_material_margin,
            ),
            (
                "intermediary_total_margin",
                stored.intermediary_total_margin,
                computed.intermediary_total_margin,
            ),
            ("printer_total", stored.printer_total, computed.printer_total),
            ("material_cost", stored.material_cost, computed.material_cost),
            ("material_charge", stored.material_charge, computed.material_charge),
        ];
        for (name, old, new) in pairs {
            push(&format!("{name}_total"), old.total, new.total, tolerance);
            push(&format!("{name}_cpm"), old.cpm, new.cpm, CPM_TOLERANCE);
        }

        push(
            "approval_shortfall",
            job.approval_shortfall.unwrap_or(Decimal::ZERO),
            approval.shortfall_total.unwrap_or(Decimal::ZERO),
            tolerance,
        );

        for (from, to, original, vendor) in expected_legs(computed) {
            if let Some(po) = purchase_orders
                .iter()
                .find(|po| po.from_party == from && po.to_party == to)
            {
                let prefix = format!("po_{from}_{to}");
                push(&format!("{prefix}_original"), po.original_amount, original, tolerance);
                push(&format!("{prefix}_vendor"), po.vendor_amount, vendor, tolerance);
                push(
                    &format!("{prefix}_margin"),
                    po.margin_amount,
                    original - vendor,
                    tolerance,
                );
            }
        }

        diffs
    }

    /// Persists the recomputed values inside one transaction scoped to this
    /// record, with an audit entry recording old and new values.
    #[allow(clippy::too_many_arguments)]
    async fn apply_record(
        &self,
        run_id: Uuid,
        job: &job_pricing::Model,
        computed: &Breakdown,
        approval: &ApprovalCheck,
        purchase_orders: &[purchase_order::Model],
        fields: &[FieldDiff],
        actor: &str,
    ) -> Result<(), ServiceError> {
        let now = Utc::now();
        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;

        let mut update = job_pricing::ActiveModel {
            id: Set(job.id),
            requires_approval: Set(approval.requires_approval),
            approval_shortfall: Set(approval.shortfall_total),
            updated_at: Set(now),
            ..Default::default()
        };
        job_pricing::apply_breakdown(&mut update, computed);
        update.update(&txn).await.map_err(ServiceError::db_error)?;

        for (from, to, original, vendor) in expected_legs(computed) {
            if let Some(po) = purchase_orders
                .iter()
                .find(|po| po.from_party == from && po.to_party == to)
            {
                purchase_order::ActiveModel {
                    id: Set(po.id),
                    original_amount: Set(original),
                    vendor_amount: Set(vendor),
                    margin_amount: Set(original - vendor),
                    updated_at: Set(now),
                    ..Default::default()
                }
                .update(&txn)
                .await
                .map_err(ServiceError::db_error)?;
            }
        }

        let (old_values, new_values) = audit_maps(fields);
        crate::models::reconciliation_audit::ActiveModel {
            id: Set(Uuid::new_v4()),
            run_id: Set(run_id),
            job_id: Set(job.id),
            actor: Set(actor.to_string()),
            old_values: Set(old_values),
            new_values: Set(new_values),
            created_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(ServiceError::db_error)?;

        txn.commit().await.map_err(ServiceError::db_error)?;
        Ok(())
    }
}

/// The amounts each purchase-order leg should carry for a breakdown:
/// Broker -> Intermediary, then Intermediary -> Printer.
fn expected_legs(breakdown: &Breakdown) -> [(Party, Party, Decimal, Decimal); 2] {
    [
        (
            Party::Broker,
            Party::Intermediary,
            breakdown.customer.total,
            breakdown.intermediary_total.total,
        ),
        (
            Party::Intermediary,
            Party::Printer,
            breakdown.intermediary_total.total,
            breakdown.printer_total.total,
        ),
    ]
}

/// Values are normalized before stringifying: stored decimals come back from
/// the database with backend-dependent scale (`90` vs `90.00`), and the
/// audit trail should read the same either way.
fn audit_maps(fields: &[FieldDiff]) -> (Value, Value) {
    let mut old_values = Map::new();
    let mut new_values = Map::new();
    for diff in fields {
        old_values.insert(diff.field.clone(), json!(diff.stored.normalize().to_string()));
        new_values.insert(diff.field.clone(), json!(diff.computed.normalize().to_string()));
    }
    (Value::Object(old_values), Value::Object(new_values))
}
