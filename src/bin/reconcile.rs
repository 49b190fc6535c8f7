//! Batch reconciliation CLI.
//!
//! Re-prices stored jobs against the current rate table and either reports
//! drift (default, dry-run) or repairs it in place (`--apply`). Exits
//! non-zero when any record failed to reconcile.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use uuid::Uuid;

use printbroker_api as api;

use api::pricing::AllocationMode;
use api::services::reconciliation::{JobSelector, ReconciliationReport, RunMode};
use api::services::{RateTableService, ReconciliationService};

#[derive(Parser, Debug)]
#[command(name = "reconcile", about = "Reconcile stored job pricing records")]
struct Cli {
    /// Job numbers to reconcile. Repeatable. Empty means every job.
    #[arg(long = "job")]
    job_numbers: Vec<String>,

    /// Job ids to reconcile. Repeatable.
    #[arg(long = "job-id")]
    job_ids: Vec<Uuid>,

    /// Restrict to jobs of one size key.
    #[arg(long)]
    size: Option<String>,

    /// Restrict to one allocation mode (standard, supply, waiver).
    #[arg(long)]
    mode: Option<String>,

    /// Stop after this many records.
    #[arg(long)]
    limit: Option<u64>,

    /// Write the recomputed values back. Without this flag the run only
    /// reports what it would change.
    #[arg(long)]
    apply: bool,

    /// Emit the report as JSON instead of text.
    #[arg(long)]
    json: bool,

    /// Recorded in the audit trail for applied changes.
    #[arg(long, default_value = "reconcile-cli")]
    actor: String,

    /// Overrides the configured database URL.
    #[arg(long)]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = match &cli.database_url {
        Some(url) => api::config::AppConfig::new(url.clone(), "cli".to_string()),
        None => api::config::load_config()?,
    };
    api::config::init_tracing(&cfg.log_level, cfg.log_json);

    let mode = cli
        .mode
        .as_deref()
        .map(str::parse::<AllocationMode>)
        .transpose()
        .context("invalid --mode")?;

    let selector = JobSelector {
        job_ids: some_if_nonempty(cli.job_ids),
        job_numbers: some_if_nonempty(cli.job_numbers),
        size_key: cli.size,
        mode,
        limit: cli.limit,
    };
    let run_mode = if cli.apply {
        RunMode::Apply
    } else {
        RunMode::DryRun
    };

    let db = Arc::new(
        api::db::establish_connection_from_app_config(&cfg)
            .await
            .context("failed to connect to database")?,
    );
    let (event_sender, event_rx) = api::events::channel(256);
    tokio::spawn(api::events::process_events(event_rx));

    let rates = RateTableService::new(db.clone());
    let service =
        ReconciliationService::new(db, rates, event_sender, cfg.reconciliation.clone());

    let report = service.run(&selector, run_mode, &cli.actor).await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if report.has_errors() {
        std::process::exit(1);
    }
    Ok(())
}

fn some_if_nonempty<T>(values: Vec<T>) -> Option<Vec<T>> {
    if values.is_empty() {
        None
    } else {
        Some(values)
    }
}

fn print_report(report: &ReconciliationReport) {
    let verb = match report.run_mode {
        RunMode::Apply => "fixed",
        RunMode::DryRun => "would fix",
    };
    println!(
        "run {}: {} {}, {} clean, {} errors",
        report.run_id,
        verb,
        report.fixed.len(),
        report.skipped.len(),
        report.errors.len()
    );
    for record in &report.fixed {
        let pinned = if record.invoice_pinned {
            " (invoice-pinned)"
        } else {
            ""
        };
        println!("  {}{}", record.job_number, pinned);
        for field in &record.fields {
            println!(
                "    {}: {} -> {}",
                field.field, field.stored, field.computed
            );
        }
    }
    for err in &report.errors {
        println!("  {}: ERROR {}", err.job_number, err.error);
    }
}
