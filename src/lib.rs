//! Print-brokerage order-management backend.
//!
//! The core of this crate is the multi-party margin allocation engine in
//! [`pricing`]: given a job's size, quantity, and paper-supply arrangement,
//! it divides the customer's payment among broker, intermediary, and
//! printer, as totals and as cost-per-thousand rates, and keeps the three
//! linked persisted records (job pricing, purchase orders, invoices)
//! consistent. Everything else is plumbing around it.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]

pub mod config;
pub mod db;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod models;
pub mod pricing;
pub mod services;

use std::sync::Arc;

use axum::{routing::get, routing::post, Json, Router};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: handlers::AppServices,
}

impl AppState {
    /// Wires the full service stack over an established connection.
    pub fn build(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        event_sender: events::EventSender,
    ) -> Self {
        let rates = services::RateTableService::new(db.clone());
        let pricing = services::PricingService::new(
            db.clone(),
            rates.clone(),
            event_sender.clone(),
            config.parties.clone(),
        );
        let reconciliation = services::ReconciliationService::new(
            db.clone(),
            rates.clone(),
            event_sender.clone(),
            config.reconciliation.clone(),
        );
        let services = handlers::AppServices {
            pricing: Arc::new(pricing),
            rates: Arc::new(rates),
            reconciliation: Arc::new(reconciliation),
        };
        Self {
            db,
            config,
            event_sender,
            services,
        }
    }
}

/// Standard response wrapper for every handler.
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "timestamp": chrono::Utc::now().to_rfc3339() }))
}

/// Builds the application router.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/pricing/allocate", post(handlers::pricing::allocate))
        .route("/pricing/validate", post(handlers::pricing::validate))
        .route("/jobs", post(handlers::pricing::create_job))
        .route("/jobs/:job_number", get(handlers::pricing::get_job))
        .route("/rates/:size_key", get(handlers::pricing::get_rate))
        .route(
            "/rates",
            get(handlers::pricing::list_rates).put(handlers::pricing::upsert_rate),
        )
        .route("/reconciliation/run", post(handlers::reconciliation::run))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
