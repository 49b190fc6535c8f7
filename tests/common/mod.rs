use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use rust_decimal_macros::dec;
use serde_json::Value;
use tower::ServiceExt;

use printbroker_api::{
    app_router,
    config::AppConfig,
    db, events,
    services::rates::RateTableUpsert,
    AppState,
};

/// Test harness backed by an in-memory SQLite database. One connection so
/// every query sees the same database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new("sqlite::memory:".to_string(), "test".to_string());
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to open test database");
        db::ensure_schema(&pool)
            .await
            .expect("failed to create test schema");

        let (event_sender, event_rx) = events::channel(64);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let state = AppState::build(Arc::new(pool), cfg, event_sender);
        let router = app_router(state.clone());

        Self {
            router,
            state,
            _event_task: event_task,
        }
    }

    /// Seeds the worked-scenario rate card: print $49.18/M, paper
    /// 44.70 lb/M at $0.80/lb ($35.76/M), charged at $42.91/M, standard
    /// rate $106.91/M, minimum $95.00/M.
    pub async fn seed_standard_rate(&self) {
        self.state
            .services
            .rates
            .upsert_entry(RateTableUpsert {
                size_key: "6x9".to_string(),
                description: Some("6 x 9 booklet".to_string()),
                print_cost_per_m: dec!(49.18),
                paper_weight_per_m: dec!(44.70),
                paper_cost_per_lb: dec!(0.80),
                paper_charge_per_m: dec!(42.91),
                standard_rate_per_m: dec!(106.91),
                minimum_rate_per_m: Some(dec!(95.00)),
            })
            .await
            .expect("seed rate table entry");
    }

    /// Sends a JSON request against the router and decodes the response.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(serde_json::to_vec(&json).expect("serialize request body"))
            }
            None => Body::empty(),
        };

        let request = builder.body(body).expect("build request");
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router error");

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read response body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("decode response body")
        };
        (status, json)
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}
