use axum::{extract::State, Json};
use serde::Deserialize;

use crate::errors::ServiceError;
use crate::services::reconciliation::{JobSelector, ReconciliationReport, RunMode};
use crate::{ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub struct ReconcileBody {
    #[serde(default)]
    pub selector: JobSelector,
    /// Dry-run unless explicitly asked to apply.
    #[serde(default)]
    pub apply: bool,
    pub actor: String,
}

pub async fn run(
    State(state): State<AppState>,
    Json(body): Json<ReconcileBody>,
) -> Result<Json<ApiResponse<ReconciliationReport>>, ServiceError> {
    let run_mode = if body.apply {
        RunMode::Apply
    } else {
        RunMode::DryRun
    };
    let report = state
        .services
        .reconciliation
        .run(&body.selector, run_mode, &body.actor)
        .await?;
    Ok(Json(ApiResponse::ok(report)))
}
