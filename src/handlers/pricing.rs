use axum::{
    extract::{Path, State},
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::{job_pricing, rate_table};
use crate::pricing::{AllocationMode, Breakdown, RateCard, ValidationReport};
use crate::services::pricing::{PricedJob, PricingRequest};
use crate::services::rates::RateTableUpsert;
use crate::{ApiResponse, AppState};

/// Body for `POST /pricing/allocate`. The mode arrives as a string tag and
/// is validated at this boundary.
#[derive(Debug, Deserialize)]
pub struct AllocateBody {
    pub quantity: i64,
    pub mode: String,
    #[serde(default)]
    pub size_key: Option<String>,
    #[serde(default)]
    pub rate_overrides: Option<RateCard>,
    #[serde(default)]
    pub known_customer_total: Option<Decimal>,
}

impl AllocateBody {
    fn into_request(self) -> Result<PricingRequest, ServiceError> {
        let mode: AllocationMode = self.mode.parse()?;
        Ok(PricingRequest {
            quantity: self.quantity,
            mode,
            size_key: self.size_key,
            rate_overrides: self.rate_overrides,
            known_customer_total: self.known_customer_total,
        })
    }
}

pub async fn allocate(
    State(state): State<AppState>,
    Json(body): Json<AllocateBody>,
) -> Result<Json<ApiResponse<PricedJob>>, ServiceError> {
    let request = body.into_request()?;
    let priced = state.services.pricing.allocate_job(&request).await?;
    Ok(Json(ApiResponse::ok(priced)))
}

pub async fn validate(
    Json(breakdown): Json<Breakdown>,
) -> Json<ApiResponse<ValidationReport>> {
    Json(ApiResponse::ok(crate::pricing::validate(&breakdown)))
}

#[derive(Debug, Deserialize)]
pub struct CreateJobBody {
    pub job_number: String,
    pub size_key: String,
    #[serde(flatten)]
    pub allocate: AllocateBody,
}

#[derive(Debug, Serialize)]
pub struct CreatedJob {
    pub job_id: Uuid,
    pub priced: PricedJob,
}

/// Prices and persists a job in one call, the intake path.
pub async fn create_job(
    State(state): State<AppState>,
    Json(body): Json<CreateJobBody>,
) -> Result<Json<ApiResponse<CreatedJob>>, ServiceError> {
    let size_key = body.size_key.clone();
    let mut request = body.allocate.into_request()?;
    request.size_key.get_or_insert_with(|| size_key.clone());

    let priced = state.services.pricing.allocate_job(&request).await?;
    let job_id = state
        .services
        .pricing
        .save_job(&body.job_number, &size_key, &priced)
        .await?;

    Ok(Json(ApiResponse::ok(CreatedJob { job_id, priced })))
}

pub async fn get_job(
    State(state): State<AppState>,
    Path(job_number): Path<String>,
) -> Result<Json<ApiResponse<job_pricing::Model>>, ServiceError> {
    let job = state.services.pricing.get_job(&job_number).await?;
    Ok(Json(ApiResponse::ok(job)))
}

pub async fn list_rates(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<rate_table::Model>>>, ServiceError> {
    let entries = state.services.rates.list_entries().await?;
    Ok(Json(ApiResponse::ok(entries)))
}

pub async fn get_rate(
    State(state): State<AppState>,
    Path(size_key): Path<String>,
) -> Result<Json<ApiResponse<rate_table::Model>>, ServiceError> {
    let entry = state
        .services
        .rates
        .get_entry(&size_key)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("rate table entry {size_key}")))?;
    Ok(Json(ApiResponse::ok(entry)))
}

pub async fn upsert_rate(
    State(state): State<AppState>,
    Json(body): Json<RateTableUpsert>,
) -> Result<Json<ApiResponse<rate_table::Model>>, ServiceError> {
    let entry = state.services.rates.upsert_entry(body).await?;
    Ok(Json(ApiResponse::ok(entry)))
}
