mod common;

use axum::http::{Method, StatusCode};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde_json::json;
use uuid::Uuid;

use printbroker_api::models::purchase_order;
use printbroker_api::pricing::AllocationMode;
use printbroker_api::services::pricing::PricingRequest;

use common::TestApp;

fn decimal(value: &serde_json::Value) -> Decimal {
    value
        .as_str()
        .map(|s| s.parse().expect("decimal string"))
        .or_else(|| value.as_f64().map(|f| Decimal::try_from(f).expect("decimal")))
        .expect("decimal value")
}

#[tokio::test]
async fn creating_a_standard_job_persists_breakdown_and_po_legs() {
    let app = TestApp::new().await;
    app.seed_standard_rate().await;

    let (status, body) = app
        .request(
            Method::POST,
            "/jobs",
            Some(json!({
                "job_number": "J-1001",
                "size_key": "6x9",
                "quantity": 15000,
                "mode": "standard",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "body: {body}");

    let breakdown = &body["data"]["priced"]["breakdown"];
    assert_eq!(decimal(&breakdown["customer"]["total"]), dec!(1603.65));
    assert_eq!(decimal(&breakdown["broker_margin"]["total"]), dec!(111.15));
    assert_eq!(decimal(&breakdown["printer_total"]["total"]), dec!(737.70));
    assert_eq!(
        decimal(&breakdown["intermediary_total"]["total"]),
        dec!(1492.50)
    );
    assert_eq!(
        decimal(&breakdown["intermediary_material_margin"]["cpm"]),
        dec!(7.15)
    );
    assert_eq!(body["data"]["priced"]["approval"]["requires_approval"], false);

    // Two purchase-order legs, margins exactly original minus vendor.
    let job_id: Uuid = body["data"]["job_id"]
        .as_str()
        .and_then(|s| s.parse().ok())
        .expect("job id");
    let legs = purchase_order::Entity::find()
        .filter(purchase_order::Column::JobId.eq(job_id))
        .all(&*app.state.db)
        .await
        .expect("load purchase orders");
    assert_eq!(legs.len(), 2);

    let broker_leg = legs
        .iter()
        .find(|po| po.po_number == "PO-IMP-J-1001")
        .expect("broker leg");
    assert_eq!(broker_leg.original_amount, dec!(1603.65));
    assert_eq!(broker_leg.vendor_amount, dec!(1492.50));
    assert_eq!(broker_leg.margin_amount, dec!(111.15));

    let printer_leg = legs
        .iter()
        .find(|po| po.po_number == "PO-BRD-J-1001")
        .expect("printer leg");
    assert_eq!(printer_leg.original_amount, dec!(1492.50));
    assert_eq!(printer_leg.vendor_amount, dec!(737.70));
    for leg in &legs {
        assert!(leg.margin_consistent());
    }

    // The job is readable back by number.
    let (status, body) = app.request(Method::GET, "/jobs/J-1001", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["quantity"], 15000);
    assert_eq!(decimal(&body["data"]["customer_total"]), dec!(1603.65));
}

#[tokio::test]
async fn duplicate_job_number_conflicts() {
    let app = TestApp::new().await;
    app.seed_standard_rate().await;

    let body = json!({
        "job_number": "J-2001",
        "size_key": "6x9",
        "quantity": 5000,
        "mode": "standard",
    });
    let (status, _) = app.request(Method::POST, "/jobs", Some(body.clone())).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.request(Method::POST, "/jobs", Some(body)).await;
    assert_eq!(status, StatusCode::CONFLICT, "body: {body}");
}

#[tokio::test]
async fn supply_mode_splits_ten_ten_eighty_of_the_pinned_total() {
    let app = TestApp::new().await;
    app.seed_standard_rate().await;

    let (status, body) = app
        .request(
            Method::POST,
            "/pricing/allocate",
            Some(json!({
                "quantity": 15000,
                "mode": "supply",
                "size_key": "6x9",
                "known_customer_total": "450.00",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "body: {body}");

    let breakdown = &body["data"]["breakdown"];
    assert_eq!(decimal(&breakdown["customer"]["total"]), dec!(450.00));
    assert_eq!(decimal(&breakdown["broker_margin"]["total"]), dec!(45.00));
    assert_eq!(decimal(&breakdown["intermediary_total"]["total"]), dec!(405.00));
    assert_eq!(decimal(&breakdown["printer_total"]["total"]), dec!(360.00));
    assert_eq!(
        decimal(&breakdown["intermediary_material_margin"]["total"]),
        Decimal::ZERO
    );
}

#[tokio::test]
async fn negative_broker_margin_blocks_the_save() {
    let app = TestApp::new().await;
    app.seed_standard_rate().await;

    // $200 for 5,000 pieces is $40/M, far below print + paper charge.
    let (status, body) = app
        .request(
            Method::POST,
            "/jobs",
            Some(json!({
                "job_number": "J-3001",
                "size_key": "6x9",
                "quantity": 5000,
                "mode": "standard",
                "known_customer_total": "200.00",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "body: {body}");

    // Nothing was persisted.
    let (status, _) = app.request(Method::GET, "/jobs/J-3001", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn quote_below_minimum_rate_requires_approval() {
    let app = TestApp::new().await;
    app.seed_standard_rate().await;

    // $930 for 10,000 pieces is $93/M: still above the $92.09/M cost line
    // (print + paper charge), so the pool stays positive and the job is
    // savable, but below the $95/M floor.
    let (status, body) = app
        .request(
            Method::POST,
            "/jobs",
            Some(json!({
                "job_number": "J-4001",
                "size_key": "6x9",
                "quantity": 10000,
                "mode": "standard",
                "known_customer_total": "930.00",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "body: {body}");

    let approval = &body["data"]["priced"]["approval"];
    assert_eq!(approval["requires_approval"], true);
    assert_eq!(decimal(&approval["shortfall_total"]), dec!(20.00));

    // The advisory flag is stored with the job, the save is not blocked.
    let (_, body) = app.request(Method::GET, "/jobs/J-4001", None).await;
    assert_eq!(body["data"]["requires_approval"], true);
}

#[tokio::test]
async fn unknown_size_and_unknown_job_return_not_found() {
    let app = TestApp::new().await;

    let (status, _) = app
        .request(
            Method::POST,
            "/pricing/allocate",
            Some(json!({
                "quantity": 1000,
                "mode": "standard",
                "size_key": "9x12",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.request(Method::GET, "/jobs/J-9999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.request(Method::GET, "/rates/9x12", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unrecognized_mode_tag_is_a_bad_request() {
    let app = TestApp::new().await;
    app.seed_standard_rate().await;

    let (status, _) = app
        .request(
            Method::POST,
            "/pricing/allocate",
            Some(json!({
                "quantity": 1000,
                "mode": "deluxe",
                "size_key": "6x9",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn rate_upsert_roundtrips_through_the_api() {
    let app = TestApp::new().await;

    let (status, _) = app
        .request(
            Method::PUT,
            "/rates",
            Some(json!({
                "size_key": "8x10",
                "description": "8 x 10 flyer",
                "print_cost_per_m": "38.50",
                "paper_weight_per_m": "30.00",
                "paper_cost_per_lb": "0.75",
                "paper_charge_per_m": "27.00",
                "standard_rate_per_m": "82.00",
                "minimum_rate_per_m": null,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.request(Method::GET, "/rates/8x10", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decimal(&body["data"]["standard_rate_per_m"]), dec!(82.00));

    let (status, body) = app.request(Method::GET, "/rates", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().map(|a| a.len()), Some(1));

    // Paper cost per M is derived, not stored.
    let entry = app
        .state
        .services
        .rates
        .get_entry("8x10")
        .await
        .expect("query")
        .expect("entry");
    assert_eq!(entry.material_cost_per_m(), dec!(22.50));
}

#[tokio::test]
async fn rate_overrides_bypass_the_rate_table() {
    let app = TestApp::new().await;

    let priced = app
        .state
        .services
        .pricing
        .allocate_job(&PricingRequest {
            quantity: 10_000,
            mode: AllocationMode::IntermediaryWaivesMaterialMargin,
            size_key: None,
            rate_overrides: Some(printbroker_api::pricing::RateCard {
                size_key: "custom".to_string(),
                print_cost_per_m: dec!(40.00),
                material_cost_per_m: dec!(30.00),
                material_charge_per_m: dec!(36.00),
                standard_rate_per_m: dec!(100.00),
                minimum_rate_per_m: None,
            }),
            known_customer_total: None,
        })
        .await
        .expect("allocate with overrides");

    // Waiver pool is customer - print - cost; the charge column is ignored.
    assert_eq!(priced.breakdown.broker_margin.cpm, dec!(15.00));
    assert_eq!(priced.breakdown.intermediary_material_margin.total, Decimal::ZERO);
    assert!(priced.validation.is_savable());
}
