//! API Regression Tests
//!
//! In-process tests that build the Axum app via `create_app()` and exercise
//! all /api/v1/* endpoints using `tower::ServiceExt::oneshot()`.
//! No binary spawn, no network port.

use liftguard::api::{create_app, ApiState};
use liftguard::config::AnalysisConfig;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::time::Duration;
use tower::ServiceExt;

fn create_test_app() -> Router {
    create_app(ApiState::new(AnalysisConfig::default()))
}

/// Thirty daily door-friction records for one unit
fn records() -> Value {
    let rows: Vec<Value> = (1..=30)
        .map(|d| {
            json!({
                "EQ": "EQ1",
                "Floor": 1,
                "CKPI": "Door Friction",
                "CKPI_Statistics_Date": format!("2024-01-{d:02}"),
                "AVE": 40.0 + f64::from(d % 4),
            })
        })
        .collect();
    Value::Array(rows)
}

fn request_body() -> Value {
    json!({
        "records": records(),
        "context": { "today": "2024-01-30", "horizon_days": 60 }
    })
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    read(response).await
}

async fn post(app: Router, uri: &str, body: &Value) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    read(response).await
}

async fn read(response: axum::response::Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn get_endpoints_return_200_with_envelope() {
    for uri in ["/api/v1/health", "/api/v1/thresholds"] {
        let (status, v) = get(create_test_app(), uri).await;
        assert_eq!(status, StatusCode::OK, "{uri}");
        assert!(v.get("data").is_some(), "{uri} missing data");
        assert_eq!(v["meta"]["version"], "1");
    }
}

#[tokio::test]
async fn unknown_route_is_404() {
    let response = create_test_app()
        .oneshot(Request::builder().uri("/api/v1/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn analyze_returns_every_section() {
    let (status, v) = post(create_test_app(), "/api/v1/analyze", &request_body()).await;
    assert_eq!(status, StatusCode::OK);
    let data = &v["data"];
    assert_eq!(data["readings_selected"], 30);
    assert!(data["anomalies"]["summaries"].is_array());
    assert_eq!(data["health"]["equipment"][0]["equipment_id"], "EQ1");
    assert_eq!(data["forecasts"][0]["outcome"], "forecast");
}

#[tokio::test]
async fn section_endpoints_return_their_section() {
    let (status, v) = post(create_test_app(), "/api/v1/anomalies", &request_body()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["data"]["summaries"][0]["floor"], "1");
    assert_eq!(v["data"]["summaries"][0]["row_count"], 30);

    let (status, v) = post(create_test_app(), "/api/v1/health-scores", &request_body()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["data"]["kpi_scores"][0]["kpi"], "doorfriction");

    let (status, v) = post(create_test_app(), "/api/v1/forecast", &request_body()).await;
    assert_eq!(status, StatusCode::OK);
    let forecast = &v["data"][0];
    assert_eq!(forecast["series_key"]["equipment_id"], "EQ1");
    assert_eq!(forecast["predicted"].as_array().map(Vec::len), Some(60));
}

#[tokio::test]
async fn explicit_table_form_is_accepted() {
    let body = json!({
        "table": {
            "columns": ["equipment", "floor", "kpi", "timestamp", "value"],
            "rows": [
                ["EQ9", "2", "Lock Hook Time", "01/05/2024", 0.5],
                ["EQ9", "2", "Lock Hook Time", "01/06/2024", null]
            ]
        },
        "context": { "today": "2024-01-06", "horizon_days": 30 }
    });
    let (status, v) = post(create_test_app(), "/api/v1/anomalies", &body).await;
    assert_eq!(status, StatusCode::OK);
    let summary = &v["data"]["summaries"][0];
    assert_eq!(summary["kpi"], "lockhooktime");
    assert_eq!(summary["nodata_count"], 1);
}

#[tokio::test]
async fn missing_column_is_400() {
    let body = json!({
        "records": [{ "EQ": "EQ1", "Floor": 1, "CKPI": "Door Friction", "AVE": 40.0 }],
    });
    let (status, v) = post(create_test_app(), "/api/v1/analyze", &body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(v["error"]["code"], "VALIDATION_ERROR");
    assert!(v["error"]["message"].as_str().unwrap().contains("timestamp"));
}

#[tokio::test]
async fn out_of_range_parameters_are_400() {
    let mut body = request_body();
    body["context"]["sensitivity"] = json!(9.0);
    let (status, v) = post(create_test_app(), "/api/v1/analyze", &body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(v["error"]["code"], "INVALID_PARAMETERS");
}

#[tokio::test]
async fn unknown_context_field_is_400() {
    let mut body = request_body();
    body["context"]["sensitivty"] = json!(1.0);
    let (status, v) = post(create_test_app(), "/api/v1/analyze", &body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(v["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn timeout_is_503() {
    let service = ApiState::new(AnalysisConfig::default()).with_timeout(Duration::ZERO);
    let (status, v) = post(create_app(service), "/api/v1/analyze", &request_body()).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(v["error"]["code"], "SERVICE_UNAVAILABLE");
}
