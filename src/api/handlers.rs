//! API handlers
//!
//! All handlers return `Response` via [`ApiResponse::ok`] or [`ApiErrorResponse`].

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::Response;
use axum::Json;
use serde::Serialize;

use super::envelope::{ApiErrorResponse, ApiResponse};
use crate::engine::{AnalysisReport, AnalysisSection, CacheStats};
use crate::service::{AnalysisRequest, AnalysisService};
use crate::types::KpiPolicy;

/// Shared handler state
pub type ApiState = AnalysisService;

#[derive(Debug, Serialize)]
pub struct ServiceHealth {
    pub status: &'static str,
    pub version: &'static str,
    pub forecast_cache: CacheStats,
}

pub async fn get_health(State(service): State<ApiState>) -> Response {
    ApiResponse::ok(ServiceHealth {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        forecast_cache: service.cache_stats(),
    })
}

pub async fn get_thresholds(State(service): State<ApiState>) -> Response {
    let entries: Vec<&KpiPolicy> = service.policy().entries().collect();
    ApiResponse::ok(entries)
}

async fn run(
    service: &ApiState,
    body: Result<Json<AnalysisRequest>, JsonRejection>,
    section: AnalysisSection,
) -> Result<AnalysisReport, Response> {
    let Json(request) = body.map_err(|e| ApiErrorResponse::bad_request(e.body_text()))?;
    service
        .handle(request, section)
        .await
        .map_err(|e| ApiErrorResponse::from_service(&e))
}

pub async fn post_analyze(
    State(service): State<ApiState>,
    body: Result<Json<AnalysisRequest>, JsonRejection>,
) -> Response {
    match run(&service, body, AnalysisSection::All).await {
        Ok(report) => ApiResponse::ok(report),
        Err(resp) => resp,
    }
}

pub async fn post_anomalies(
    State(service): State<ApiState>,
    body: Result<Json<AnalysisRequest>, JsonRejection>,
) -> Response {
    match run(&service, body, AnalysisSection::Anomalies).await {
        Ok(report) => ApiResponse::ok(report.anomalies.unwrap_or_default()),
        Err(resp) => resp,
    }
}

pub async fn post_health_scores(
    State(service): State<ApiState>,
    body: Result<Json<AnalysisRequest>, JsonRejection>,
) -> Response {
    match run(&service, body, AnalysisSection::Health).await {
        Ok(report) => ApiResponse::ok(report.health.unwrap_or_default()),
        Err(resp) => resp,
    }
}

pub async fn post_forecast(
    State(service): State<ApiState>,
    body: Result<Json<AnalysisRequest>, JsonRejection>,
) -> Response {
    match run(&service, body, AnalysisSection::Forecast).await {
        Ok(report) => ApiResponse::ok(report.forecasts.unwrap_or_default()),
        Err(resp) => resp,
    }
}
