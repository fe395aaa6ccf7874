//! API route definitions
//!
//! - GET  /api/v1/health        - liveness and forecast cache counters
//! - GET  /api/v1/thresholds    - effective KPI threshold table
//! - POST /api/v1/analyze       - every analysis section
//! - POST /api/v1/anomalies     - peaks, lows and insights
//! - POST /api/v1/health-scores - variability and equipment health
//! - POST /api/v1/forecast      - per-series breach forecasts

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{self, ApiState};

pub fn api_routes(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(handlers::get_health))
        .route("/thresholds", get(handlers::get_thresholds))
        .route("/analyze", post(handlers::post_analyze))
        .route("/anomalies", post(handlers::post_anomalies))
        .route("/health-scores", post(handlers::post_health_scores))
        .route("/forecast", post(handlers::post_forecast))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn create_test_state() -> ApiState {
        ApiState::new(AnalysisConfig::default())
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = api_routes(create_test_state());
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_thresholds_lists_six_kpis() {
        let app = api_routes(create_test_state());
        let response = app
            .oneshot(Request::builder().uri("/thresholds").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let v: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(v["data"].as_array().map(Vec::len), Some(6));
    }

    #[tokio::test]
    async fn test_malformed_body_is_400() {
        let app = api_routes(create_test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/analyze")
                    .header("content-type", "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
