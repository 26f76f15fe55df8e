//! Operations routes driven directly through the router, no listener.

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tally::config::CacheConfig;
use tally::coordination::BreakerSettings;
use tally::domain::NormalizedResult;
use tally::error::{Result, TallyError};
use tally::providers::{ProviderKind, SportsProvider};
use tally::services::health::{router, HealthState};
use tally::services::SportsDataService;
use tower::ServiceExt;

/// Provider that fails every call, for driving breakers open.
struct DeadProvider;

#[async_trait]
impl SportsProvider for DeadProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Espn
    }

    async fn get_schedule(
        &self,
        _league: &str,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<Vec<NormalizedResult>> {
        Err(TallyError::Provider("unreachable".to_string()))
    }

    async fn get_live_results(&self, _league: &str) -> Result<Vec<NormalizedResult>> {
        Err(TallyError::Provider("unreachable".to_string()))
    }

    async fn get_result(
        &self,
        _league: &str,
        _external_id: &str,
    ) -> Result<Option<NormalizedResult>> {
        Err(TallyError::Provider("unreachable".to_string()))
    }
}

fn dead_service() -> SportsDataService {
    SportsDataService::new(
        vec![Arc::new(DeadProvider)],
        BreakerSettings {
            failure_threshold: 2,
            open_timeout: Duration::from_secs(3600),
        },
        CacheConfig::default(),
    )
}

fn app(sports: Arc<SportsDataService>) -> Router {
    router(Arc::new(HealthState {
        started_at: Utc::now() - ChronoDuration::seconds(5),
        sports,
    }))
}

async fn send(app: &Router, method: Method, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("failed to build request");

    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("router request failed");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

    (status, body)
}

#[tokio::test]
async fn health_reports_ok_with_uptime() {
    let app = app(Arc::new(dead_service()));

    let (status, body) = send(&app, Method::GET, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["uptime_seconds"].as_u64().expect("uptime present") >= 5);
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn providers_snapshot_reflects_breakers_and_cache() {
    let sports = Arc::new(dead_service());

    // Two failed fetches open the sole provider's breaker.
    for _ in 0..2 {
        sports
            .get_live_results("nfl", false)
            .await
            .expect_err("dead provider cannot serve");
    }
    sports.cache().put("live_scores:nba", "[]".to_string(), 60);

    let app = app(Arc::clone(&sports));
    let (status, body) = send(&app, Method::GET, "/providers").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["configured_providers"], serde_json::json!(["espn"]));
    assert_eq!(body["cache_status"], "connected");
    assert_eq!(body["cache_entries"], 1);

    let breakers = body["breakers"].as_array().expect("breakers array");
    assert_eq!(breakers.len(), 1);
    assert_eq!(breakers[0]["name"], "espn_live_scores");
    assert_eq!(breakers[0]["state"], "open");
    assert_eq!(breakers[0]["failure_count"], 2);
}

#[tokio::test]
async fn reset_endpoint_closes_open_breakers() {
    let sports = Arc::new(dead_service());
    for _ in 0..2 {
        sports
            .get_live_results("nfl", false)
            .await
            .expect_err("dead provider cannot serve");
    }

    let app = app(Arc::clone(&sports));

    let (status, body) = send(&app, Method::POST, "/breakers/reset").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "reset");

    let (status, body) = send(&app, Method::GET, "/providers").await;
    assert_eq!(status, StatusCode::OK);
    let breakers = body["breakers"].as_array().expect("breakers array");
    assert_eq!(breakers[0]["state"], "closed");
    assert_eq!(breakers[0]["failure_count"], 0);
}
