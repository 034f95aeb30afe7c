use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use statscout_api::{app, AppState};
use statscout_common::Strategy;
use statscout_engine::extract::ProfileExtractor;
use statscout_engine::testing::{counts, MemoryStore, ScriptedExtractor};
use statscout_engine::{Orchestrator, OrchestratorDeps, TargetStore};

const A: &str = "https://www.instagram.com/alpha/";
const B: &str = "https://www.instagram.com/bravo/";

fn router_with(store: MemoryStore, fetch_delay: Duration) -> Router {
    let fetch = ScriptedExtractor::new(Strategy::Fetch)
        .with_delay(fetch_delay)
        .on_counts(A, counts(10, 1, 1))
        .on_counts(B, counts(20, 2, 2));
    let deps = OrchestratorDeps::builder()
        .store(Arc::new(store) as Arc<dyn TargetStore>)
        .fetch(Arc::new(fetch) as Arc<dyn ProfileExtractor>)
        .rendered(Arc::new(ScriptedExtractor::new(Strategy::Browser)) as Arc<dyn ProfileExtractor>)
        .fetch_delay(Duration::ZERO)
        .browser_delay(Duration::ZERO)
        .build();
    app(Arc::new(AppState {
        orchestrator: Orchestrator::new(deps),
    }))
}

fn router() -> Router {
    router_with(
        MemoryStore::new().with_row("alpha", A).with_row("bravo", B),
        Duration::ZERO,
    )
}

async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(v) => {
            request = request.header(header::CONTENT_TYPE, "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    let response = router.clone().oneshot(request.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn wait_until_resting(router: &Router) -> Value {
    for _ in 0..100 {
        let (_, status) = send(router, "GET", "/status", None).await;
        if status["phase"] != "running" && status["phase"] != "stopping" {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job did not finish");
}

#[tokio::test]
async fn health_is_plain_ok() {
    let response = router()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn dashboard_is_served_at_root() {
    let response = router()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let html = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(html.contains("setInterval(refresh, 3000)"));
}

#[tokio::test]
async fn fresh_status_is_idle() {
    let (status, body) = send(&router(), "GET", "/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["phase"], "idle");
    assert_eq!(body["processed"], 0);
    assert_eq!(body["success_count"], 0);
    assert!(body["run_id"].is_null());
}

#[tokio::test]
async fn check_previews_pending_rows() {
    let (status, body) = send(&router(), "GET", "/check", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pending_count"], 2);
    assert_eq!(body["preview_rows"][0]["display_name"], "alpha");
    assert_eq!(body["preview_rows"][1]["profile_url"], B);
}

#[tokio::test]
async fn check_reports_unreachable_store() {
    let router = router_with(MemoryStore::new().failing_listing(), Duration::ZERO);
    let (status, body) = send(&router, "GET", "/check", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].as_str().unwrap().contains("unreachable"));
}

#[tokio::test]
async fn start_runs_the_job_in_the_background() {
    let router = router();
    let (status, body) = send(&router, "POST", "/start", None).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "started");

    let done = wait_until_resting(&router).await;
    assert_eq!(done["phase"], "completed");
    assert_eq!(done["total"], 2);
    assert_eq!(done["processed"], 2);
    assert_eq!(done["current_target"], "done");
}

#[tokio::test]
async fn second_start_conflicts_and_keeps_progress() {
    let router = router_with(
        MemoryStore::new().with_row("alpha", A).with_row("bravo", B),
        Duration::from_millis(100),
    );
    let (status, _) = send(&router, "POST", "/start", None).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let (_, before) = send(&router, "GET", "/status", None).await;

    let (status, body) = send(&router, "POST", "/start", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "already running"}));

    let (status, _) = send(&router, "POST", "/scrape_specific", Some(json!({"target_rows": ["alpha"]}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, after) = send(&router, "GET", "/status", None).await;
    assert_eq!(after["run_id"], before["run_id"]);
    assert_eq!(after["started_at"], before["started_at"]);

    wait_until_resting(&router).await;
}

#[tokio::test]
async fn stop_always_succeeds_and_halts_the_job() {
    let router = router_with(
        MemoryStore::new().with_row("alpha", A).with_row("bravo", B),
        Duration::from_millis(100),
    );

    let (status, body) = send(&router, "POST", "/stop", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "stopped");

    send(&router, "POST", "/start", None).await;
    let (status, _) = send(&router, "POST", "/stop", None).await;
    assert_eq!(status, StatusCode::OK);

    let done = wait_until_resting(&router).await;
    assert_eq!(done["phase"], "idle");
    assert!(done["processed"].as_u64().unwrap() < 2);
}

#[tokio::test]
async fn scrape_specific_requires_names() {
    let router = router();
    let (status, body) = send(&router, "POST", "/scrape_specific", Some(json!({"target_rows": []}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "target_rows is required");

    let (status, _) = send(&router, "POST", "/scrape_specific", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn scrape_specific_restricts_the_job() {
    let router = router();
    let (status, body) = send(&router, "POST", "/scrape_specific", Some(json!({"target_rows": ["bravo"]}))).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "started");
    assert!(body["message"].as_str().unwrap().contains("1 rows"));

    let done = wait_until_resting(&router).await;
    assert_eq!(done["total"], 1);
    assert_eq!(done["success_count"], 1);
}

#[tokio::test]
async fn status_counters_stay_consistent_while_running() {
    let router = router_with(
        MemoryStore::new()
            .with_row("alpha", A)
            .with_row("charlie", "https://www.instagram.com/charlie/")
            .with_row("bravo", B),
        Duration::from_millis(30),
    );
    let (status, _) = send(&router, "POST", "/start", None).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let mut snapshots = 0;
    let last = loop {
        let (_, body) = send(&router, "GET", "/status", None).await;
        let processed = body["processed"].as_u64().unwrap();
        let successes = body["success_count"].as_u64().unwrap();
        let failures = body["fail_count"].as_u64().unwrap();
        let total = body["total"].as_u64().unwrap();
        assert_eq!(processed, successes + failures, "snapshot {body}");
        assert!(processed <= total, "snapshot {body}");

        snapshots += 1;
        assert!(snapshots < 2000, "job did not finish");
        if body["phase"] != "running" && body["phase"] != "stopping" {
            break body;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    };

    assert!(snapshots > 1);
    assert_eq!(last["phase"], "completed");
    assert_eq!(last["processed"], 3);
    assert_eq!(last["success_count"], 2);
    assert_eq!(last["fail_count"], 1);
}
