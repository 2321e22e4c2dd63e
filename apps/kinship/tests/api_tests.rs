//! Integration tests for the Kinship HTTP API.
//!
//! Uses axum-test to test the API handlers without starting a real server.

// Allow unwrap and panic in tests - these are standard for test code
// Allow holding MutexGuard across await in auth tests - tests are serialized
// intentionally to avoid env var conflicts
#![allow(clippy::unwrap_used, clippy::panic, clippy::await_holding_lock)]

use axum_test::TestServer;
use kinship::api::{
    AppState, CreateRequest, CreateResponse, FeaturesResponse, HealthResponse, SignOffRequest,
    SignOffResponse, StatusResponse, WithdrawRequest, WithdrawResponse, create_router,
};
use kinship_core::{MemoryStore, ProgressionEngine, RecordedMetrics, StoreBackend};
use serde_json::json;
use std::sync::Mutex;

/// Mutex to serialize auth tests since they modify env vars.
static AUTH_TEST_MUTEX: Mutex<()> = Mutex::new(());

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Guard wrapper that holds the mutex and ensures cleanup on drop.
struct TestGuard {
    _guard: std::sync::MutexGuard<'static, ()>,
}

impl Drop for TestGuard {
    fn drop(&mut self) {
        // SAFETY: Tests run sequentially under AUTH_TEST_MUTEX, so no concurrent env access.
        unsafe { std::env::remove_var("KINSHIP_API_KEY") };
    }
}

/// Create a test server with a fresh in-memory engine.
/// Returns a guard that must be kept alive during the test.
fn create_test_server() -> (TestServer, TestGuard) {
    let guard = AUTH_TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    // SAFETY: Tests run sequentially under AUTH_TEST_MUTEX, so no concurrent env access.
    unsafe { std::env::remove_var("KINSHIP_API_KEY") };
    let engine = ProgressionEngine::new(
        StoreBackend::InMemory(MemoryStore::new()),
        RecordedMetrics::new(),
    );
    let state = AppState::new(engine);
    let router = create_router(state);
    (
        TestServer::new(router).unwrap(),
        TestGuard { _guard: guard },
    )
}

/// Create a relationship 1 between parties 10 and 20.
async fn create_default_relationship(server: &TestServer) {
    let response = server
        .post("/relationships")
        .json(&CreateRequest {
            relationship_id: 1,
            initiator_id: 10,
            recipient_id: 20,
        })
        .await;
    response.assert_status_ok();
}

// =============================================================================
// HEALTH ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let (server, _guard) = create_test_server();

    let response = server.get("/health").await;

    response.assert_status_ok();
    let health: HealthResponse = response.json();
    assert_eq!(health.status, "ok");
    assert!(!health.version.is_empty());
}

// =============================================================================
// CREATE ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_create_relationship() {
    let (server, _guard) = create_test_server();

    create_default_relationship(&server).await;

    let response = server.get("/relationships/1/status").await;
    response.assert_status_ok();
    let status: StatusResponse = response.json();
    assert!(status.success);
    assert_eq!(status.stage, "getting_to_know");
    assert_eq!(status.progress_percent, 0);
    assert_eq!(status.requirements.len(), 2);
}

#[tokio::test]
async fn test_duplicate_create_rejected() {
    let (server, _guard) = create_test_server();
    create_default_relationship(&server).await;

    let response = server
        .post("/relationships")
        .json(&CreateRequest {
            relationship_id: 1,
            initiator_id: 10,
            recipient_id: 20,
        })
        .await;

    response.assert_status_bad_request();
    let body: CreateResponse = response.json();
    assert!(!body.success);
    assert!(body.error.is_some());
}

#[tokio::test]
async fn test_unknown_relationship_is_404() {
    let (server, _guard) = create_test_server();

    let response = server.get("/relationships/404/status").await;
    response.assert_status_not_found();
}

// =============================================================================
// SIGN-OFF FLOW TESTS
// =============================================================================

#[tokio::test]
async fn test_dual_sign_off_advances_stage() {
    let (server, _guard) = create_test_server();
    create_default_relationship(&server).await;

    // The activity source reports enough active days for the entry stage.
    let response = server
        .post("/relationships/1/activity")
        .json(&json!({ "active_days": 7 }))
        .await;
    response.assert_status_ok();

    // Party A signs "met in person".
    let response = server
        .post("/relationships/1/sign-off")
        .json(&SignOffRequest {
            requirement_id: 2,
            party_id: 10,
        })
        .await;
    response.assert_status_ok();
    let body: SignOffResponse = response.json();
    assert_eq!(body.status.as_deref(), Some("waiting_for_partner"));
    assert_eq!(body.stage.as_deref(), Some("getting_to_know"));

    // Party B signs: the requirement completes and the stage advances.
    let response = server
        .post("/relationships/1/sign-off")
        .json(&SignOffRequest {
            requirement_id: 2,
            party_id: 20,
        })
        .await;
    response.assert_status_ok();
    let body: SignOffResponse = response.json();
    assert_eq!(body.status.as_deref(), Some("completed"));
    assert_eq!(body.stage.as_deref(), Some("trial_period"));
}

#[tokio::test]
async fn test_sign_off_by_stranger_rejected() {
    let (server, _guard) = create_test_server();
    create_default_relationship(&server).await;

    let response = server
        .post("/relationships/1/sign-off")
        .json(&SignOffRequest {
            requirement_id: 2,
            party_id: 99,
        })
        .await;

    response.assert_status_bad_request();
    let body: SignOffResponse = response.json();
    assert!(!body.success);
}

#[tokio::test]
async fn test_sign_off_automatic_requirement_rejected() {
    let (server, _guard) = create_test_server();
    create_default_relationship(&server).await;

    let response = server
        .post("/relationships/1/sign-off")
        .json(&SignOffRequest {
            requirement_id: 1,
            party_id: 10,
        })
        .await;

    response.assert_status_bad_request();
}

// =============================================================================
// WITHDRAWAL FLOW TESTS
// =============================================================================

#[tokio::test]
async fn test_withdrawal_freezes_features() {
    let (server, _guard) = create_test_server();
    create_default_relationship(&server).await;

    let response = server
        .post("/relationships/1/withdraw")
        .json(&WithdrawRequest {
            party_id: 10,
            reason: "need time".to_string(),
        })
        .await;
    response.assert_status_ok();
    let body: WithdrawResponse = response.json();
    assert!(body.success);
    assert!(body.cooling_off_ends_at_ms.is_some());

    // Only the advisor channel survives the freeze.
    let response = server.get("/relationships/1/features").await;
    response.assert_status_ok();
    let features: FeaturesResponse = response.json();
    assert!(features.is_frozen);
    assert_eq!(features.features, vec!["advisor_channel".to_string()]);

    // Status shows the countdown.
    let response = server.get("/relationships/1/status").await;
    let status: StatusResponse = response.json();
    assert!(status.is_frozen);
    assert!(status.cooling_off.is_some());

    // A second withdrawal is rejected: no nested cooling-off periods.
    let response = server
        .post("/relationships/1/withdraw")
        .json(&WithdrawRequest {
            party_id: 20,
            reason: String::new(),
        })
        .await;
    response.assert_status_bad_request();
}

#[tokio::test]
async fn test_end_signal_during_cooling_off() {
    let (server, _guard) = create_test_server();
    create_default_relationship(&server).await;

    server
        .post("/relationships/1/withdraw")
        .json(&WithdrawRequest {
            party_id: 10,
            reason: "leaving".to_string(),
        })
        .await
        .assert_status_ok();

    let response = server.post("/relationships/1/end").await;
    response.assert_status_ok();

    let response = server.get("/relationships/1/status").await;
    let status: StatusResponse = response.json();
    assert!(status.ended);
    assert!(status.features.is_empty());

    // No further mutations on an ended relationship.
    let response = server
        .post("/relationships/1/sign-off")
        .json(&SignOffRequest {
            requirement_id: 2,
            party_id: 10,
        })
        .await;
    response.assert_status_bad_request();
}

#[tokio::test]
async fn test_end_signal_without_cooling_off_rejected() {
    let (server, _guard) = create_test_server();
    create_default_relationship(&server).await;

    let response = server.post("/relationships/1/end").await;
    response.assert_status_bad_request();
}

// =============================================================================
// REFRESH / METRICS TESTS
// =============================================================================

#[tokio::test]
async fn test_refresh_is_idempotent() {
    let (server, _guard) = create_test_server();
    create_default_relationship(&server).await;

    for _ in 0..3 {
        let response = server.post("/relationships/1/refresh").await;
        response.assert_status_ok();
    }

    let response = server.get("/relationships/1/status").await;
    let status: StatusResponse = response.json();
    assert_eq!(status.stage, "getting_to_know");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (server, _guard) = create_test_server();
    create_default_relationship(&server).await;

    let response = server.get("/metrics").await;
    response.assert_status_ok();
    let body = response.text();
    assert!(body.contains("kinship_relationships_total 1"));
}

// =============================================================================
// AUTH TESTS
// =============================================================================

#[tokio::test]
async fn test_auth_rejects_missing_key() {
    let guard = AUTH_TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    // SAFETY: Tests run sequentially under AUTH_TEST_MUTEX, so no concurrent env access.
    unsafe { std::env::set_var("KINSHIP_API_KEY", "secret-key") };
    let _cleanup = TestGuard { _guard: guard };

    let engine = ProgressionEngine::new(
        StoreBackend::InMemory(MemoryStore::new()),
        RecordedMetrics::new(),
    );
    let server = TestServer::new(create_router(AppState::new(engine))).unwrap();

    // Health bypasses auth for load balancer checks.
    server.get("/health").await.assert_status_ok();

    // Everything else requires the key.
    let response = server.get("/relationships/1/status").await;
    response.assert_status_unauthorized();

    let response = server
        .get("/relationships/1/status")
        .authorization_bearer("secret-key")
        .await;
    // Authenticated but unknown relationship: 404, not 401.
    response.assert_status_not_found();
}
