//! Unit tests for API types serialization/deserialization.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use kinship::api::{
    ActivityRequest, CreateRequest, HealthResponse, RefreshResponse, SignOffRequest,
    SignOffResponse, WithdrawRequest, WithdrawResponse,
};

// =============================================================================
// HEALTH RESPONSE TESTS
// =============================================================================

#[test]
fn test_health_response_default() {
    let health = HealthResponse::default();
    assert_eq!(health.status, "ok");
    assert!(!health.version.is_empty());
}

#[test]
fn test_health_response_serialization() {
    let health = HealthResponse {
        status: "ok".to_string(),
        version: "0.4.0".to_string(),
    };

    let json = serde_json::to_string(&health).unwrap();
    assert!(json.contains("\"status\":\"ok\""));
    assert!(json.contains("\"version\":\"0.4.0\""));
}

// =============================================================================
// CREATE REQUEST TESTS
// =============================================================================

#[test]
fn test_create_request_deserialization() {
    let json = r#"{"relationship_id":1,"initiator_id":10,"recipient_id":20}"#;
    let request: CreateRequest = serde_json::from_str(json).unwrap();

    assert_eq!(request.relationship_id, 1);
    assert_eq!(request.initiator_id, 10);
    assert_eq!(request.recipient_id, 20);
}

// =============================================================================
// SIGN-OFF TESTS
// =============================================================================

#[test]
fn test_sign_off_request_deserialization() {
    let json = r#"{"requirement_id":2,"party_id":10}"#;
    let request: SignOffRequest = serde_json::from_str(json).unwrap();

    assert_eq!(request.requirement_id, 2);
    assert_eq!(request.party_id, 10);
}

#[test]
fn test_sign_off_response_success() {
    let response = SignOffResponse::success("waiting_for_partner", "getting_to_know");
    assert!(response.success);
    assert_eq!(response.status.as_deref(), Some("waiting_for_partner"));
    assert_eq!(response.stage.as_deref(), Some("getting_to_know"));
    assert!(response.error.is_none());
}

#[test]
fn test_sign_off_response_error() {
    let response = SignOffResponse::error("requirement is not completed by sign-off");
    assert!(!response.success);
    assert!(response.status.is_none());
    assert!(response.error.unwrap().contains("sign-off"));
}

// =============================================================================
// WITHDRAWAL TESTS
// =============================================================================

#[test]
fn test_withdraw_request_reason_defaults_empty() {
    let json = r#"{"party_id":10}"#;
    let request: WithdrawRequest = serde_json::from_str(json).unwrap();

    assert_eq!(request.party_id, 10);
    assert!(request.reason.is_empty());
}

#[test]
fn test_withdraw_response_serialization() {
    let response = WithdrawResponse::success(86_400_000);
    let json = serde_json::to_string(&response).unwrap();
    assert!(json.contains("\"success\":true"));
    assert!(json.contains("\"cooling_off_ends_at_ms\":86400000"));
}

// =============================================================================
// ACTIVITY / REFRESH TESTS
// =============================================================================

#[test]
fn test_activity_request_fields_default_to_zero() {
    let json = r#"{"active_days":7}"#;
    let request: ActivityRequest = serde_json::from_str(json).unwrap();

    assert_eq!(request.active_days, 7);
    assert_eq!(request.activities_completed, 0);
    assert_eq!(request.calls_completed, 0);
}

#[test]
fn test_refresh_response_round_trip() {
    let response = RefreshResponse::success("trial_period", true);
    let json = serde_json::to_string(&response).unwrap();
    let back: RefreshResponse = serde_json::from_str(&json).unwrap();

    assert!(back.success);
    assert_eq!(back.stage.as_deref(), Some("trial_period"));
    assert!(back.stale);
}
