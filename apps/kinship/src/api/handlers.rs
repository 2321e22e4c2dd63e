//! # API Endpoint Handlers
//!
//! This module implements the actual HTTP endpoint handlers.
//!
//! Engine events returned from an operation are logged here; delivering
//! them to users (push notifications etc.) is an external notifier's job
//! that consumes these log-structured records.

use super::{
    AppState,
    types::{
        ActivityRequest, CreateRequest, CreateResponse, EndResponse, FeaturesResponse,
        HealthResponse, RefreshResponse, SignOffRequest, SignOffResponse, StatusResponse,
        WithdrawRequest, WithdrawResponse,
    },
};
use crate::now_ms;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use kinship_core::{
    ActivitySnapshot, EngineEvent, KinshipError, PartyId, RelationshipId, RequirementId,
};

// =============================================================================
// EVENT + ERROR PLUMBING
// =============================================================================

/// Log each emitted engine event as a structured record.
fn log_events(events: &[EngineEvent]) {
    for event in events {
        match serde_json::to_string(event) {
            Ok(payload) => tracing::info!(event = event.name(), payload = %payload, "engine event"),
            Err(e) => tracing::warn!(event = event.name(), "event serialization failed: {e}"),
        }
    }
}

/// Map an engine error to its HTTP status.
fn error_status(error: &KinshipError) -> StatusCode {
    match error {
        KinshipError::Validation(_) => StatusCode::BAD_REQUEST,
        KinshipError::NotFound => StatusCode::NOT_FOUND,
        KinshipError::Conflict => StatusCode::CONFLICT,
        KinshipError::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        KinshipError::InvariantViolation(_)
        | KinshipError::Io(_)
        | KinshipError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Log an engine error at the right level. Invariant violations indicate a
/// correctness bug upstream and must never pass quietly.
fn log_error(error: &KinshipError) {
    match error {
        KinshipError::InvariantViolation(_) => tracing::error!("engine error: {error}"),
        KinshipError::Io(_) | KinshipError::Serialization(_) => {
            tracing::error!("storage error: {error}");
        }
        _ => tracing::debug!("rejected request: {error}"),
    }
}

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// METRICS HANDLER
// =============================================================================

/// Prometheus-style plaintext metrics.
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    let engine = state.engine.read().await;
    let count = engine.relationship_count().unwrap_or(0);

    let body = format!(
        "# HELP kinship_relationships_total Number of stored relationships\n\
         # TYPE kinship_relationships_total gauge\n\
         kinship_relationships_total {count}\n"
    );
    (StatusCode::OK, body)
}

// =============================================================================
// CREATE HANDLER
// =============================================================================

/// Create a relationship for an approved match.
pub async fn create_handler(
    State(state): State<AppState>,
    Json(request): Json<CreateRequest>,
) -> impl IntoResponse {
    let mut engine = state.engine.write().await;
    match engine.create_relationship(
        RelationshipId(request.relationship_id),
        PartyId(request.initiator_id),
        PartyId(request.recipient_id),
        now_ms(),
    ) {
        Ok(()) => (StatusCode::OK, Json(CreateResponse::success())),
        Err(e) => {
            log_error(&e);
            (error_status(&e), Json(CreateResponse::error(e.to_string())))
        }
    }
}

// =============================================================================
// STATUS HANDLER
// =============================================================================

/// Full relationship status: stage, progress, countdown, checklist,
/// unlocked features. A status read is also the lazy evaluation trigger, so
/// it takes the write lock.
pub async fn status_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> impl IntoResponse {
    let mut engine = state.engine.write().await;
    match engine.status(RelationshipId(id), now_ms()) {
        Ok(report) => {
            log_events(&report.events);
            (StatusCode::OK, Json(StatusResponse::from_report(&report)))
        }
        Err(e) => {
            log_error(&e);
            (error_status(&e), Json(StatusResponse::error(id, e.to_string())))
        }
    }
}

// =============================================================================
// FEATURES HANDLER
// =============================================================================

/// The unlocked capability set consumer surfaces gate against.
pub async fn features_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> impl IntoResponse {
    let mut engine = state.engine.write().await;
    match engine.features(RelationshipId(id), now_ms()) {
        Ok(set) => {
            log_events(&set.events);
            (StatusCode::OK, Json(FeaturesResponse::from_set(&set)))
        }
        Err(e) => {
            log_error(&e);
            (error_status(&e), Json(FeaturesResponse::error(e.to_string())))
        }
    }
}

// =============================================================================
// SIGN-OFF HANDLER
// =============================================================================

/// Record one party's sign-off for a manual requirement.
pub async fn sign_off_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<SignOffRequest>,
) -> impl IntoResponse {
    let mut engine = state.engine.write().await;
    match engine.sign_off(
        RelationshipId(id),
        RequirementId(request.requirement_id),
        PartyId(request.party_id),
        now_ms(),
    ) {
        Ok(outcome) => {
            log_events(&outcome.events);
            (
                StatusCode::OK,
                Json(SignOffResponse::success(
                    outcome.status.key(),
                    outcome.stage.key(),
                )),
            )
        }
        Err(e) => {
            log_error(&e);
            (error_status(&e), Json(SignOffResponse::error(e.to_string())))
        }
    }
}

// =============================================================================
// WITHDRAWAL HANDLER
// =============================================================================

/// Open a cooling-off window for a party's withdrawal request.
pub async fn withdraw_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<WithdrawRequest>,
) -> impl IntoResponse {
    let mut engine = state.engine.write().await;
    match engine.request_withdrawal(
        RelationshipId(id),
        PartyId(request.party_id),
        request.reason,
        now_ms(),
    ) {
        Ok(outcome) => {
            log_events(&outcome.events);
            (
                StatusCode::OK,
                Json(WithdrawResponse::success(outcome.ends_at_ms)),
            )
        }
        Err(e) => {
            log_error(&e);
            (error_status(&e), Json(WithdrawResponse::error(e.to_string())))
        }
    }
}

// =============================================================================
// END HANDLER
// =============================================================================

/// Record the external follow-through signal: the relationship ends.
pub async fn end_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> impl IntoResponse {
    let mut engine = state.engine.write().await;
    match engine.record_relationship_ended(RelationshipId(id), now_ms()) {
        Ok(outcome) => {
            log_events(&outcome.events);
            (StatusCode::OK, Json(EndResponse::success()))
        }
        Err(e) => {
            log_error(&e);
            (error_status(&e), Json(EndResponse::error(e.to_string())))
        }
    }
}

// =============================================================================
// ACTIVITY HANDLER
// =============================================================================

/// Accept pushed activity counts from the external collaborator, then
/// re-evaluate so completions apply without waiting for the next read.
pub async fn activity_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<ActivityRequest>,
) -> impl IntoResponse {
    let relationship = RelationshipId(id);
    let mut engine = state.engine.write().await;
    engine.metrics_mut().report(
        relationship,
        ActivitySnapshot {
            active_days: request.active_days,
            activities_completed: request.activities_completed,
            calls_completed: request.calls_completed,
        },
    );

    match engine.refresh(relationship, now_ms()) {
        Ok(outcome) => {
            log_events(&outcome.events);
            (
                StatusCode::OK,
                Json(RefreshResponse::success(outcome.stage.key(), outcome.stale)),
            )
        }
        Err(e) => {
            log_error(&e);
            (error_status(&e), Json(RefreshResponse::error(e.to_string())))
        }
    }
}

// =============================================================================
// REFRESH HANDLER
// =============================================================================

/// Change-notification feed trigger: idempotent re-evaluation.
pub async fn refresh_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> impl IntoResponse {
    let mut engine = state.engine.write().await;
    match engine.refresh(RelationshipId(id), now_ms()) {
        Ok(outcome) => {
            log_events(&outcome.events);
            (
                StatusCode::OK,
                Json(RefreshResponse::success(outcome.stage.key(), outcome.stale)),
            )
        }
        Err(e) => {
            log_error(&e);
            (error_status(&e), Json(RefreshResponse::error(e.to_string())))
        }
    }
}
