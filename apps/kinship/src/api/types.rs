//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API.

use kinship_core::{FeatureSet, StatusReport};
use serde::{Deserialize, Serialize};

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// CREATE REQUEST/RESPONSE
// =============================================================================

/// Relationship creation request (an approved match).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRequest {
    pub relationship_id: u64,
    /// The younger party.
    pub initiator_id: u64,
    /// The older party.
    pub recipient_id: u64,
}

/// Relationship creation response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateResponse {
    pub success: bool,
    pub error: Option<String>,
}

impl CreateResponse {
    pub fn success() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// STATUS RESPONSE
// =============================================================================

/// One checklist row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequirementJson {
    pub id: u32,
    pub label: String,
    pub mode: String,
    pub current_value: u64,
    pub required_value: u64,
    pub initiator_signed: bool,
    pub recipient_signed: bool,
    pub completed: bool,
}

/// Countdown view of an active cooling-off window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoolingOffJson {
    pub started_at_ms: u64,
    pub ends_at_ms: u64,
    pub remaining_ms: u64,
    pub requested_by: u64,
    pub reason: String,
}

/// Full relationship status response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub success: bool,
    pub relationship_id: u64,
    pub stage: String,
    pub stage_name: String,
    pub progress_percent: u8,
    pub completed_requirements: usize,
    pub total_requirements: usize,
    pub is_frozen: bool,
    pub ended: bool,
    /// True when automatic values are last-known rather than live; the UI
    /// shows "progress may be slightly out of date".
    pub stale: bool,
    pub cooling_off: Option<CoolingOffJson>,
    pub requirements: Vec<RequirementJson>,
    pub features: Vec<String>,
    pub error: Option<String>,
}

impl StatusResponse {
    pub fn from_report(report: &StatusReport) -> Self {
        Self {
            success: true,
            relationship_id: report.id.0,
            stage: report.stage.key().to_string(),
            stage_name: report.stage.name().to_string(),
            progress_percent: report.progress.percent,
            completed_requirements: report.progress.completed_requirements,
            total_requirements: report.progress.total_requirements,
            is_frozen: report.is_frozen,
            ended: report.ended,
            stale: report.stale,
            cooling_off: report.cooling_off.as_ref().map(|status| CoolingOffJson {
                started_at_ms: status.started_at_ms,
                ends_at_ms: status.ends_at_ms,
                remaining_ms: status.remaining_ms,
                requested_by: status.requested_by.0,
                reason: status.reason.clone(),
            }),
            requirements: report
                .checklist
                .iter()
                .map(|row| RequirementJson {
                    id: row.id.0,
                    label: row.label.to_string(),
                    mode: row.mode.to_string(),
                    current_value: row.current_value,
                    required_value: row.required_value,
                    initiator_signed: row.initiator_signed,
                    recipient_signed: row.recipient_signed,
                    completed: row.completed,
                })
                .collect(),
            features: report.features.iter().map(|key| key.key().to_string()).collect(),
            error: None,
        }
    }

    pub fn error(relationship_id: u64, msg: impl Into<String>) -> Self {
        Self {
            success: false,
            relationship_id,
            stage: String::new(),
            stage_name: String::new(),
            progress_percent: 0,
            completed_requirements: 0,
            total_requirements: 0,
            is_frozen: false,
            ended: false,
            stale: false,
            cooling_off: None,
            requirements: vec![],
            features: vec![],
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// SIGN-OFF REQUEST/RESPONSE
// =============================================================================

/// Manual requirement sign-off request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignOffRequest {
    pub requirement_id: u32,
    pub party_id: u64,
}

/// Sign-off response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignOffResponse {
    pub success: bool,
    /// `waiting_for_partner`, `completed`, or `already_completed`.
    pub status: Option<String>,
    /// Stage after the call (the sign-off may have advanced the stage).
    pub stage: Option<String>,
    pub error: Option<String>,
}

impl SignOffResponse {
    pub fn success(status: &str, stage: &str) -> Self {
        Self {
            success: true,
            status: Some(status.to_string()),
            stage: Some(stage.to_string()),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            status: None,
            stage: None,
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// WITHDRAWAL REQUEST/RESPONSE
// =============================================================================

/// Withdrawal request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawRequest {
    pub party_id: u64,
    #[serde(default)]
    pub reason: String,
}

/// Withdrawal response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawResponse {
    pub success: bool,
    /// When the cooling-off window lapses.
    pub cooling_off_ends_at_ms: Option<u64>,
    pub error: Option<String>,
}

impl WithdrawResponse {
    pub fn success(ends_at_ms: u64) -> Self {
        Self {
            success: true,
            cooling_off_ends_at_ms: Some(ends_at_ms),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            cooling_off_ends_at_ms: None,
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// END RESPONSE
// =============================================================================

/// End-signal response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndResponse {
    pub success: bool,
    pub error: Option<String>,
}

impl EndResponse {
    pub fn success() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// ACTIVITY / REFRESH
// =============================================================================

/// Pushed activity counts from the external activity collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ActivityRequest {
    #[serde(default)]
    pub active_days: u64,
    #[serde(default)]
    pub activities_completed: u64,
    #[serde(default)]
    pub calls_completed: u64,
}

/// Refresh / activity-report / end-signal response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub success: bool,
    pub stage: Option<String>,
    pub stale: bool,
    pub error: Option<String>,
}

impl RefreshResponse {
    pub fn success(stage: &str, stale: bool) -> Self {
        Self {
            success: true,
            stage: Some(stage.to_string()),
            stale,
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            stage: None,
            stale: false,
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// FEATURES RESPONSE
// =============================================================================

/// Unlocked capability set response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturesResponse {
    pub success: bool,
    pub stage: Option<String>,
    pub is_frozen: bool,
    pub features: Vec<String>,
    pub error: Option<String>,
}

impl FeaturesResponse {
    pub fn from_set(set: &FeatureSet) -> Self {
        Self {
            success: true,
            stage: Some(set.stage.key().to_string()),
            is_frozen: set.is_frozen,
            features: set.features.iter().map(|key| key.key().to_string()).collect(),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            stage: None,
            is_frozen: false,
            features: vec![],
            error: Some(msg.into()),
        }
    }
}
