//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands. Each
//! command opens the engine against the configured database, performs one
//! operation, and prints text or JSON output.

use crate::api::{self, AppEngine};
use crate::{config, now_ms};
use kinship_core::{
    ActivitySnapshot, EngineEvent, KinshipError, PartyId, ProgressionEngine, RecordedMetrics,
    RedbStore, RelationshipId, RequirementId, StoreBackend,
};
use std::path::Path;

// =============================================================================
// ENGINE LOADING
// =============================================================================

/// Open the progression engine over the selected backend.
fn load_engine(db_path: &Path, backend: &str) -> Result<AppEngine, KinshipError> {
    let store = match backend {
        "redb" => StoreBackend::Persistent(RedbStore::open(db_path)?),
        "memory" => StoreBackend::default(),
        other => {
            return Err(KinshipError::validation(format!(
                "unknown backend '{other}' (expected 'redb' or 'memory')"
            )));
        }
    };
    Ok(ProgressionEngine::new(store, RecordedMetrics::new()))
}

/// Print engine events as they surface from a CLI operation.
fn print_events(events: &[EngineEvent], json_mode: bool) {
    for event in events {
        if json_mode {
            if let Ok(payload) = serde_json::to_string(event) {
                println!("{payload}");
            }
        } else {
            println!("  event: {}", event.name());
        }
    }
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(
    db_path: &Path,
    backend: &str,
    config_path: Option<&Path>,
    host_flag: Option<&str>,
    port_flag: Option<u16>,
) -> Result<(), KinshipError> {
    let config = config::load_optional(config_path)?;

    // Flags beat config file beats defaults.
    let host = host_flag
        .map(str::to_string)
        .or(config.server.host)
        .unwrap_or_else(|| "127.0.0.1".to_string());
    let port = port_flag.or(config.server.port).unwrap_or(8080);
    let db_path = config.server.database.as_deref().unwrap_or(db_path);
    let backend = config.server.backend.as_deref().unwrap_or(backend);

    let engine = load_engine(db_path, backend)?;

    println!("Kinship Companionship Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:     {}", host);
    println!("  Port:     {}", port);
    println!("  Backend:  {}", backend);
    println!("  Database: {:?}", db_path);
    println!();
    println!("Endpoints:");
    println!("  POST /relationships                  - Create a relationship");
    println!("  GET  /relationships/{{id}}/status     - Stage, progress, checklist");
    println!("  GET  /relationships/{{id}}/features   - Unlocked capabilities");
    println!("  POST /relationships/{{id}}/sign-off   - Record a sign-off");
    println!("  POST /relationships/{{id}}/withdraw   - Request withdrawal");
    println!("  POST /relationships/{{id}}/end        - End-of-relationship signal");
    println!("  POST /relationships/{{id}}/activity   - Report activity counts");
    println!("  POST /relationships/{{id}}/refresh    - Re-evaluate requirements");
    println!("  GET  /health                         - Health check");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let addr = format!("{}:{}", host, port);
    api::run_server(&addr, engine).await
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Initialize a new empty database.
pub fn cmd_init(db_path: &Path, backend: &str, force: bool) -> Result<(), KinshipError> {
    if backend != "redb" {
        return Err(KinshipError::validation(
            "init only applies to the redb backend",
        ));
    }
    if db_path.exists() && !force {
        return Err(KinshipError::validation(format!(
            "database {:?} already exists (use --force to reinitialize)",
            db_path
        )));
    }
    if db_path.exists() {
        std::fs::remove_file(db_path)
            .map_err(|e| KinshipError::Io(format!("Cannot remove database: {}", e)))?;
    }

    let _ = RedbStore::open(db_path)?;
    println!("Initialized empty database at {:?}", db_path);
    Ok(())
}

// =============================================================================
// CREATE COMMAND
// =============================================================================

/// Create a relationship for an approved match.
pub fn cmd_create(
    db_path: &Path,
    backend: &str,
    json_mode: bool,
    relationship: u64,
    initiator: u64,
    recipient: u64,
) -> Result<(), KinshipError> {
    let mut engine = load_engine(db_path, backend)?;
    engine.create_relationship(
        RelationshipId(relationship),
        PartyId(initiator),
        PartyId(recipient),
        now_ms(),
    )?;

    if json_mode {
        println!(
            "{}",
            serde_json::json!({
                "relationship_id": relationship,
                "initiator_id": initiator,
                "recipient_id": recipient,
                "stage": "getting_to_know",
            })
        );
    } else {
        println!(
            "Created relationship {} ({} ↔ {}) at stage Getting to Know",
            relationship, initiator, recipient
        );
    }
    Ok(())
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show one relationship's status, or a store overview.
pub fn cmd_status(
    db_path: &Path,
    backend: &str,
    json_mode: bool,
    relationship: Option<u64>,
) -> Result<(), KinshipError> {
    let mut engine = load_engine(db_path, backend)?;

    let Some(id) = relationship else {
        let count = engine.relationship_count()?;
        let ids = engine.relationship_ids()?;
        if json_mode {
            println!(
                "{}",
                serde_json::json!({
                    "database": db_path.to_string_lossy(),
                    "relationship_count": count,
                    "relationship_ids": ids.iter().map(|id| id.0).collect::<Vec<_>>(),
                })
            );
        } else {
            println!("Database:      {:?}", db_path);
            println!("Relationships: {}", count);
        }
        return Ok(());
    };

    let report = engine.status(RelationshipId(id), now_ms())?;
    if json_mode {
        let response = crate::api::StatusResponse::from_report(&report);
        println!(
            "{}",
            serde_json::to_string_pretty(&response)
                .map_err(|e| KinshipError::Serialization(e.to_string()))?
        );
    } else {
        println!("Relationship {}", id);
        println!("  Stage:    {}", report.stage.name());
        println!(
            "  Progress: {}% ({}/{} requirements)",
            report.progress.percent,
            report.progress.completed_requirements,
            report.progress.total_requirements
        );
        if report.stale {
            println!("  Note:     progress may be slightly out of date");
        }
        if let Some(countdown) = &report.cooling_off {
            println!(
                "  Cooling-off: {}s remaining (requested by {})",
                countdown.remaining_ms / 1000,
                countdown.requested_by.0
            );
        }
        if report.ended {
            println!("  Ended:    yes");
        }
        println!("  Checklist:");
        for row in &report.checklist {
            let mark = if row.completed { "x" } else { " " };
            println!(
                "    [{}] {} ({}/{})",
                mark, row.label, row.current_value, row.required_value
            );
        }
    }
    print_events(&report.events, json_mode);
    Ok(())
}

// =============================================================================
// FEATURES COMMAND
// =============================================================================

/// Show the unlocked capability set.
pub fn cmd_features(
    db_path: &Path,
    backend: &str,
    json_mode: bool,
    relationship: u64,
) -> Result<(), KinshipError> {
    let mut engine = load_engine(db_path, backend)?;
    let set = engine.features(RelationshipId(relationship), now_ms())?;

    if json_mode {
        println!(
            "{}",
            serde_json::json!({
                "relationship_id": relationship,
                "stage": set.stage.key(),
                "is_frozen": set.is_frozen,
                "features": set.features.iter().map(|key| key.key()).collect::<Vec<_>>(),
            })
        );
    } else {
        println!(
            "Stage {} ({}):",
            set.stage.name(),
            if set.is_frozen { "frozen" } else { "active" }
        );
        for key in &set.features {
            println!("  - {}", key.key());
        }
    }
    print_events(&set.events, json_mode);
    Ok(())
}

// =============================================================================
// SIGN-OFF COMMAND
// =============================================================================

/// Record a party's sign-off for a manual requirement.
pub fn cmd_sign_off(
    db_path: &Path,
    backend: &str,
    json_mode: bool,
    relationship: u64,
    requirement: u32,
    party: u64,
) -> Result<(), KinshipError> {
    let mut engine = load_engine(db_path, backend)?;
    let outcome = engine.sign_off(
        RelationshipId(relationship),
        RequirementId(requirement),
        PartyId(party),
        now_ms(),
    )?;

    if json_mode {
        println!(
            "{}",
            serde_json::json!({
                "status": outcome.status.key(),
                "stage": outcome.stage.key(),
            })
        );
    } else {
        println!("Sign-off: {}", outcome.status.key());
        println!("Stage:    {}", outcome.stage.name());
    }
    print_events(&outcome.events, json_mode);
    Ok(())
}

// =============================================================================
// WITHDRAW COMMAND
// =============================================================================

/// Request withdrawal, opening the cooling-off window.
pub fn cmd_withdraw(
    db_path: &Path,
    backend: &str,
    json_mode: bool,
    relationship: u64,
    party: u64,
    reason: &str,
) -> Result<(), KinshipError> {
    let mut engine = load_engine(db_path, backend)?;
    let outcome = engine.request_withdrawal(
        RelationshipId(relationship),
        PartyId(party),
        reason,
        now_ms(),
    )?;

    if json_mode {
        println!(
            "{}",
            serde_json::json!({
                "cooling_off_ends_at_ms": outcome.ends_at_ms,
            })
        );
    } else {
        println!("Cooling-off window opened; progress is frozen for 24 hours.");
    }
    print_events(&outcome.events, json_mode);
    Ok(())
}

// =============================================================================
// END COMMAND
// =============================================================================

/// Record the external end-of-relationship signal.
pub fn cmd_end(
    db_path: &Path,
    backend: &str,
    json_mode: bool,
    relationship: u64,
) -> Result<(), KinshipError> {
    let mut engine = load_engine(db_path, backend)?;
    let outcome = engine.record_relationship_ended(RelationshipId(relationship), now_ms())?;

    if !json_mode {
        println!("Relationship {} has ended.", relationship);
    }
    print_events(&outcome.events, json_mode);
    Ok(())
}

// =============================================================================
// ACTIVITY COMMAND
// =============================================================================

/// Report activity counts, then re-evaluate.
pub fn cmd_activity(
    db_path: &Path,
    backend: &str,
    json_mode: bool,
    relationship: u64,
    active_days: u64,
    activities: u64,
    calls: u64,
) -> Result<(), KinshipError> {
    let mut engine = load_engine(db_path, backend)?;
    let id = RelationshipId(relationship);
    engine.metrics_mut().report(
        id,
        ActivitySnapshot {
            active_days,
            activities_completed: activities,
            calls_completed: calls,
        },
    );
    let outcome = engine.refresh(id, now_ms())?;

    if json_mode {
        println!(
            "{}",
            serde_json::json!({
                "stage": outcome.stage.key(),
                "stale": outcome.stale,
            })
        );
    } else {
        println!("Recorded activity; stage is {}.", outcome.stage.name());
    }
    print_events(&outcome.events, json_mode);
    Ok(())
}

// =============================================================================
// REFRESH COMMAND
// =============================================================================

/// Re-run requirement evaluation.
pub fn cmd_refresh(
    db_path: &Path,
    backend: &str,
    json_mode: bool,
    relationship: u64,
) -> Result<(), KinshipError> {
    let mut engine = load_engine(db_path, backend)?;
    let outcome = engine.refresh(RelationshipId(relationship), now_ms())?;

    if json_mode {
        println!(
            "{}",
            serde_json::json!({
                "stage": outcome.stage.key(),
                "stale": outcome.stale,
            })
        );
    } else {
        println!("Re-evaluated; stage is {}.", outcome.stage.name());
        if outcome.stale {
            println!("Note: progress may be slightly out of date.");
        }
    }
    print_events(&outcome.events, json_mode);
    Ok(())
}
