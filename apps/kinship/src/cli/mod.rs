//! # Kinship CLI Module
//!
//! This module implements the CLI interface for Kinship.
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `init` - Initialize a new database
//! - `create` - Create a relationship for an approved match
//! - `status` - Show a relationship's status (or a store overview)
//! - `features` - Show the unlocked capability set
//! - `sign-off` - Record a party's sign-off for a manual requirement
//! - `withdraw` - Request withdrawal (opens a cooling-off window)
//! - `end` - Record the external end-of-relationship signal
//! - `activity` - Report activity counts for a relationship
//! - `refresh` - Re-run requirement evaluation

mod commands;

use clap::{Parser, Subcommand};
use kinship_core::KinshipError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Kinship - Companionship Progression Server
///
/// The deterministic stage progression engine for supervised companionship:
/// dual attestations, cooling-off windows, stage-gated capabilities.
#[derive(Parser, Debug)]
#[command(name = "kinship")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the relationship database
    #[arg(short = 'D', long, global = true, default_value = "kinship.db")]
    pub database: PathBuf,

    /// Storage backend: "redb" (ACID database) or "memory" (volatile)
    #[arg(short = 'B', long, global = true, default_value = "redb")]
    pub backend: String,

    /// Path to a TOML configuration file
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to (overrides config file; default 127.0.0.1)
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to (overrides config file; default 8080)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Initialize a new empty database
    Init {
        /// Force initialization even if database exists
        #[arg(short, long)]
        force: bool,
    },

    /// Create a relationship for an approved match
    Create {
        /// Relationship ID
        #[arg(short, long)]
        relationship: u64,

        /// The younger party's ID
        #[arg(short, long)]
        initiator: u64,

        /// The older party's ID
        #[arg(short = 'R', long)]
        recipient: u64,
    },

    /// Show relationship status (or a store overview without --relationship)
    Status {
        /// Relationship ID
        #[arg(short, long)]
        relationship: Option<u64>,
    },

    /// Show the unlocked capability set
    Features {
        /// Relationship ID
        #[arg(short, long)]
        relationship: u64,
    },

    /// Record a party's sign-off for a manual requirement
    SignOff {
        /// Relationship ID
        #[arg(short, long)]
        relationship: u64,

        /// Requirement ID (see `status` for the current checklist)
        #[arg(short = 'Q', long)]
        requirement: u32,

        /// Signing party's ID
        #[arg(short, long)]
        party: u64,
    },

    /// Request withdrawal (opens a 24-hour cooling-off window)
    Withdraw {
        /// Relationship ID
        #[arg(short, long)]
        relationship: u64,

        /// Withdrawing party's ID
        #[arg(short, long)]
        party: u64,

        /// Reason for the withdrawal
        #[arg(short = 'm', long, default_value = "")]
        reason: String,
    },

    /// Record the external signal that the relationship has ended
    End {
        /// Relationship ID
        #[arg(short, long)]
        relationship: u64,
    },

    /// Report activity counts for a relationship
    Activity {
        /// Relationship ID
        #[arg(short, long)]
        relationship: u64,

        /// Days with qualifying activity
        #[arg(long, default_value = "0")]
        active_days: u64,

        /// Completed shared activities
        #[arg(long, default_value = "0")]
        activities: u64,

        /// Completed calls
        #[arg(long, default_value = "0")]
        calls: u64,
    },

    /// Re-run requirement evaluation (change-feed trigger)
    Refresh {
        /// Relationship ID
        #[arg(short, long)]
        relationship: u64,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), KinshipError> {
    let backend = cli.backend.as_str();
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Server { host, port }) => {
            cmd_server(
                &cli.database,
                backend,
                cli.config.as_deref(),
                host.as_deref(),
                port,
            )
            .await
        }
        Some(Commands::Init { force }) => cmd_init(&cli.database, backend, force),
        Some(Commands::Create {
            relationship,
            initiator,
            recipient,
        }) => cmd_create(&cli.database, backend, json_mode, relationship, initiator, recipient),
        Some(Commands::Status { relationship }) => {
            cmd_status(&cli.database, backend, json_mode, relationship)
        }
        Some(Commands::Features { relationship }) => {
            cmd_features(&cli.database, backend, json_mode, relationship)
        }
        Some(Commands::SignOff {
            relationship,
            requirement,
            party,
        }) => cmd_sign_off(&cli.database, backend, json_mode, relationship, requirement, party),
        Some(Commands::Withdraw {
            relationship,
            party,
            reason,
        }) => cmd_withdraw(&cli.database, backend, json_mode, relationship, party, &reason),
        Some(Commands::End { relationship }) => {
            cmd_end(&cli.database, backend, json_mode, relationship)
        }
        Some(Commands::Activity {
            relationship,
            active_days,
            activities,
            calls,
        }) => cmd_activity(
            &cli.database,
            backend,
            json_mode,
            relationship,
            active_days,
            activities,
            calls,
        ),
        Some(Commands::Refresh { relationship }) => {
            cmd_refresh(&cli.database, backend, json_mode, relationship)
        }
        None => {
            // No subcommand - show store overview by default
            cmd_status(&cli.database, backend, json_mode, None)
        }
    }
}
