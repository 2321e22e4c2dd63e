//! # Kinship - Companionship Progression Server
//!
//! The main binary for the Kinship stage progression engine.
//!
//! This application provides:
//! - HTTP REST API server (axum-based)
//! - CLI interface for engine operations
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      apps/kinship (THE BINARY)                  │
//! │                                                                 │
//! │        ┌─────────────┐              ┌─────────────┐             │
//! │        │   CLI       │              │   HTTP API  │             │
//! │        │  (clap)     │              │   (axum)    │             │
//! │        └──────┬──────┘              └──────┬──────┘             │
//! │               │                            │                    │
//! │               └─────────────┬──────────────┘                    │
//! │                             ▼                                   │
//! │                     ┌───────────────┐                           │
//! │                     │ kinship-core  │                           │
//! │                     │ (THE LOGIC)   │                           │
//! │                     └───────────────┘                           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server
//! kinship server --host 0.0.0.0 --port 8080
//!
//! # CLI operations
//! kinship create -r 1 -i 10 -R 20
//! kinship status -r 1
//! kinship sign-off -r 1 -Q 2 -p 10
//! ```

use clap::Parser;
use kinship::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // Initialize tracing — KINSHIP_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("KINSHIP_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "kinship=info,tower_http=debug".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    // Parse CLI arguments
    let cli = cli::Cli::parse();

    // Display startup banner
    if !cli.quiet {
        print_banner();
    }

    // Execute command
    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the Kinship startup banner.
fn print_banner() {
    println!(
        r#"
  ██╗  ██╗██╗███╗   ██╗███████╗██╗  ██╗██╗██████╗
  ██║ ██╔╝██║████╗  ██║██╔════╝██║  ██║██║██╔══██╗
  █████╔╝ ██║██╔██╗ ██║███████╗███████║██║██████╔╝
  ██╔═██╗ ██║██║╚██╗██║╚════██║██╔══██║██║██╔═══╝
  ██║  ██╗██║██║ ╚████║███████║██║  ██║██║██║
  ╚═╝  ╚═╝╚═╝╚═╝  ╚═══╝╚══════╝╚═╝  ╚═╝╚═╝╚═╝

  Companionship Progression Server v{}

  Deterministic • Supervised • Stage-Gated
"#,
        env!("CARGO_PKG_VERSION")
    );
}
