//! # Dossier - Entity Registry
//!
//! Entry point for the Dossier binary.
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server
//! dossier server --host 0.0.0.0 --port 8080
//!
//! # CLI operations
//! dossier list --status watch --search fund
//! dossier show acme-capital
//! dossier link jane-barnett acme --type board_member_of
//! ```

use clap::Parser;
use dossier::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // DOSSIER_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("DOSSIER_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "dossier=info,dossier_core=info,tower_http=debug".into());

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
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the startup banner.
fn print_banner() {
    println!(
        r#"
  ██████╗  ██████╗ ███████╗███████╗██╗███████╗██████╗
  ██╔══██╗██╔═══██╗██╔════╝██╔════╝██║██╔════╝██╔══██╗
  ██║  ██║██║   ██║███████╗███████╗██║█████╗  ██████╔╝
  ██║  ██║██║   ██║╚════██║╚════██║██║██╔══╝  ██╔══██╗
  ██████╔╝╚██████╔╝███████║███████║██║███████╗██║  ██║
  ╚═════╝  ╚═════╝ ╚══════╝╚══════╝╚═╝╚══════╝╚═╝  ╚═╝

  Entity Registry v{}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
