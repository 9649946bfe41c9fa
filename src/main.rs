//! Azure UpdateSnap - look up, cache and serve Azure update announcements
//!
//! `show` prints updates, `sweep` clears expired cache entries and `serve`
//! runs the HTTP server.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use futures::future::join_all;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use updatesnap::cli::{Cli, Command, StartupConfig};
use updatesnap::data::ReleaseClient;
use updatesnap::server::run_http_server;
use updatesnap::service::{LookupError, UpdateService};
use updatesnap::view::render_text;

/// Logs go to stderr so `show --json` output stays machine-readable
fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Looks up every id concurrently and prints the results in order
///
/// Exit code 2 if any id was malformed, 1 if any lookup failed or found
/// nothing, 0 otherwise.
async fn show(service: &UpdateService, ids: &[String], json: bool) -> ExitCode {
    let results = join_all(ids.iter().map(|id| service.get_or_fetch(id))).await;

    let mut code = 0u8;
    for (id, result) in ids.iter().zip(results) {
        match result {
            Ok(Some(record)) if json => match serde_json::to_string_pretty(&record) {
                Ok(text) => println!("{}", text),
                Err(e) => {
                    eprintln!("Error: failed to encode update {}: {}", id, e);
                    code = code.max(1);
                }
            },
            Ok(Some(record)) => println!("{}\n", render_text(&record)),
            Ok(None) => {
                eprintln!("Update {} not found", id);
                code = code.max(1);
            }
            Err(e @ LookupError::InvalidId(_)) => {
                eprintln!("Error: {}", e);
                code = code.max(2);
            }
            Err(e @ LookupError::Upstream(_)) => {
                eprintln!("Error: {}", e);
                code = code.max(1);
            }
        }
    }
    ExitCode::from(code)
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging();

    let startup = StartupConfig::from_cli(&cli)?;
    let store = startup.open_store().await?;
    let fetcher = Arc::new(ReleaseClient::from_config(&startup.config));
    let service = UpdateService::from_config(&startup.config, fetcher, store);

    match cli.command {
        Command::Show { ids, json } => Ok(show(&service, &ids, json).await),
        Command::Sweep => {
            let removed = service.sweep_expired().await?;
            println!("Removed {} expired updates", removed);
            Ok(ExitCode::SUCCESS)
        }
        Command::Serve { listen } => {
            run_http_server(Arc::new(service), listen).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
