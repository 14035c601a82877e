//! API gateway process.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────────────┐
//!                    │                     API GATEWAY                      │
//!                    │                                                      │
//!  Client Request    │  ┌─────────┐   ┌───────────┐   ┌─────────────────┐   │
//!  ──────────────────┼─▶│  http   │──▶│  routing  │──▶│     mapping     │   │
//!                    │  │ server  │   │RouteIndex │   │ParameterResolver│   │
//!                    │  └─────────┘   └───────────┘   └────────┬────────┘   │
//!                    │                                         │            │
//!                    │                                         ▼            │
//!                    │                 ┌─────────┐    ┌─────────────────┐   │
//!  Client Response   │                 │ filter  │◀──▶│   integration   │───┼──▶ Backend
//!  ◀─────────────────┼─────────────────│  chain  │    │ http/mock/retry │   │
//!                    │                 └─────────┘    └─────────────────┘   │
//!                    │                                                      │
//!                    │  ┌────────────────────────────────────────────────┐  │
//!                    │  │ config + watcher │ lifecycle │ observability   │  │
//!                    │  └────────────────────────────────────────────────┘  │
//!                    └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use api_gateway::config::loader::load_settings;
use api_gateway::config::settings::GatewaySettings;
use api_gateway::lifecycle::startup;
use api_gateway::observability::logging;

#[derive(Parser)]
#[command(name = "api-gateway")]
#[command(about = "HTTP API gateway with route resolution and parameter mapping", long_about = None)]
struct Args {
    /// Process settings (TOML). Defaults apply when omitted.
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// API config; overrides `api.config_path` from the settings.
    #[arg(short, long)]
    api_config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut settings = match &args.settings {
        Some(path) => load_settings(path)?,
        None => GatewaySettings::default(),
    };
    if let Some(path) = args.api_config {
        settings.api.config_path = path;
    }

    logging::init(&settings.observability);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %settings.listener.bind_address,
        api_config = %settings.api.config_path.display(),
        default_timeout = ?settings.timeouts.default_request,
        "api-gateway starting"
    );

    startup::run(settings).await?;
    Ok(())
}
