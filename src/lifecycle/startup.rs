//! Startup orchestration.
//!
//! # Responsibilities
//! - Load the API config and build the first generation
//! - Wire dispatchers and defaults from the process settings
//! - Start background tasks (config watcher, signal handler, metrics)
//! - Bind the listener and begin accepting traffic
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Reload failures after startup are logged, never fatal
//! - Listeners start last (traffic only when ready)

use std::path::Path;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::loader::{load_api_config, ConfigError};
use crate::config::schema::{APIConfig, RequestType};
use crate::config::settings::GatewaySettings;
use crate::config::watcher::ConfigWatcher;
use crate::error::GatewayError;
use crate::gateway::{Components, Gateway};
use crate::http::HttpServer;
use crate::integration::HttpDispatcher;
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals::spawn_signal_handler;
use crate::observability::metrics;
use crate::routing::CompileOptions;

/// Fatal startup failures.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("failed to watch API config: {0}")]
    Watch(#[from] notify::Error),

    #[error("listener error: {0}")]
    Io(#[from] std::io::Error),
}

/// Components for a gateway process: built-in filters and options, the
/// HTTP dispatcher, and defaults taken from `settings`.
pub fn default_components(settings: &GatewaySettings) -> Components {
    let mut components = Components {
        compile: CompileOptions {
            allow_duplicate_paths: settings.routing.allow_duplicate_paths,
        },
        default_timeout: settings.timeouts.default_request,
        ..Components::default()
    };
    components
        .dispatchers
        .register(RequestType::Http, HttpDispatcher::from_config(&settings.retries));
    components
}

/// Build a gateway serving `config`.
pub fn build_gateway(settings: &GatewaySettings, config: APIConfig) -> Result<Arc<Gateway>, GatewayError> {
    Gateway::new(config, default_components(settings)).map(Arc::new)
}

/// Re-read the API config from disk and activate it.
pub fn reload_from_file(gateway: &Gateway, path: &Path) -> Result<u64, StartupError> {
    let config = load_api_config(path)?;
    Ok(gateway.reload(config)?)
}

/// Apply every config the watcher sends until shutdown.
pub fn spawn_reload_loop(
    gateway: Arc<Gateway>,
    mut updates: mpsc::UnboundedReceiver<APIConfig>,
    shutdown: Shutdown,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                update = updates.recv() => {
                    let Some(config) = update else { return };
                    if let Err(e) = gateway.reload(config) {
                        tracing::error!(error = %e, "API config update rejected");
                    }
                }
                _ = shutdown.wait() => return,
            }
        }
    })
}

/// Run a gateway process until a shutdown signal arrives.
pub async fn run(settings: GatewaySettings) -> Result<(), StartupError> {
    let api_path = settings.api.config_path.clone();
    let config = load_api_config(&api_path)?;
    tracing::info!(
        path = %api_path.display(),
        name = %config.name,
        resources = config.resources.len(),
        "API config loaded"
    );

    let gateway = build_gateway(&settings, config)?;
    let shutdown = Shutdown::new();

    if settings.observability.metrics_enabled {
        match settings.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %settings.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // Kept alive for the lifetime of the process.
    let _watcher = if settings.api.watch {
        let (watcher, updates) = ConfigWatcher::new(&api_path);
        let watcher = watcher.run()?;
        spawn_reload_loop(Arc::clone(&gateway), updates, shutdown.clone());
        Some(watcher)
    } else {
        None
    };

    let (reload_tx, mut reload_rx) = mpsc::unbounded_channel();
    spawn_signal_handler(shutdown.clone(), reload_tx);
    {
        let gateway = Arc::clone(&gateway);
        let path = api_path.clone();
        tokio::spawn(async move {
            while reload_rx.recv().await.is_some() {
                match reload_from_file(&gateway, &path) {
                    Ok(id) => tracing::info!(generation = id, "API config reloaded on signal"),
                    Err(e) => tracing::error!(error = %e, "Signal reload failed; keeping current generation"),
                }
            }
        });
    }

    let listener = TcpListener::bind(&settings.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    HttpServer::new(gateway, &settings.listener)
        .run(listener, shutdown)
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::config::loader::{parse_api_config, ConfigFormat};

    const API: &str = r#"
name: startup
resources:
  - path: /ping
    type: restful
    methods:
      - httpVerb: GET
        onAir: true
        mock: true
"#;

    #[test]
    fn test_default_components_follow_settings() {
        let mut settings = GatewaySettings::default();
        settings.timeouts.default_request = Duration::from_secs(5);
        settings.routing.allow_duplicate_paths = true;

        let components = default_components(&settings);
        assert_eq!(components.default_timeout, Duration::from_secs(5));
        assert!(components.compile.allow_duplicate_paths);
        assert!(components.dispatchers.get(&RequestType::Http).is_some());
        assert!(components.dispatchers.get(&RequestType::Dubbo).is_none());
    }

    #[tokio::test]
    async fn test_reload_loop_applies_updates() {
        let config = parse_api_config(API, ConfigFormat::Yaml).unwrap();
        let gateway = build_gateway(&GatewaySettings::default(), config.clone()).unwrap();
        let shutdown = Shutdown::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = spawn_reload_loop(Arc::clone(&gateway), rx, shutdown.clone());

        let mut next = config;
        next.name = "second".into();
        tx.send(next).unwrap();
        for _ in 0..50 {
            if gateway.generation().index().name() == "second" {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(gateway.generation().id(), 2);

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
    }
}
