use std::fmt::Display;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::signal;

use catalog_core::config::{Config, DirectoryConfig};
use catalog_core::endpoints::status::CATALOG_GATEWAY_VERSION;
use catalog_core::error;
use catalog_core::gateway_util::GatewayHandle;
use catalog_core::observability::{self, LogFormat};
use catalog_core::router::build_router;

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Path to the gateway's TOML config file. Incompatible with `--default-config`
    #[arg(long)]
    config_file: Option<PathBuf>,

    /// Use the default config: an empty static directory and an in-memory version store
    #[arg(long)]
    default_config: bool,

    /// Sets the log format used for all gateway logs.
    #[arg(long)]
    #[arg(value_enum)]
    #[clap(default_value_t = LogFormat::default())]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    // Set up logs and metrics immediately, so that we can use `tracing`
    observability::setup_observability(&args.log_format).expect_pretty("Failed to set up logs");

    tracing::info!("Starting Catalog Gateway {CATALOG_GATEWAY_VERSION}");

    let metrics_handle = observability::setup_metrics().expect_pretty("Failed to set up metrics");

    if args.config_file.is_some() && args.default_config {
        tracing::error!("Cannot specify both `--config-file` and `--default-config`");
        std::process::exit(1);
    }

    let config = if let Some(path) = &args.config_file {
        Arc::new(
            Config::load_from_path(path)
                .await
                .ok() // Don't print the error here, since it was already printed when it was constructed
                .expect_pretty(&format!("Failed to load config file `{}`", path.display())),
        )
    } else {
        if !args.default_config {
            tracing::warn!(
                "No config file provided, so the catalog has no categories. Use `--config-file path/to/catalog.toml` to specify a config file, or `--default-config` to silence this warning."
            );
        }
        Arc::new(Config::default())
    };

    // Set debug mode
    error::set_debug(config.gateway.debug).expect_pretty("Failed to set debug mode");

    let gateway_handle =
        GatewayHandle::new(config.clone()).expect_pretty("Failed to initialize AppState");

    let router = build_router(gateway_handle.app_state.clone(), Some(metrics_handle));

    // Bind to the socket address specified in the config, or default to 0.0.0.0:3000
    let bind_address = config
        .gateway
        .bind_address
        .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

    let listener = match tokio::net::TcpListener::bind(bind_address).await {
        Ok(listener) => listener,
        Err(e) if e.kind() == ErrorKind::AddrInUse => {
            tracing::error!(
                "Failed to bind to socket address {bind_address}: {e}. Tip: Ensure no other process is using port {} or try a different port.",
                bind_address.port()
            );
            std::process::exit(1);
        }
        Err(e) => {
            tracing::error!("Failed to bind to socket address {bind_address}: {e}");
            std::process::exit(1);
        }
    };

    // This will give us the chosen port if the user specified a port of 0
    let actual_bind_address = listener
        .local_addr()
        .expect_pretty("Failed to get bind address from listener");

    tracing::info!("Catalog Gateway is listening on {actual_bind_address}");

    // Print the configuration being used
    match &args.config_file {
        Some(path) => tracing::info!("├ Configuration: {}", path.display()),
        None => tracing::info!("├ Configuration: default"),
    }

    match &config.directory {
        DirectoryConfig::File {
            path,
            watch_interval_ms,
            ..
        } => {
            tracing::info!("├ Directory: file `{}`", path.display());
            if *watch_interval_ms > 0 {
                tracing::info!("├ Edit Watcher: enabled (interval_ms = {watch_interval_ms})");
            } else {
                tracing::info!("├ Edit Watcher: disabled");
            }
        }
        DirectoryConfig::Static { categories, .. } => {
            tracing::info!("├ Directory: static ({} categories)", categories.len());
        }
    }

    match &config.cache.version_path {
        Some(path) => tracing::info!(
            "├ Cache: ttl_s = {}, version file `{}`",
            config.cache.ttl_s,
            path.display()
        ),
        None => tracing::info!("├ Cache: ttl_s = {}, in-memory version", config.cache.ttl_s),
    }

    let peers = gateway_handle.app_state.notifier.targets().len();
    tracing::info!("└ Invalidation Peers: {peers}");

    // Start the server
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect_pretty("Failed to start server");

    tracing::info!("Stopping background tasks");
    gateway_handle.shutdown().await;
    tracing::info!("Catalog Gateway shut down");
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect_pretty("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect_pretty("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM signal");
        }
    };
}

/// ┌──────────────────────────────────────────────────────────────────────────┐
/// │                           MAIN.RS ESCAPE HATCH                           │
/// └──────────────────────────────────────────────────────────────────────────┘
///
/// We don't allow panic, escape, unwrap, or similar methods in the codebase,
/// except for the private `expect_pretty` method, which is to be used only in
/// main.rs during initialization. After initialization, we expect all code to
/// handle errors gracefully.
trait ExpectPretty<T> {
    fn expect_pretty(self, msg: &str) -> T;
}

impl<T, E: Display> ExpectPretty<T> for Result<T, E> {
    fn expect_pretty(self, msg: &str) -> T {
        match self {
            Ok(value) => value,
            Err(err) => {
                tracing::error!("{msg}: {err}");
                std::process::exit(1);
            }
        }
    }
}

impl<T> ExpectPretty<T> for Option<T> {
    fn expect_pretty(self, msg: &str) -> T {
        match self {
            Some(value) => value,
            None => {
                tracing::error!("{msg}");
                std::process::exit(1);
            }
        }
    }
}
