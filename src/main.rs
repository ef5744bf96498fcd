//! Blog API server binary.

use blog_apiserver::config::Config;
use blog_apiserver::startup::Application;
use blog_telemetry::{setup_telemetry, TelemetryConfig};
use tokio::signal;
use tracing::{error, info};

/// Build version (injected at compile time or default)
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::init()?;
    setup_telemetry(&TelemetryConfig {
        log_level: config.log_level.clone(),
        json_logs: config.json_logs,
    })?;

    let settings = config.settings()?;
    info!(
        version = VERSION,
        mode = ?settings.transport.mode,
        grpc = %settings.transport.grpc_addr,
        http = %settings.transport.http_addr,
        pid = std::process::id(),
        "Starting blog-apiserver"
    );

    let app = Application::build(&settings).await.inspect_err(|e| {
        error!(error = %e, "Startup failed");
    })?;

    let report = app.run_until(shutdown_signal()).await.inspect_err(|e| {
        error!(error = %e, "Server stopped with an error");
    })?;

    info!(gateway = ?report.gateway, rpc = ?report.rpc, "Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}
