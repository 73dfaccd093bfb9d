use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use waypost::admin::{run_admin, AdminState};
use waypost::config::{load_config, AppConfig};
use waypost::http::HttpServer;
use waypost::lifecycle::{wait_for_signal, Shutdown};
use waypost::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "waypost")]
#[command(about = "Pattern-routed HTTP server with cookie sessions", long_about = None)]
struct Args {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long, env = "WAYPOST_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };

    logging::init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "waypost starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        cookie_store = config.sessions.cookie.enabled,
        filesystem_store = config.sessions.filesystem.enabled,
        memory_sessions = config.sessions.memory.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let routes = waypost::demo::routes()?;
    for route in routes.routes() {
        tracing::info!(route = %route.pattern().as_str(), handler = route.target().name(), "Route registered");
    }

    let admin = config.admin.clone();
    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(config, routes)?;

    let shutdown = Shutdown::new();

    let admin_task = if admin.enabled {
        let admin_listener = TcpListener::bind(&admin.bind_address).await?;
        let state = AdminState::new(server.routes(), server.services(), &admin.api_key);
        let rx = shutdown.subscribe();
        Some(tokio::spawn(run_admin(admin_listener, state, rx)))
    } else {
        None
    };

    let trigger = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        trigger.trigger();
    });

    tracing::info!(address = %listener.local_addr()?, "Listening for connections");
    server.run(listener, shutdown.subscribe()).await?;

    if let Some(task) = admin_task {
        match task.await {
            Ok(Err(e)) => tracing::error!(error = %e, "Admin API failed"),
            Err(e) => tracing::error!(error = %e, "Admin API task panicked"),
            Ok(Ok(())) => {}
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
