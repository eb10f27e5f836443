mod app;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use sessiongate_auth::{AuthConfig, AuthService, Repositories};
use sessiongate_core::auth::{Clock, SystemClock};
use tokio::{net::TcpListener, signal};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::app::create_app;

/// Sessiongate - OIDC login with signed, revocable session tokens
#[derive(Parser, Debug)]
#[command(name = "sessiongate")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Host address to bind the server to
    #[arg(long, short = 'H', default_value = "0.0.0.0", env = "HOST")]
    host: String,

    /// Port to listen on
    #[arg(long, short, default_value = "3000", env = "PORT")]
    port: u16,

    /// SQLite database URL; in-memory stores are used when omitted
    #[cfg(feature = "sqlite")]
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Port for the mock IdP; requires MOCK_IDP_URL to point at it
    #[cfg(feature = "mock")]
    #[arg(long, env = "MOCK_IDP_PORT")]
    mock_idp_port: Option<u16>,

    /// Upper bound for a whole HTTP request, in seconds
    #[arg(long, default_value = "30", env = "REQUEST_TIMEOUT_SECS")]
    request_timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "sessiongate=debug,sessiongate_auth=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AuthConfig::from_env()?;
    tracing::debug!(?config, "Loaded auth configuration");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let repos = init_stores(&cli, clock.clone()).await?;

    #[cfg(feature = "mock")]
    if let Some(port) = cli.mock_idp_port {
        tokio::spawn(async move {
            if let Err(e) = sessiongate_auth::mock_idp::MockIdpServer::new(port)
                .run()
                .await
            {
                tracing::error!(error = %e, "Mock IdP server stopped");
            }
        });
    }

    let service = AuthService::from_config(&config, repos, clock).await?;
    let app = create_app(service, Duration::from_secs(cli.request_timeout_secs));

    let addr = format!("{}:{}", cli.host, cli.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);

    // Run the server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Build the stores selected on the command line.
#[cfg(feature = "sqlite")]
async fn init_stores(cli: &Cli, clock: Arc<dyn Clock>) -> Result<Repositories> {
    let Some(url) = &cli.database_url else {
        tracing::warn!("No database configured, sessions will not survive a restart");
        return Ok(Repositories::in_memory(clock));
    };

    let stores = sessiongate_auth::SqliteStores::connect(url, clock).await?;
    let purged = stores.purge_expired().await?;
    tracing::info!(purged, "SQLite stores ready");

    Ok(stores.into())
}

#[cfg(not(feature = "sqlite"))]
async fn init_stores(_cli: &Cli, clock: Arc<dyn Clock>) -> Result<Repositories> {
    tracing::warn!("Using in-memory stores, sessions will not survive a restart");
    Ok(Repositories::in_memory(clock))
}

/// Wait for shutdown signals (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        }
    }
}
