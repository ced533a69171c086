//! Chatflow Dev Proxy binary
//!
//! Serves the frontend's static files and relays API requests to the
//! chat backend, streaming responses through without buffering. Runs
//! until interrupted; keeps no state.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chatflow_proxy::{check, create_router, ProxyConfig};

#[derive(Parser, Debug)]
#[command(name = "chatflow-proxy", version, about = "Development proxy for the chatflow frontend")]
struct Cli {
    #[command(flatten)]
    serve: ServeArgs,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Args, Clone, Debug)]
struct ServeArgs {
    /// Port to listen on
    #[arg(long, env = "CHATFLOW_PROXY_PORT", default_value_t = 3000)]
    port: u16,

    /// Backend origin API requests are relayed to
    #[arg(long, env = "CHATFLOW_BACKEND_URL", default_value = "http://localhost:8000")]
    backend: String,

    /// Directory served for non-API paths
    #[arg(long, env = "CHATFLOW_STATIC_ROOT", default_value = "frontend")]
    static_root: PathBuf,

    /// Path prefix relayed to the backend
    #[arg(long, default_value = "/api")]
    api_prefix: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that the backend is running and reachable
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,chatflow=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Command::Check) => check::run(&cli.serve.backend).await,
        None => serve(cli.serve).await,
    }
}

async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let config = ProxyConfig {
        backend: args.backend,
        api_prefix: args.api_prefix,
        static_root: args.static_root,
    };

    tracing::info!(
        backend = %config.backend,
        api_prefix = %config.api_prefix,
        static_root = %config.static_root.display(),
        "Dev proxy configuration loaded"
    );

    let app = create_router(config);

    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("Frontend server running at http://{addr}");
    tracing::info!("Press Ctrl+C to stop the server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
