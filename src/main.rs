//! gemini-gateway server binary.

use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use gemini_gateway::config::{Cli, Config};
use gemini_gateway::server::api::{build_router, AppState};
use gemini_gateway::upstream::gemini::GeminiClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A local .env may supply GOOGLE_API_KEY / PORT; load it before clap reads the environment.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(&cli);

    info!("gemini-gateway v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::resolve(&cli)?;

    let client = GeminiClient::new(&config.upstream)?;
    info!(
        model = client.model(),
        base_url = %config.upstream.base_url,
        timeout_secs = ?config.upstream.request_timeout_secs,
        "Upstream client ready"
    );

    let state = Arc::new(
        AppState::new(Arc::new(client), config.streaming.keep_alive())
            .with_body_limit(config.server.max_body_bytes),
    );
    let app = build_router(state);

    let listen_addr = config.server.listen_addr();
    let listener = TcpListener::bind(&listen_addr).await?;
    info!("Listening on {listen_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

fn init_tracing(cli: &Cli) {
    let default_filter = if cli.verbose {
        "gemini_gateway=debug,tower_http=debug"
    } else {
        "gemini_gateway=info,tower_http=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    if cli.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
