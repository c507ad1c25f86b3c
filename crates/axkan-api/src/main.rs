//! Axkan CLI and server entry point.
//!
//! Binary name: `axkan`
//!
//! Parses CLI arguments, initializes tracing, the database, and the provider
//! adapters, then dispatches to a command handler or starts the server.

mod cli;
mod http;
mod state;
mod worker;

use clap::Parser;

use axkan_observe::tracing_setup::{
    TracingOptions, filter_for_verbosity, init_tracing, shutdown_tracing,
};
use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let serving = matches!(cli.command, Commands::Serve { .. });
    let default_filter = if serving || cli.verbose > 0 || cli.quiet {
        filter_for_verbosity(cli.verbose, cli.quiet)
    } else {
        "warn".to_string()
    };
    init_tracing(&TracingOptions {
        default_filter,
        // For one-shot commands --json selects the output format, not the log format.
        json: cli.json && serving,
        otel: cli.otel,
    })
    .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let state = AppState::init().await?;

    let result = match cli.command {
        Commands::Serve { port, host } => serve(state, host, port).await,
        Commands::Conversations => cli::conversation::list_conversations(&state, cli.json).await,
        Commands::Messages { id } => cli::conversation::show_messages(&state, id, cli.json).await,
        Commands::TokenStatus => cli::status::token_status(&state, cli.json).await,
    };

    shutdown_tracing();
    result
}

async fn serve(state: AppState, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let host = host.unwrap_or_else(|| state.config.http.host.clone());
    let port = port.unwrap_or(state.config.http.port);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    if state.verify_token().is_none() {
        tracing::warn!("WHATSAPP_VERIFY_TOKEN not set, webhook verification will be rejected");
    }
    if state.admin_key_digest.is_none() {
        tracing::warn!("AXKAN_ADMIN_API_KEY not set, operator API is disabled");
    }

    tracing::info!(
        %addr,
        data_dir = %state.data_dir.display(),
        max_inflight_turns = state.config.pipeline.max_inflight_turns,
        "axkan listening"
    );

    let router = http::router::build_router(state);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
