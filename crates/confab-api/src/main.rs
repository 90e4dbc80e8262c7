//! Confab CLI and REST API entry point.
//!
//! Binary name: `confab`
//!
//! Parses CLI arguments, initializes database and services, then dispatches
//! to the appropriate command handler or starts the REST API server.

mod cli;
mod http;
mod state;

use anyhow::Context;
use clap::Parser;
use clap_complete::generate;
use tracing::{info, warn};

use cli::{Cli, Commands, ModelsCommand};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Shell completions don't need tracing or app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "confab", &mut std::io::stdout());
        return Ok(());
    }

    let enable_otel = cli.otel || confab_observe::tracing_setup::otel_requested_by_env();
    confab_observe::init_tracing(cli.log_directive(), enable_otel)
        .map_err(|e| anyhow::anyhow!(e))
        .context("failed to initialize tracing")?;

    let result = run(cli).await;
    confab_observe::shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let state = AppState::init().await?;

    match cli.command {
        Commands::Serve { port, host } => {
            let host = host.unwrap_or_else(|| state.config.server.host.clone());
            let port = port.unwrap_or(state.config.server.port);
            let addr = format!("{host}:{port}");
            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .with_context(|| format!("failed to bind {addr}"))?;

            if !cli.quiet {
                println!(
                    "  {} Confab API listening on {}",
                    console::style("⚡").bold(),
                    console::style(format!("http://{addr}")).cyan()
                );
                println!("  {}", console::style("Press Ctrl+C to stop").dim());
            }
            info!(%addr, data_dir = %state.data_dir().display(), "server starting");

            let sweeper = state.spawn_memory_sweeper();
            let router = http::router::build_router(state);

            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await?;

            sweeper.abort();
            if !cli.quiet {
                println!("\n  Server stopped.");
            }
        }

        Commands::Models { command } => match command {
            ModelsCommand::List { model_type } => {
                cli::models::list_models(&state, model_type, cli.json).await?;
            }
            ModelsCommand::Check { id, probe } => {
                cli::models::check_model(&state, &id, probe, cli.json).await?;
            }
            ModelsCommand::Add {
                provider,
                model,
                id,
                model_type,
                base_url,
                api_key,
                secret_key,
                deployment,
            } => {
                let args = cli::models::AddModel {
                    provider,
                    model,
                    id,
                    model_type,
                    base_url,
                    api_key,
                    secret_key,
                    deployment,
                };
                cli::models::add_model(&state, args, cli.json).await?;
            }
            ModelsCommand::Remove { id } => {
                cli::models::remove_model(&state, &id, cli.json).await?;
            }
        },

        Commands::Ask {
            message,
            model,
            app,
            conversation,
        } => {
            cli::chat::ask(&state, message, model, app, conversation, cli.json).await?;
        }

        Commands::History { conversation } => {
            cli::chat::history(&state, &conversation, cli.json).await?;
        }

        Commands::Clear {
            conversation,
            force,
        } => {
            cli::chat::clear(&state, &conversation, force, cli.json).await?;
        }

        Commands::Completions { .. } => {}
    }

    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
