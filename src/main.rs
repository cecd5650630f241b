//! CodeScope - main application entry point
//!
//! `serve` (the default) polls for queued analyses and runs them in the
//! background; `run` executes one analysis in the foreground and prints its
//! progress events as JSON lines.

mod app;

use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use codescope_core::domain::analysis::AnalysisId;
use codescope_core::{Config, init_tracing};
use codescope_orchestrator::ChannelProgressSink;

use app::{AppHandle, create_app};

#[derive(Parser)]
#[command(name = "codescope", version, about = "Code intelligence analysis pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Poll for queued analyses and dispatch them until interrupted
    Serve,
    /// Run a single analysis in the foreground
    Run {
        /// Id of a queued analysis
        #[arg(long)]
        analysis: Uuid,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    let config = Config::load().context(
        "Failed to load configuration. Check DATABASE_URL and CODESCOPE__* env vars",
    )?;
    init_tracing(&config.logging).context("Failed to initialise tracing")?;

    let app = create_app(config).await?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(app).await,
        Command::Run { analysis } => run_one(app, AnalysisId::new(analysis)).await,
    }
}

async fn serve(app: AppHandle) -> anyhow::Result<()> {
    tracing::info!(
        concurrency = app.config.analysis.max_concurrent_runs,
        "Starting CodeScope analysis worker"
    );

    let shutdown = CancellationToken::new();
    let poller = app.dispatcher.spawn_queue_poller(
        Duration::from_secs(app.config.analysis.poll_interval_seconds),
        shutdown.clone(),
    );

    shutdown_signal(shutdown).await;
    poller.await.context("Queue poller task failed")?;

    tracing::info!("Waiting for running analyses to finish...");
    app.dispatcher.drain().await;
    tracing::info!("Worker shutdown complete");
    Ok(())
}

async fn run_one(app: AppHandle, analysis_id: AnalysisId) -> anyhow::Result<()> {
    let (sink, mut events) = ChannelProgressSink::channel(64);

    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{}", line),
                Err(e) => tracing::warn!(error = %e, "Failed to serialise progress event"),
            }
        }
    });

    let run = {
        let orchestrator = app.orchestrator.clone();
        tokio::spawn(async move { orchestrator.run_analysis(analysis_id, &sink).await })
    };

    let shutdown = CancellationToken::new();
    let interrupt = tokio::spawn({
        let orchestrator = app.orchestrator.clone();
        let shutdown = shutdown.clone();
        async move {
            tokio::select! {
                _ = shutdown.cancelled() => {}
                _ = signal::ctrl_c() => {
                    tracing::info!(analysis_id = %analysis_id, "Received Ctrl+C, cancelling analysis");
                    if let Err(e) = orchestrator.cancel_analysis(analysis_id).await {
                        tracing::error!(error = %e, "Failed to cancel analysis");
                    }
                }
            }
        }
    });

    let outcome = run.await.context("Analysis task failed")?;
    shutdown.cancel();
    let _ = interrupt.await;
    let _ = printer.await;

    let status = outcome?;
    tracing::info!(analysis_id = %analysis_id, %status, "Analysis finished");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM, then cancel background tasks
async fn shutdown_signal(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        },
    }

    shutdown_token.cancel();
}
