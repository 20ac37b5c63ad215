//! llm-failover binary
//!
//! Runs the HTTP dispatch server, sends a one-off prompt, or writes a
//! configuration template.

use clap::Parser;
use llm_failover::{
    cli::{Cli, Command, generate_config_template},
    config::Config,
    executor::{ChatRequest, HttpExecutor},
    failover::FailoverController,
    handlers::{self, AppState},
    telemetry,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Some(Command::Config { output }) = &cli.command {
        let template = generate_config_template();
        match output {
            Some(path) => {
                std::fs::write(path, template)?;
                eprintln!("Configuration template written to {}", path);
            }
            None => print!("{}", template),
        }
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };

    telemetry::init(&config.observability.log_level);

    match cli.command {
        Some(Command::Ask { prompt, system }) => ask(config, prompt, system).await,
        Some(Command::Serve) | None => serve(config).await,
        Some(Command::Config { .. }) => Ok(()),
    }
}

async fn serve(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = config.server.socket_addr()?;

    tracing::info!(
        primary = config.primary.base_url(),
        fallback = config.fallback.as_ref().map(|f| f.base_url()),
        max_failover_attempts = config.failover.max_failover_attempts,
        "Starting llm-failover server on {}",
        addr
    );

    let shutdown = CancellationToken::new();
    let state = AppState::new(config)?.with_shutdown(shutdown.clone());
    let app = handlers::app(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            tracing::info!("Shutdown signal received, cancelling in-flight requests");
            shutdown.cancel();
        })
        .await?;

    Ok(())
}

async fn ask(
    config: Config,
    prompt: String,
    system: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let controller = FailoverController::new(Arc::new(config.policy()?), HttpExecutor::new()?);

    let mut request = ChatRequest::user(prompt);
    if let Some(system) = system {
        request = request.with_system(system);
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let completion = controller.execute(&request, &cancel).await?;
    if completion.failed_over() {
        eprintln!(
            "(served by fallback model {})",
            completion.response().model()
        );
    }
    println!("{}", completion.response().content());

    Ok(())
}
