use clap::Parser;
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use portfolio_api::{AppState, Args, Settings, app, rate_limit};

#[tokio::main]
async fn main() -> ExitCode {
    // parse cli arguments
    let args = Args::parse();

    let default_filter = match args.verbose {
        0 => "info,tower_http=warn",
        1 => "debug,tower_http=info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let settings = Settings::from(&args);

    if settings.api_key.is_none() {
        tracing::warn!("GEMINI_API_KEY is not set; AI routes will answer 500 until it is");
    }

    let state = Arc::new(AppState::new(settings)?);

    if let Some(every) = state.settings.sweep_interval {
        let limiter = state.rate_limiter.clone();
        tokio::spawn(async move {
            rate_limit::sweeper(limiter, every).await;
        });
    }

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!(
        port = args.port,
        upstream = %state.upstream.base_url(),
        timeout_secs = args.upstream_timeout,
        "portfolio api listening"
    );

    axum::serve(
        listener,
        app(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
