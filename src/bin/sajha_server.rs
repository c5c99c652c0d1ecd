// ABOUTME: Server binary - starts the MCP JSON-RPC endpoint and REST surface over one AppState.
// ABOUTME: Exit codes: 0 normal termination, 1 unrecoverable startup failure, 2 configuration error.
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

#![forbid(unsafe_code)]

//! # SAJHA Server Binary
//!
//! Boots [`sajha_server::AppState`] from the environment, composes the HTTP
//! router (`sajha_server::http::router`), and serves it until shutdown.

use anyhow::Result;
use clap::Parser;
use sajha_server::config::ServerConfig;
use sajha_server::logging::{self, LogFormat};
use sajha_server::AppState;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "sajha-server")]
#[command(about = "SAJHA - multi-tenant tool registry, MCP dispatcher and OLAP analytics engine")]
struct Args {
    /// Override the bind port (otherwise read from `SAJHA_PORT`).
    #[arg(long)]
    port: Option<u16>,

    /// Override the tools configuration directory.
    #[arg(long)]
    tools_config_dir: Option<String>,

    /// Emit structured JSON logs instead of the default pretty format.
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() {
    let exit_code = run().await;
    std::process::exit(exit_code);
}

async fn run() -> i32 {
    let args = parse_args_or_default();
    let config = match build_configuration(&args) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("configuration error: {err}");
            return 2;
        }
    };

    let format = if args.json_logs { LogFormat::Json } else { LogFormat::Pretty };
    logging::init(&config.log_level.to_string(), format);
    info!("starting sajha-server: {}", config.summary());

    match AppState::bootstrap(config.clone()).await {
        Ok(state) => {
            if let Err(err) = serve(state, &config).await {
                error!(error = %err, "server terminated with an error");
                return 1;
            }
            0
        }
        Err(err) => {
            error!(error = %err.message, "failed to bootstrap application state");
            1
        }
    }
}

fn parse_args_or_default() -> Args {
    match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("argument parsing failed: {e}");
            eprintln!("falling back to environment-driven configuration");
            Args {
                port: None,
                tools_config_dir: None,
                json_logs: false,
            }
        }
    }
}

fn build_configuration(args: &Args) -> Result<ServerConfig> {
    let mut config = ServerConfig::from_env();
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(dir) = &args.tools_config_dir {
        config.tools_config_dir = dir.into();
    }
    Ok(config)
}

async fn serve(state: std::sync::Arc<AppState>, config: &ServerConfig) -> Result<()> {
    let router = sajha_server::http::router(state);
    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "listening for MCP and REST traffic");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
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
        () = ctrl_c => info!("received Ctrl+C, shutting down"),
        () = terminate => info!("received SIGTERM, shutting down"),
    }
}
