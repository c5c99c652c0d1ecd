// ABOUTME: Admin CLI - create users and API keys, list/reload tools, export metrics, against
// ABOUTME: the same persisted stores the server binary reads (spec §6, §4.1 ExportMetricsCSV).
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! Usage:
//! ```bash
//! sajha-cli create-admin --user-id admin --password hunter2
//! sajha-cli create-api-key --principal-id svc --allowed-tools echo,weather
//! sajha-cli list-tools
//! sajha-cli reload-tools
//! sajha-cli export-metrics
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use sajha_server::auth::{build_principal, Principal, PrincipalKind};
use sajha_server::config::ServerConfig;
use sajha_server::AppState;
use std::collections::HashSet;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "sajha-cli")]
#[command(about = "SAJHA admin command-line interface")]
struct CliArgs {
    #[command(subcommand)]
    command: Command,

    /// Tools configuration directory override.
    #[arg(long)]
    tools_config_dir: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Seed or reset the bootstrap admin account.
    CreateAdmin {
        #[arg(long, default_value = "admin")]
        user_id: String,
        #[arg(long)]
        password: String,
    },
    /// Create a new user principal with allow-list / regex tool access.
    CreateUser {
        #[arg(long)]
        user_id: String,
        #[arg(long)]
        password: String,
        #[arg(long, value_delimiter = ',')]
        allowed_tools: Vec<String>,
        #[arg(long, value_delimiter = ',')]
        allowed_patterns: Vec<String>,
    },
    /// Mint a new API key, printing the full key exactly once.
    CreateApiKey {
        #[arg(long)]
        principal_id: String,
        #[arg(long, value_delimiter = ',')]
        allowed_tools: Vec<String>,
        #[arg(long, value_delimiter = ',')]
        allowed_patterns: Vec<String>,
        #[arg(long)]
        trial: bool,
    },
    /// List every registered tool, enabled or not.
    ListTools,
    /// Rescan the tools configuration directory and re-admit every document.
    ReloadTools,
    /// Print cumulative per-tool metrics as CSV (spec §4.1 `ExportMetricsCSV`).
    ExportMetrics,
}

#[tokio::main]
async fn main() {
    std::process::exit(run().await);
}

async fn run() -> i32 {
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{e}");
            return 2;
        }
    };

    sajha_server::logging::init("info", sajha_server::logging::LogFormat::Pretty);

    let mut config = ServerConfig::from_env();
    if let Some(dir) = &args.tools_config_dir {
        config.tools_config_dir = dir.into();
    }

    let state = match AppState::bootstrap(config).await {
        Ok(state) => state,
        Err(err) => {
            error!(error = %err.message, "failed to bootstrap application state");
            return 1;
        }
    };

    match execute(state, args.command).await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {err}");
            1
        }
    }
}

async fn execute(state: std::sync::Arc<AppState>, command: Command) -> Result<()> {
    match command {
        Command::CreateAdmin { user_id, password } => {
            state.auth.create_user(&user_id, &password, Principal::admin(&user_id))?;
            println!("created admin account '{user_id}'");
        }
        Command::CreateUser {
            user_id,
            password,
            allowed_tools,
            allowed_patterns,
        } => {
            let principal = build_principal(
                user_id.clone(),
                PrincipalKind::User,
                HashSet::new(),
                allowed_tools.into_iter().collect(),
                allowed_patterns,
            );
            state.auth.create_user(&user_id, &password, principal)?;
            println!("created user account '{user_id}'");
        }
        Command::CreateApiKey {
            principal_id,
            allowed_tools,
            allowed_patterns,
            trial,
        } => {
            let principal = build_principal(
                principal_id,
                PrincipalKind::ApiKey,
                HashSet::new(),
                allowed_tools.into_iter().collect(),
                allowed_patterns,
            );
            let (full_key, record) = state.auth.api_keys().create(principal, trial);
            println!("api key (shown once): {full_key}");
            println!("prefix: {}", record.key_prefix);
        }
        Command::ListTools => {
            for summary in state.registry.list() {
                println!(
                    "{:<32} v{:<8} enabled={:<5} {}",
                    summary.name, summary.version, summary.enabled, summary.description
                );
            }
        }
        Command::ReloadTools => {
            let pool = state.sql_pool.clone();
            let count = state
                .registry
                .reload_all(move |def| sajha_server::studio::build_handler(&def.handler_spec, Some(&pool)))?;
            info!(count, "reloaded tool registry");
            println!("reloaded {count} tools");
        }
        Command::ExportMetrics => {
            print!("{}", state.registry.export_metrics_csv());
        }
    }
    Ok(())
}
