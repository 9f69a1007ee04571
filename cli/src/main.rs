//! trellis CLI - binary entry point.
//!
//! Loads `~/.trellis/config.toml`, connects to the Beef language server over
//! the configured transport, runs one command, and shuts the server down.
//!
//! ```text
//! main() -> init_tracing() -> LspClient::connect() -> dispatch(command)
//!                                                         |
//!                                   settings: session::run (bridge + stdin)
//!                                   restart:  LspClient::restart
//!                                   others:   commands::*
//! ```

mod args;
mod commands;
mod session;

use std::{
    env,
    fs::{self, OpenOptions},
    path::PathBuf,
    process::ExitCode,
    sync::Mutex,
};

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use trellis_config::TrellisConfig;
use trellis_lsp::{ClientStatus, LspClient};
use trellis_types::{DEFAULT_TCP_HOST, DEFAULT_TCP_PORT, ServerConfig, Transport};

use crate::args::{Cli, Commands};

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (log_file, init_warnings) = open_log_file();

    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        tracing::info!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return;
    }

    // No log file: stay silent rather than interleave logs with session output.
    tracing_subscriber::registry().with(env_filter).init();
}

fn open_log_file() -> (Option<(PathBuf, std::fs::File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in log_file_candidates() {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&candidate)
        {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => {
                warnings.push(format!(
                    "Failed to open log file {}: {e}",
                    candidate.display()
                ));
            }
        }
    }

    (None, warnings)
}

fn log_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    // Primary: ~/.trellis/logs/trellis.log
    if let Some(config_path) = TrellisConfig::path()
        && let Some(config_dir) = config_path.parent()
    {
        candidates.push(config_dir.join("logs").join("trellis.log"));
    }

    // Fallback: ./.trellis/logs/trellis.log
    candidates.push(PathBuf::from(".trellis").join("logs").join("trellis.log"));

    candidates
}

/// Configured server, with `--tcp`/`--port` applied on top.
fn server_config(cli: &Cli, config: &TrellisConfig) -> ServerConfig {
    if !cli.tcp {
        return config.server.clone();
    }
    let (host, configured_port) = match config.server.transport() {
        Transport::Tcp { host, port } => (host.clone(), *port),
        Transport::Stdio { .. } => (DEFAULT_TCP_HOST.to_string(), DEFAULT_TCP_PORT),
    };
    ServerConfig::new(
        Transport::Tcp {
            host,
            port: cli.port.unwrap_or(configured_port),
        },
        config.server.request_timeout(),
    )
}

/// Commands need the workspace loaded; the server announces that once per
/// connection.
async fn wait_until_ready(client: &mut LspClient, server: &ServerConfig) -> Result<()> {
    let status = client.wait_until_running(server.request_timeout()).await;
    if matches!(status, ClientStatus::Stopped(_)) {
        anyhow::bail!("{}", status.label());
    }
    tracing::info!(status = %status.label(), "Language server ready");
    Ok(())
}

async fn dispatch(client: &mut LspClient, command: &Commands, color: bool) -> Result<i32> {
    match command {
        Commands::Projects => commands::projects(client).await?,
        Commands::Settings {
            scope,
            project,
            manifest,
        } => {
            let view =
                commands::settings_view(client, *scope, project.as_deref(), manifest.as_deref())
                    .await?;
            session::run(client, view).await?;
        }
        Commands::Build { clean } => return commands::build(client, *clean, color).await,
        Commands::Run { project } => commands::run(client, project).await?,
        Commands::Configuration { name } => {
            commands::configuration(client, name.as_deref()).await?;
        }
        Commands::Restart => println!("Restarted. {}", client.status().label()),
    }
    Ok(0)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing();

    let config = match TrellisConfig::load() {
        Ok(config) => config.unwrap_or_default(),
        Err(e) => {
            eprintln!("Ignoring config: {e}");
            TrellisConfig::default()
        }
    };
    let server = server_config(&cli, &config);
    let root = match &cli.workspace {
        Some(dir) => dir.clone(),
        None => env::current_dir().context("failed to read current directory")?,
    };

    let mut client = LspClient::connect(&server, Some(&root))
        .await
        .with_context(|| format!("failed to start language server ({})", server.describe()))?;
    wait_until_ready(&mut client, &server).await?;

    if matches!(cli.command, Commands::Restart) {
        client = client
            .restart(&server, Some(&root))
            .await
            .with_context(|| format!("failed to restart language server ({})", server.describe()))?;
        wait_until_ready(&mut client, &server).await?;
    }

    let outcome = tokio::select! {
        outcome = dispatch(&mut client, &cli.command, config.build.color) => outcome,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted");
            Ok(130)
        }
    };
    client.shutdown().await;

    match outcome {
        Ok(code) => Ok(ExitCode::from(u8::try_from(code).unwrap_or(1))),
        Err(e) => {
            eprintln!("Error: {e:#}");
            Ok(ExitCode::FAILURE)
        }
    }
}
