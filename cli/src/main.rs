// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Lyceum Server CLI
//!
//! The `lyceum` binary runs the course platform API and carries the operator
//! commands around it.
//!
//! ## Commands
//!
//! - `lyceum serve` - Run the HTTP API, job workers and metrics exporter
//! - `lyceum config show|validate|generate` - Configuration management
//! - `lyceum update [--dry-run]` - Apply database migrations

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use lyceum::commands::{self, ConfigCommand, UpdateCommand};
use lyceum_core::domain::platform_config::PlatformConfigManifest;

/// Lyceum - course purchases, enrollments and forum polls
#[derive(Parser)]
#[command(name = "lyceum")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "LYCEUM_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// HTTP API port (overrides spec.server.port)
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error); defaults to spec.observability.log_level
    #[arg(long, global = true, env = "LYCEUM_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the platform server
    #[command(name = "serve")]
    Serve,

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Update the Lyceum database schema
    #[command(name = "update")]
    Update {
        #[command(flatten)]
        command: UpdateCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve) => {
            let config = PlatformConfigManifest::load_or_default(cli.config)
                .context("Failed to load configuration")?;
            let observability = &config.spec.observability;
            init_logging(
                cli.log_level.as_deref().unwrap_or(&observability.log_level),
                &observability.log_format,
            )?;
            commands::serve::run(config, cli.port).await
        }
        Some(Commands::Config { command }) => {
            init_logging(cli.log_level.as_deref().unwrap_or("warn"), "text")?;
            commands::config::handle_command(command, cli.config).await
        }
        Some(Commands::Update { command }) => {
            init_logging(cli.log_level.as_deref().unwrap_or("info"), "text")?;
            commands::update::execute(command, cli.config).await
        }
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging. `RUST_LOG` wins over `level`.
fn init_logging(level: &str, format: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    match format {
        "json" => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_current_span(false)
            .init(),
        _ => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .compact()
            .init(),
    }

    Ok(())
}
