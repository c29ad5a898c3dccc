// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use lyceum_core::domain::platform_config::{GatewayKind, PlatformConfigManifest};

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./lyceum-config.yaml)
        #[arg(short, long, default_value = "./lyceum-config.yaml")]
        output: PathBuf,

        /// Include examples and comments
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(command: ConfigCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, examples } => generate(output, examples).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = PlatformConfigManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. LYCEUM_CONFIG_PATH: {}",
            std::env::var("LYCEUM_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./lyceum-config.yaml");
        println!("  4. ~/.lyceum/config.yaml");
        println!("  5. /etc/lyceum/config.yaml");
        println!();
    }

    println!("{}", "Current configuration:".bold());
    println!();

    let spec = &config.spec;

    println!("{}", "Server:".bold());
    println!("  Listen: {}:{}", spec.server.bind_address, spec.server.port);
    println!();

    println!("{}", "Database:".bold());
    match &spec.database {
        Some(db) => {
            println!("  URL: {}", redact_url(&db.url));
            println!("  Max connections: {}", db.max_connections);
        }
        None => println!("  {}", "(in-memory; data is lost on restart)".yellow()),
    }
    println!();

    println!("{}", "Payments:".bold());
    println!("  Gateway: {:?}", spec.payments.gateway);
    if spec.payments.gateway == GatewayKind::Stripe {
        println!("  Endpoint: {}", spec.payments.endpoint);
        println!(
            "  API key: {}",
            if spec.payments.api_key.is_some() { "(set)" } else { "(missing)" }
        );
    }
    println!("  Refund window: {} days", spec.payments.refund_window_days);
    println!("  Refund mode: {:?}", spec.payments.refund_mode);
    println!();

    println!("{}", "Jobs:".bold());
    println!("  Workers: {}", spec.jobs.workers);
    println!("  Max attempts: {}", spec.jobs.max_attempts);
    println!("  Retry backoff: {}ms", spec.jobs.retry_backoff_ms);
    println!();

    println!("{}", "Observability:".bold());
    println!("  Log level: {}", spec.observability.log_level);
    println!("  Log format: {}", spec.observability.log_format);
    match spec.observability.metrics_port {
        Some(port) => println!("  Metrics: 0.0.0.0:{}/metrics", port),
        None => println!("  Metrics: {}", "(disabled)".dimmed()),
    }
    println!();

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = PlatformConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: PathBuf, with_examples: bool) -> Result<()> {
    if with_examples {
        std::fs::write(&output, include_str!("../../templates/config-with-examples.yaml"))
            .with_context(|| format!("Failed to write config to {:?}", output))?;
    } else {
        PlatformConfigManifest::default()
            .to_yaml_file(&output)
            .with_context(|| format!("Failed to write config to {:?}", output))?;
    }

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}

/// Hide the password component of a connection URL
fn redact_url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut parsed) => {
            if parsed.password().is_some() && parsed.set_password(Some("****")).is_err() {
                return "(unprintable url)".to_string();
            }
            parsed.to_string()
        }
        Err(_) => "(invalid url)".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_url() {
        assert_eq!(
            redact_url("postgres://lyceum:secret@db:5432/lyceum"),
            "postgres://lyceum:****@db:5432/lyceum"
        );
        assert_eq!(redact_url("postgres://db/lyceum"), "postgres://db/lyceum");
    }

    #[test]
    fn test_redact_url_leaves_query_and_user_alone() {
        // An '@' in the query string is not a credential separator
        assert_eq!(
            redact_url("postgres://db.internal:5432/lyceum?application_name=a@b"),
            "postgres://db.internal:5432/lyceum?application_name=a@b"
        );
        assert_eq!(
            redact_url("postgres://lyceum@db/lyceum"),
            "postgres://lyceum@db/lyceum"
        );
        assert_eq!(
            redact_url("postgres://lyceum:p%40ss@db/lyceum?sslmode=require"),
            "postgres://lyceum:****@db/lyceum?sslmode=require"
        );
        assert_eq!(redact_url("not a url"), "(invalid url)");
    }

    #[test]
    fn test_example_template_is_valid() {
        let config = PlatformConfigManifest::from_yaml_str(include_str!(
            "../../templates/config-with-examples.yaml"
        ))
        .unwrap();
        config.validate().unwrap();
    }

    #[tokio::test]
    async fn test_generate_default_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("lyceum-config.yaml");
        generate(output.clone(), false).await.unwrap();

        let config = PlatformConfigManifest::from_yaml_file(&output).unwrap();
        config.validate().unwrap();
        assert_eq!(config.metadata.name, "lyceum");
    }
}
