//! Workload assembly and mode dispatch

use anyhow::{Context, Result};
use nsbatch_core::{Mode, NamingScheme};
use nsbatch_namespace::{FailurePolicy, ProvisionerConfig};
use tracing::{debug, warn};

use crate::cli::Cli;
use crate::commands;

/// Run one mode; `Ok(false)` means the batch failed under `--strict`
pub async fn execute(cli: &Cli, mode: &str, workers: usize) -> Result<bool> {
    let Ok(mode) = mode.parse::<Mode>() else {
        warn!(mode, "Unknown mode, nothing to do");
        return Ok(true);
    };

    anyhow::ensure!(workers > 0, "worker count must be a positive integer");

    let config = build_config(cli)?;
    debug!(
        ranges = config.ranges.len(),
        namespaces = config.total_namespaces(),
        interfaces = config.interfaces_per_namespace,
        naming = %config.naming,
        "Workload ready"
    );

    if mode.is_mutating() && !cli.dry_run && !nix::unistd::geteuid().is_root() {
        warn!("Not running as root; ip and modprobe will most likely fail");
    }

    match mode {
        Mode::Status => commands::status::execute(&config, cli, workers).await,
        Mode::Create | Mode::Delete => {
            commands::batch::execute(mode, workers, config, cli.dry_run, cli.json).await
        }
    }
}

/// Load the workload file, if any, then apply command-line overrides
fn build_config(cli: &Cli) -> Result<ProvisionerConfig> {
    let mut config = match &cli.config {
        Some(path) => ProvisionerConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ProvisionerConfig::new(),
    };

    if !cli.ranges.is_empty() {
        config = config.with_ranges(cli.ranges.clone());
    }
    if let Some(count) = cli.interfaces {
        config = config.with_interfaces(count);
    }
    if cli.delimited_names {
        config = config.with_naming(NamingScheme::Delimited);
    }
    if cli.strict {
        config = config.with_failure_policy(FailurePolicy::Strict);
    }
    if let Some(module) = &cli.module {
        config = config.with_module(module.as_str());
    }

    config.validate().context("Invalid workload")?;
    Ok(config)
}
