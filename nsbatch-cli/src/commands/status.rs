//! Status mode: which test namespaces exist right now

use anyhow::{Context, Result};
use nsbatch_namespace::{NamespaceInventory, ProvisionerConfig, SystemRunner};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::cli::Cli;

pub async fn execute(config: &ProvisionerConfig, cli: &Cli, workers: usize) -> Result<bool> {
    let netns_dir = &cli.netns_dir;
    let inventory = NamespaceInventory::scan(netns_dir)
        .await
        .with_context(|| format!("Failed to read {}", netns_dir.display()))?;

    let mut status = inventory.status(config);
    debug!(
        missing = status.missing.len(),
        present = status.present.len(),
        "Compared namespaces with workload"
    );

    if cli.links {
        if cli.dry_run {
            warn!("Dry run: skipping the link check");
        } else {
            status
                .check_links(config, Arc::new(SystemRunner::new()), workers)
                .await
                .context("Link check failed")?;
        }
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(true);
    }

    println!("{status}");
    for id in &status.unexpected {
        println!("  unexpected: {}", config.naming.namespace_name(*id));
    }
    for issue in status.links.iter().flatten() {
        let namespace = config.naming.namespace_name(issue.namespace);
        if !issue.missing.is_empty() {
            println!("  {namespace}: missing {}", issue.missing.join(", "));
        }
        if !issue.down.is_empty() {
            println!("  {namespace}: down {}", issue.down.join(", "));
        }
    }

    Ok(true)
}
