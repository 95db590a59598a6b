//! Create and delete modes

use anyhow::{Context, Result};
use nsbatch_core::{Mode, ProvisionEvent};
use nsbatch_namespace::{
    BatchReport, CommandRunner, DryRunRunner, FailurePolicy, Provisioner, ProvisionerConfig,
    SystemRunner,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

const EVENT_BUFFER: usize = 256;

pub async fn execute(
    mode: Mode,
    workers: usize,
    config: ProvisionerConfig,
    dry_run: bool,
    json: bool,
) -> Result<bool> {
    let runner: Arc<dyn CommandRunner> = if dry_run {
        info!("Dry run: commands are printed, not executed");
        Arc::new(DryRunRunner::new())
    } else {
        Arc::new(SystemRunner::new())
    };

    let strict = config.failure_policy == FailurePolicy::Strict;
    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let printer = tokio::spawn(print_events(rx, !json));

    let provisioner = Provisioner::new(config, runner)
        .context("Invalid workload")?
        .with_events(tx);

    let report = provisioner
        .run(mode, workers)
        .await
        .with_context(|| format!("{mode} batch failed"))?;

    // Closes the channel so the printer drains and exits
    drop(provisioner);
    printer.await.context("Event printer crashed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }

    Ok(report.is_success() || !strict)
}

async fn print_events(mut rx: mpsc::Receiver<ProvisionEvent>, echo: bool) {
    while let Some(event) = rx.recv().await {
        if echo && !matches!(event, ProvisionEvent::RangeFinished { .. }) {
            println!("{event}");
        }
    }
}

fn print_summary(report: &BatchReport) {
    println!();
    println!("{report}");

    for (range, record) in report.failures() {
        println!("  {range}: {record}");
    }
}
