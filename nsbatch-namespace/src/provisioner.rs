//! Batch provisioning of namespaces and dummy interfaces
//!
//! Ranges are the unit of parallel work. Each range is handed to one worker,
//! which runs the range's commands strictly in order.

use nsbatch_core::{IdRange, Mode, ProvisionEvent, Result};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::mpsc;

use crate::command::NetCommand;
use crate::config::{FailurePolicy, ProvisionerConfig};
use crate::plan::RangePlan;
use crate::pool::WorkerPool;
use crate::report::{BatchReport, CommandOutcome, CommandRecord, RangeReport};
use crate::runner::CommandRunner;

/// Provisions the namespaces of a workload through a [`CommandRunner`]
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use nsbatch_core::IdRange;
/// use nsbatch_namespace::{MockRunner, Provisioner, ProvisionerConfig};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let runner = MockRunner::new();
/// let config = ProvisionerConfig::new().with_ranges(vec![IdRange::new(0, 3).unwrap()]);
/// let provisioner = Provisioner::new(config, Arc::new(runner.clone())).unwrap();
///
/// let report = provisioner.create(1).await.unwrap();
/// assert!(report.is_success());
/// assert_eq!(runner.namespaces().await.len(), 3);
/// # }
/// ```
pub struct Provisioner {
    config: Arc<ProvisionerConfig>,
    runner: Arc<dyn CommandRunner>,
    event_tx: Option<mpsc::Sender<ProvisionEvent>>,
}

impl Provisioner {
    /// Create a provisioner for a validated configuration
    ///
    /// # Errors
    /// Returns error if the configuration is invalid
    pub fn new(config: ProvisionerConfig, runner: Arc<dyn CommandRunner>) -> Result<Self> {
        config.validate()?;

        let collisions = config
            .naming
            .collisions(&config.ranges, config.interfaces_per_namespace);
        if let Some(first) = collisions.first() {
            tracing::warn!(
                naming = %config.naming,
                collisions = collisions.len(),
                example = %first.name,
                "Interface names are ambiguous for this workload; consider the delimited scheme"
            );
        }

        Ok(Self {
            config: Arc::new(config),
            runner,
            event_tx: None,
        })
    }

    /// Add event channel for emitting events
    ///
    /// Events will be sent to this channel as they occur.
    #[must_use]
    pub fn with_events(mut self, tx: mpsc::Sender<ProvisionEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// Get the configuration
    #[must_use]
    pub fn config(&self) -> &ProvisionerConfig {
        &self.config
    }

    /// Create every namespace of the workload
    ///
    /// # Errors
    /// Returns error if `workers` is zero or a worker panicked
    pub async fn create(&self, workers: usize) -> Result<BatchReport> {
        self.run(Mode::Create, workers).await
    }

    /// Delete every namespace of the workload
    ///
    /// # Errors
    /// Returns error if `workers` is zero or a worker panicked
    pub async fn delete(&self, workers: usize) -> Result<BatchReport> {
        self.run(Mode::Delete, workers).await
    }

    /// Run a batch in `mode` with up to `workers` ranges in flight
    ///
    /// [`Mode::Status`] issues no commands and returns empty range reports.
    ///
    /// # Errors
    /// Returns error if `workers` is zero or a worker panicked
    pub async fn run(&self, mode: Mode, workers: usize) -> Result<BatchReport> {
        let pool = WorkerPool::new(workers)?;
        let ranges = self.config.ranges.clone();

        tracing::info!(
            %mode,
            ranges = ranges.len(),
            namespaces = self.config.total_namespaces(),
            workers,
            parallelism = pool.effective_parallelism(ranges.len()),
            "Starting batch"
        );

        let worker = RangeWorker {
            config: Arc::clone(&self.config),
            runner: Arc::clone(&self.runner),
            event_tx: self.event_tx.clone(),
        };

        let ranges = pool
            .run(ranges, move |range| {
                let worker = worker.clone();
                async move { worker.process(mode, range).await }
            })
            .await?;

        let report = BatchReport { mode, ranges };

        if report.is_success() {
            tracing::info!(summary = %report, "Batch complete");
        } else {
            tracing::warn!(summary = %report, "Batch complete with failures");
        }

        Ok(report)
    }
}

impl std::fmt::Debug for Provisioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provisioner")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Everything a worker needs to process one range
#[derive(Clone)]
struct RangeWorker {
    config: Arc<ProvisionerConfig>,
    runner: Arc<dyn CommandRunner>,
    event_tx: Option<mpsc::Sender<ProvisionEvent>>,
}

impl RangeWorker {
    async fn process(self, mode: Mode, range: IdRange) -> RangeReport {
        let preamble = RangePlan::preamble(mode, &self.config);
        let mut report = RangeReport::new(range);

        self.emit(ProvisionEvent::RangeStarted {
            mode,
            range,
            timestamp: SystemTime::now(),
        })
        .await;

        'range: {
            for command in &preamble {
                if !self.execute(&mut report, command).await {
                    break 'range;
                }
            }

            for ns in RangePlan::namespace_plans(mode, range, &self.config) {
                for command in &ns.commands {
                    if !self.execute(&mut report, command).await {
                        break 'range;
                    }
                }

                report.namespaces += 1;
                let event = match mode {
                    Mode::Delete => ProvisionEvent::NamespaceDeleted {
                        range,
                        namespace: ns.namespace,
                        timestamp: SystemTime::now(),
                    },
                    Mode::Create | Mode::Status => ProvisionEvent::NamespaceCreated {
                        range,
                        namespace: ns.namespace,
                        timestamp: SystemTime::now(),
                    },
                };
                self.emit(event).await;
            }
        }

        let failures = report.failures().count();
        self.emit(ProvisionEvent::RangeFinished {
            mode,
            range,
            commands: report.records.len(),
            failures,
            aborted: report.aborted,
            timestamp: SystemTime::now(),
        })
        .await;

        report
    }

    /// Run one command and record it; `false` means stop the range
    async fn execute(&self, report: &mut RangeReport, command: &NetCommand) -> bool {
        let rendered = command.to_string();

        self.emit(ProvisionEvent::CommandStarted {
            range: report.range,
            command: rendered.clone(),
            timestamp: SystemTime::now(),
        })
        .await;

        let (outcome, status, message) = match self.runner.run(command).await {
            Ok(output) if output.is_success() => (CommandOutcome::Succeeded, None, String::new()),
            Ok(output) => {
                let stderr = output.stderr_text();
                (
                    CommandOutcome::Failed {
                        status: output.status,
                        stderr: stderr.clone(),
                        tolerated: command.failure_tolerated(),
                    },
                    output.status,
                    stderr,
                )
            }
            Err(e) => (
                CommandOutcome::SpawnFailed {
                    message: e.to_string(),
                },
                None,
                e.to_string(),
            ),
        };

        let record = CommandRecord {
            command: rendered,
            outcome,
        };

        if record.is_fatal() {
            self.emit(ProvisionEvent::CommandFailed {
                range: report.range,
                command: record.command.clone(),
                status,
                message,
                timestamp: SystemTime::now(),
            })
            .await;
        } else if record.is_failure() {
            tracing::debug!(command = %record.command, "Ignoring expected failure");
        }

        let stop = record.is_fatal() && self.config.failure_policy == FailurePolicy::Strict;
        report.records.push(record);

        if stop {
            report.aborted = true;
            tracing::warn!(range = %report.range, "Stopping range after failed command");
        }

        !stop
    }

    async fn emit(&self, event: ProvisionEvent) {
        event.emit_trace();
        if let Some(ref tx) = self.event_tx {
            let _ = tx.send(event).await;
        }
    }
}
