//! Per-command, per-range and per-batch results

use nsbatch_core::{IdRange, Mode};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a single command ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum CommandOutcome {
    /// Exited with code 0
    Succeeded,
    /// Ran and exited unsuccessfully
    Failed {
        /// Exit code, `None` if killed by a signal
        status: Option<i32>,
        /// Captured standard error
        stderr: String,
        /// Expected failure that never counts against the batch
        tolerated: bool,
    },
    /// Could not be started
    SpawnFailed {
        /// Spawn error
        message: String,
    },
}

/// One executed command and its outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRecord {
    /// Rendered command line
    pub command: String,
    /// Outcome
    pub outcome: CommandOutcome,
}

impl CommandRecord {
    /// Check if the command did not succeed, tolerated or not
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        !matches!(self.outcome, CommandOutcome::Succeeded)
    }

    /// Check if the failure counts against the batch
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        match &self.outcome {
            CommandOutcome::Succeeded => false,
            CommandOutcome::Failed { tolerated, .. } => !*tolerated,
            CommandOutcome::SpawnFailed { .. } => true,
        }
    }
}

impl fmt::Display for CommandRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            CommandOutcome::Succeeded => write!(f, "{}: ok", self.command),
            CommandOutcome::Failed { status, stderr, .. } => {
                match status {
                    Some(code) => write!(f, "{}: exit code {code}", self.command)?,
                    None => write!(f, "{}: killed by signal", self.command)?,
                }
                if !stderr.is_empty() {
                    write!(f, " ({stderr})")?;
                }
                Ok(())
            }
            CommandOutcome::SpawnFailed { message } => {
                write!(f, "{}: could not start ({message})", self.command)
            }
        }
    }
}

/// Result of processing one range
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeReport {
    /// Range processed
    pub range: IdRange,
    /// Namespaces whose whole command sequence was issued
    pub namespaces: usize,
    /// Commands in execution order
    pub records: Vec<CommandRecord>,
    /// Whether the range stopped before its last command
    pub aborted: bool,
}

impl RangeReport {
    /// Empty report for a range about to be processed
    #[must_use]
    pub const fn new(range: IdRange) -> Self {
        Self {
            range,
            namespaces: 0,
            records: Vec::new(),
            aborted: false,
        }
    }

    /// Commands whose failure counts against the batch
    pub fn failures(&self) -> impl Iterator<Item = &CommandRecord> {
        self.records.iter().filter(|r| r.is_fatal())
    }

    /// Number of expected failures that were ignored
    #[must_use]
    pub fn tolerated_failures(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.is_failure() && !r.is_fatal())
            .count()
    }
}

/// Result of a whole batch, ranges in workload order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Batch mode
    pub mode: Mode,
    /// One report per configured range
    pub ranges: Vec<RangeReport>,
}

impl BatchReport {
    /// Total commands executed
    #[must_use]
    pub fn total_commands(&self) -> usize {
        self.ranges.iter().map(|r| r.records.len()).sum()
    }

    /// Total namespaces fully processed
    #[must_use]
    pub fn total_namespaces(&self) -> usize {
        self.ranges.iter().map(|r| r.namespaces).sum()
    }

    /// Failures that count against the batch, with their range
    pub fn failures(&self) -> impl Iterator<Item = (&IdRange, &CommandRecord)> {
        self.ranges
            .iter()
            .flat_map(|r| r.failures().map(move |rec| (&r.range, rec)))
    }

    /// Number of failures that count against the batch
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }

    /// Number of expected failures that were ignored
    #[must_use]
    pub fn tolerated_count(&self) -> usize {
        self.ranges.iter().map(RangeReport::tolerated_failures).sum()
    }

    /// Ranges that stopped early
    pub fn aborted_ranges(&self) -> impl Iterator<Item = &IdRange> {
        self.ranges.iter().filter(|r| r.aborted).map(|r| &r.range)
    }

    /// Check if every command succeeded or failed in a tolerated way
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failure_count() == 0 && self.aborted_ranges().next().is_none()
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} ranges, {} namespaces, {} commands, {} failed",
            self.mode,
            self.ranges.len(),
            self.total_namespaces(),
            self.total_commands(),
            self.failure_count()
        )?;

        let tolerated = self.tolerated_count();
        if tolerated > 0 {
            write!(f, ", {tolerated} tolerated")?;
        }

        let aborted = self.aborted_ranges().count();
        if aborted > 0 {
            write!(f, ", {aborted} ranges aborted")?;
        }

        Ok(())
    }
}
