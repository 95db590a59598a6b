//! Provisioning events with structured tracing

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;

use crate::{IdRange, Mode};

/// Events emitted while a batch is processed
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProvisionEvent {
    /// A worker picked up a range
    RangeStarted {
        /// Batch mode
        mode: Mode,
        /// Range being processed
        range: IdRange,
        /// Timestamp
        #[serde(with = "systemtime_serde")]
        timestamp: SystemTime,
    },

    /// A command is about to be executed
    CommandStarted {
        /// Range the command belongs to
        range: IdRange,
        /// Rendered command line
        command: String,
        /// Timestamp
        #[serde(with = "systemtime_serde")]
        timestamp: SystemTime,
    },

    /// A command exited unsuccessfully or could not be spawned
    CommandFailed {
        /// Range the command belongs to
        range: IdRange,
        /// Rendered command line
        command: String,
        /// Exit code, if the process ran and exited normally
        status: Option<i32>,
        /// Captured stderr or spawn error
        message: String,
        /// Timestamp
        #[serde(with = "systemtime_serde")]
        timestamp: SystemTime,
    },

    /// All create commands for a namespace were issued
    NamespaceCreated {
        /// Range the namespace belongs to
        range: IdRange,
        /// Namespace name
        namespace: String,
        /// Timestamp
        #[serde(with = "systemtime_serde")]
        timestamp: SystemTime,
    },

    /// All delete commands for a namespace were issued
    NamespaceDeleted {
        /// Range the namespace belongs to
        range: IdRange,
        /// Namespace name
        namespace: String,
        /// Timestamp
        #[serde(with = "systemtime_serde")]
        timestamp: SystemTime,
    },

    /// A worker finished a range
    RangeFinished {
        /// Batch mode
        mode: Mode,
        /// Range that was processed
        range: IdRange,
        /// Commands executed
        commands: usize,
        /// Commands that failed
        failures: usize,
        /// Whether the range stopped early
        aborted: bool,
        /// Timestamp
        #[serde(with = "systemtime_serde")]
        timestamp: SystemTime,
    },
}

impl ProvisionEvent {
    /// Get the range from any event
    #[must_use]
    pub const fn range(&self) -> &IdRange {
        match self {
            Self::RangeStarted { range, .. }
            | Self::CommandStarted { range, .. }
            | Self::CommandFailed { range, .. }
            | Self::NamespaceCreated { range, .. }
            | Self::NamespaceDeleted { range, .. }
            | Self::RangeFinished { range, .. } => range,
        }
    }

    /// Get the timestamp from any event
    #[must_use]
    pub const fn timestamp(&self) -> SystemTime {
        match self {
            Self::RangeStarted { timestamp, .. }
            | Self::CommandStarted { timestamp, .. }
            | Self::CommandFailed { timestamp, .. }
            | Self::NamespaceCreated { timestamp, .. }
            | Self::NamespaceDeleted { timestamp, .. }
            | Self::RangeFinished { timestamp, .. } => *timestamp,
        }
    }

    /// Check if this is a critical event
    #[must_use]
    pub const fn is_critical(&self) -> bool {
        matches!(
            self,
            Self::CommandFailed { .. } | Self::RangeFinished { aborted: true, .. }
        )
    }

    /// Emit structured tracing event
    pub fn emit_trace(&self) {
        match self {
            Self::RangeStarted { mode, range, .. } => {
                tracing::debug!(
                    %mode,
                    %range,
                    event = "range_started",
                    "Range started"
                );
            }
            Self::CommandStarted { range, command, .. } => {
                tracing::debug!(
                    %range,
                    %command,
                    event = "command_started",
                    "Executing command"
                );
            }
            Self::CommandFailed {
                range,
                command,
                status,
                message,
                ..
            } => {
                tracing::warn!(
                    %range,
                    %command,
                    status = ?status,
                    message = %message,
                    event = "command_failed",
                    "Command failed"
                );
            }
            Self::NamespaceCreated {
                range, namespace, ..
            } => {
                tracing::debug!(
                    %range,
                    %namespace,
                    event = "namespace_created",
                    "Namespace created"
                );
            }
            Self::NamespaceDeleted {
                range, namespace, ..
            } => {
                tracing::debug!(
                    %range,
                    %namespace,
                    event = "namespace_deleted",
                    "Namespace deleted"
                );
            }
            Self::RangeFinished {
                mode,
                range,
                commands,
                failures,
                aborted,
                ..
            } => {
                if *aborted {
                    tracing::error!(
                        %mode,
                        %range,
                        commands,
                        failures,
                        event = "range_aborted",
                        "Range aborted"
                    );
                } else {
                    tracing::info!(
                        %mode,
                        %range,
                        commands,
                        failures,
                        event = "range_finished",
                        "Range finished"
                    );
                }
            }
        }
    }
}

impl fmt::Display for ProvisionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RangeStarted { mode, range, .. } => match mode {
                Mode::Create => write!(f, "Creating namespaces: {range}"),
                Mode::Delete => write!(f, "Deleting namespaces: {range}"),
                Mode::Status => write!(f, "Checking namespaces: {range}"),
            },
            Self::CommandStarted { command, .. } => write!(f, "Exec: {command}"),
            Self::CommandFailed {
                command, status, ..
            } => match status {
                Some(code) => write!(f, "Failed: {command} (exit code {code})"),
                None => write!(f, "Failed: {command}"),
            },
            Self::NamespaceCreated { namespace, .. } => {
                write!(f, "namespace: {namespace} created")
            }
            Self::NamespaceDeleted { namespace, .. } => {
                write!(f, "namespace: {namespace} deleted")
            }
            Self::RangeFinished {
                range,
                commands,
                failures,
                aborted,
                ..
            } => {
                write!(f, "Range {range} done: {commands} commands, {failures} failed")?;
                if *aborted {
                    write!(f, " (aborted)")?;
                }
                Ok(())
            }
        }
    }
}

// Custom SystemTime serialization
mod systemtime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::{SystemTime, UNIX_EPOCH};

    pub fn serialize<S>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let since_epoch = time
            .duration_since(UNIX_EPOCH)
            .map_err(serde::ser::Error::custom)?;
        serializer.serialize_u64(since_epoch.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SystemTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(UNIX_EPOCH + std::time::Duration::from_secs(secs))
    }
}
