//! Command runner trait for pluggable execution
//!
//! - [`SystemRunner`] spawns the real programs
//! - [`DryRunRunner`] executes nothing and reports success
//! - [`MockRunner`] simulates the kernel's namespace and link tables for tests

use async_trait::async_trait;
use bytes::Bytes;
use nsbatch_core::{Error, Result};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::command::NetCommand;

/// Captured result of a finished command
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    /// Exit code, `None` if the process was killed by a signal
    pub status: Option<i32>,
    /// Captured standard output
    pub stdout: Bytes,
    /// Captured standard error
    pub stderr: Bytes,
}

impl CommandOutput {
    /// Output of a command that exited with code 0
    #[must_use]
    pub const fn success() -> Self {
        Self {
            status: Some(0),
            stdout: Bytes::new(),
            stderr: Bytes::new(),
        }
    }

    /// Output of a command that exited with `code` and wrote `stderr`
    #[must_use]
    pub fn failure(code: i32, stderr: impl Into<Bytes>) -> Self {
        Self {
            status: Some(code),
            stdout: Bytes::new(),
            stderr: stderr.into(),
        }
    }

    /// Check if the command exited with code 0
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.status, Some(0))
    }

    /// Standard error as trimmed text
    #[must_use]
    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }
}

/// Trait for command execution backends
///
/// # Thread Safety
/// All implementations must be `Send + Sync`; one runner is shared by every
/// worker.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a command to completion
    ///
    /// A command that runs and exits non-zero is `Ok` with a failing
    /// [`CommandOutput`].
    ///
    /// # Errors
    /// Returns error only if the command could not be started
    async fn run(&self, command: &NetCommand) -> Result<CommandOutput>;
}

/// Runs commands on the host
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
    /// Create a new system runner
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, command: &NetCommand) -> Result<CommandOutput> {
        let output = spawn_and_wait(command.program(), &command.args())
            .await
            .map_err(|e| Error::Command {
                command: command.to_string(),
                message: e.to_string(),
            })?;

        tracing::trace!(
            command = %command,
            status = ?output.status,
            "Command exited"
        );

        Ok(output)
    }
}

/// Run a program with stdin closed and capture its exit code and output
async fn spawn_and_wait(program: &str, args: &[&str]) -> std::io::Result<CommandOutput> {
    let output = tokio::process::Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .await?;

    Ok(CommandOutput {
        status: output.status.code(),
        stdout: Bytes::from(output.stdout),
        stderr: Bytes::from(output.stderr),
    })
}

/// Reports every command as successful without running it
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunRunner;

impl DryRunRunner {
    /// Create a new dry-run runner
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for DryRunRunner {
    async fn run(&self, command: &NetCommand) -> Result<CommandOutput> {
        tracing::trace!(command = %command, "Dry run: skipped");
        Ok(CommandOutput::success())
    }
}

/// Mock runner for testing (doesn't touch the kernel)
///
/// Keeps an in-memory model of host links and named namespaces and applies
/// each command to it the way `ip` would, including the usual failures:
/// adding a namespace twice, deleting a missing one, or deleting a link that
/// already left the host namespace.
///
/// # Example
/// ```
/// use nsbatch_namespace::{CommandRunner, MockRunner, NetCommand};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let runner = MockRunner::new();
/// let add = NetCommand::AddNamespace { namespace: "test-router-0".into() };
///
/// assert!(runner.run(&add).await.unwrap().is_success());
/// assert!(!runner.run(&add).await.unwrap().is_success());
/// assert!(runner.namespaces().await.contains_key("test-router-0"));
/// # }
/// ```
#[derive(Clone)]
pub struct MockRunner {
    state: Arc<Mutex<MockState>>,
    failing: Arc<HashSet<String>>,
    unavailable: Arc<HashSet<&'static str>>,
    delay: Duration,
}

#[derive(Default)]
struct MockState {
    calls: Vec<NetCommand>,
    host_links: BTreeSet<String>,
    namespaces: BTreeMap<String, BTreeMap<String, bool>>,
    modules: BTreeSet<String>,
    in_flight: usize,
    peak_in_flight: usize,
}

impl MockState {
    fn apply(&mut self, command: &NetCommand) -> CommandOutput {
        match command {
            NetCommand::LoadModule { module } => {
                self.modules.insert(module.clone());
                CommandOutput::success()
            }
            NetCommand::AddNamespace { namespace } => {
                if self.namespaces.contains_key(namespace) {
                    return CommandOutput::failure(
                        1,
                        format!("Cannot create namespace file \"/run/netns/{namespace}\": File exists"),
                    );
                }
                self.namespaces.insert(namespace.clone(), BTreeMap::new());
                CommandOutput::success()
            }
            NetCommand::DeleteNamespace { namespace } => {
                if self.namespaces.remove(namespace).is_none() {
                    return CommandOutput::failure(
                        1,
                        format!("Cannot remove namespace file \"/run/netns/{namespace}\": No such file or directory"),
                    );
                }
                CommandOutput::success()
            }
            NetCommand::AddDummyLink { link } => {
                if !self.host_links.insert(link.clone()) {
                    return CommandOutput::failure(2, "RTNETLINK answers: File exists");
                }
                CommandOutput::success()
            }
            NetCommand::MoveLink { link, namespace } => {
                if !self.namespaces.contains_key(namespace) {
                    return CommandOutput::failure(
                        255,
                        format!("Invalid \"netns\" value \"{namespace}\""),
                    );
                }
                if !self.host_links.remove(link) {
                    return CommandOutput::failure(1, format!("Cannot find device \"{link}\""));
                }
                if let Some(links) = self.namespaces.get_mut(namespace) {
                    links.insert(link.clone(), false);
                }
                CommandOutput::success()
            }
            NetCommand::LinkUp { namespace, link } => {
                match self
                    .namespaces
                    .get_mut(namespace)
                    .and_then(|links| links.get_mut(link))
                {
                    Some(up) => {
                        *up = true;
                        CommandOutput::success()
                    }
                    None => CommandOutput::failure(
                        1,
                        format!("{link}: ERROR while getting interface flags: No such device"),
                    ),
                }
            }
            NetCommand::DeleteLink { link } => {
                if !self.host_links.remove(link) {
                    return CommandOutput::failure(1, format!("Cannot find device \"{link}\""));
                }
                CommandOutput::success()
            }
            NetCommand::ListLinks { namespace } => {
                let Some(links) = self.namespaces.get(namespace) else {
                    return CommandOutput::failure(
                        1,
                        format!("Cannot open network namespace \"{namespace}\": No such file or directory"),
                    );
                };

                let mut listing = String::from(
                    "1: lo: <LOOPBACK> mtu 65536 qdisc noop state DOWN mode DEFAULT\\    link/loopback 00:00:00:00:00:00\n",
                );
                for (index, (link, up)) in links.iter().enumerate() {
                    let flags = if *up {
                        "BROADCAST,NOARP,UP,LOWER_UP"
                    } else {
                        "BROADCAST,NOARP"
                    };
                    listing.push_str(&format!(
                        "{}: {link}: <{flags}> mtu 1500 qdisc noqueue state UNKNOWN mode DEFAULT\\    link/ether 00:00:00:00:00:00\n",
                        index + 2
                    ));
                }

                CommandOutput {
                    status: Some(0),
                    stdout: Bytes::from(listing),
                    stderr: Bytes::new(),
                }
            }
        }
    }
}

impl MockRunner {
    /// Create a new mock runner with empty kernel tables
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
            failing: Arc::new(HashSet::new()),
            unavailable: Arc::new(HashSet::new()),
            delay: Duration::ZERO,
        }
    }

    /// Make every command rendering to `command` exit with code 1
    ///
    /// The command is recorded but not applied to the model.
    #[must_use]
    pub fn failing(mut self, command: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.failing).insert(command.into());
        self
    }

    /// Make every command using `program` fail to spawn
    #[must_use]
    pub fn without_program(mut self, program: &'static str) -> Self {
        Arc::make_mut(&mut self.unavailable).insert(program);
        self
    }

    /// Sleep this long inside every command
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Every command received, in arrival order
    pub async fn calls(&self) -> Vec<NetCommand> {
        self.state.lock().await.calls.clone()
    }

    /// Every command received, rendered as command lines
    pub async fn rendered_calls(&self) -> Vec<String> {
        self.calls()
            .await
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    /// Get the number of commands received
    pub async fn call_count(&self) -> usize {
        self.state.lock().await.calls.len()
    }

    /// Named namespaces and their links, with each link's up flag
    pub async fn namespaces(&self) -> BTreeMap<String, BTreeMap<String, bool>> {
        self.state.lock().await.namespaces.clone()
    }

    /// Links still in the host namespace
    pub async fn host_links(&self) -> BTreeSet<String> {
        self.state.lock().await.host_links.clone()
    }

    /// Modules loaded so far
    pub async fn loaded_modules(&self) -> BTreeSet<String> {
        self.state.lock().await.modules.clone()
    }

    /// Highest number of commands that were running at the same time
    pub async fn peak_concurrency(&self) -> usize {
        self.state.lock().await.peak_in_flight
    }
}

impl Default for MockRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockRunner")
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn run(&self, command: &NetCommand) -> Result<CommandOutput> {
        {
            let mut state = self.state.lock().await;
            state.calls.push(command.clone());
            state.in_flight += 1;
            state.peak_in_flight = state.peak_in_flight.max(state.in_flight);
        }

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let mut state = self.state.lock().await;
        state.in_flight -= 1;

        if self.unavailable.contains(command.program()) {
            return Err(Error::Command {
                command: command.to_string(),
                message: "No such file or directory (os error 2)".to_string(),
            });
        }

        let rendered = command.to_string();
        if self.failing.contains(&rendered) {
            tracing::debug!(command = %rendered, "Mock: forced failure");
            return Ok(CommandOutput::failure(1, "mock failure"));
        }

        let output = state.apply(command);
        tracing::debug!(
            command = %rendered,
            status = ?output.status,
            "Mock: applied command"
        );

        Ok(output)
    }
}
