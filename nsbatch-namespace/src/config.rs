//! Provisioner configuration

use nsbatch_core::{Error, IdRange, MAX_INTERFACE_NAME_LEN, NamespaceId, NamingScheme, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Number of interfaces created per namespace unless configured otherwise
pub const DEFAULT_INTERFACES: u32 = 2;

/// Kernel module loaded before each range is created
pub const DEFAULT_CONNTRACK_MODULE: &str = "ip_conntrack";

/// What happens when an external command fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Record the failure and keep going
    #[default]
    BestEffort,
    /// Stop the current range at the first failure
    Strict,
}

/// Provisioner configuration
///
/// Every field has a default, so a JSON file only needs the keys it
/// overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProvisionerConfig {
    /// Disjoint ID ranges, one unit of parallel work each
    pub ranges: Vec<IdRange>,

    /// Dummy interfaces created in every namespace
    pub interfaces_per_namespace: u32,

    /// Interface naming scheme
    pub naming: NamingScheme,

    /// Reaction to failed commands
    pub failure_policy: FailurePolicy,

    /// Connection tracking module passed to `modprobe`
    pub conntrack_module: String,
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            ranges: default_ranges(),
            interfaces_per_namespace: DEFAULT_INTERFACES,
            naming: NamingScheme::Concatenated,
            failure_policy: FailurePolicy::BestEffort,
            conntrack_module: DEFAULT_CONNTRACK_MODULE.to_string(),
        }
    }
}

/// The historical workload: nine blocks of namespaces up to 900
///
/// Ranges are end-exclusive, so 100, 200, ... are never provisioned.
fn default_ranges() -> Vec<IdRange> {
    [
        (0, 100),
        (101, 200),
        (201, 300),
        (301, 400),
        (401, 500),
        (501, 600),
        (601, 700),
        (701, 800),
        (801, 900),
    ]
    .into_iter()
    .filter_map(|pair| IdRange::try_from(pair).ok())
    .collect()
}

impl ProvisionerConfig {
    /// Create a new configuration with the default workload
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a configuration from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "Loading configuration");

        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Replace the ranges
    #[must_use]
    pub fn with_ranges(mut self, ranges: Vec<IdRange>) -> Self {
        self.ranges = ranges;
        self
    }

    /// Set the number of interfaces per namespace
    #[must_use]
    pub const fn with_interfaces(mut self, count: u32) -> Self {
        self.interfaces_per_namespace = count;
        self
    }

    /// Set the interface naming scheme
    #[must_use]
    pub const fn with_naming(mut self, naming: NamingScheme) -> Self {
        self.naming = naming;
        self
    }

    /// Set the failure policy
    #[must_use]
    pub const fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Set the connection tracking module
    #[must_use]
    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.conntrack_module = module.into();
        self
    }

    /// Total number of namespaces across all ranges
    #[must_use]
    pub fn total_namespaces(&self) -> u64 {
        self.ranges.iter().map(|r| u64::from(r.len())).sum()
    }

    /// Check the configuration before any command runs
    ///
    /// # Errors
    /// Returns error if there are no ranges, two ranges overlap, an
    /// interface name would exceed the kernel limit, or the module name is
    /// unusable
    pub fn validate(&self) -> Result<()> {
        if self.ranges.is_empty() {
            return Err(Error::invalid_config("at least one range is required"));
        }

        for (i, a) in self.ranges.iter().enumerate() {
            if let Some(b) = self.ranges[i + 1..].iter().find(|b| a.overlaps(b)) {
                return Err(Error::invalid_config(format!(
                    "ranges {a} and {b} overlap"
                )));
            }
        }

        if let Some(name) = self.longest_interface_name()
            && name.len() > MAX_INTERFACE_NAME_LEN
        {
            return Err(Error::invalid_config(format!(
                "interface name '{name}' is longer than {MAX_INTERFACE_NAME_LEN} characters"
            )));
        }

        let module = self.conntrack_module.as_str();
        if module.is_empty() || module.chars().any(char::is_whitespace) {
            return Err(Error::invalid_config(format!(
                "invalid module name '{module}'"
            )));
        }

        Ok(())
    }

    /// Name of the last interface of the highest ID
    ///
    /// Names only grow with the ID and the interface index, so no other
    /// name in the workload is longer.
    fn longest_interface_name(&self) -> Option<String> {
        let last_intf = self.interfaces_per_namespace.checked_sub(1)?;
        let last_id = self
            .ranges
            .iter()
            .filter(|r| !r.is_empty())
            .map(|r| r.end() - 1)
            .max()?;

        Some(
            self.naming
                .interface_name(NamespaceId::from_raw(last_id), last_intf),
        )
    }
}
