//! Named namespace inventory
//!
//! `ip netns add` creates a bind-mount file per namespace under
//! `/run/netns`, so listing that directory is enough to tell which test
//! namespaces exist without entering any of them. Checking their
//! interfaces does require entering each one, see
//! [`StatusReport::check_links`].

use nsbatch_core::{IdRange, NamespaceId, NamingScheme, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::command::NetCommand;
use crate::config::ProvisionerConfig;
use crate::pool::WorkerPool;
use crate::runner::CommandRunner;

/// Directory where iproute2 keeps named namespaces
pub const NETNS_DIR: &str = "/run/netns";

/// Snapshot of the named namespaces in a netns directory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceInventory {
    names: BTreeSet<String>,
}

impl NamespaceInventory {
    /// Build an inventory from known names
    #[must_use]
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Scan a netns directory
    ///
    /// A missing directory means no namespace was ever created.
    ///
    /// # Errors
    /// Returns error if the directory exists but cannot be read
    pub async fn scan(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();

        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(dir = %dir.display(), "Netns directory missing");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        let mut names = BTreeSet::new();
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                names.insert(name.to_string());
            }
        }

        tracing::debug!(dir = %dir.display(), count = names.len(), "Scanned namespaces");
        Ok(Self { names })
    }

    /// All namespace names found
    #[must_use]
    pub const fn names(&self) -> &BTreeSet<String> {
        &self.names
    }

    /// IDs of namespaces that follow the test naming scheme
    pub fn test_namespaces(&self) -> impl Iterator<Item = NamespaceId> + '_ {
        self.names
            .iter()
            .filter_map(|name| NamingScheme::parse_namespace_name(name))
    }

    /// Compare the inventory with the namespaces a workload would create
    #[must_use]
    pub fn status(&self, config: &ProvisionerConfig) -> StatusReport {
        let expected: BTreeSet<NamespaceId> =
            config.ranges.iter().flat_map(IdRange::ids).collect();
        let found: BTreeSet<NamespaceId> = self.test_namespaces().collect();

        StatusReport {
            expected: expected.len(),
            present: expected.intersection(&found).copied().collect(),
            missing: expected.difference(&found).copied().collect(),
            unexpected: found.difference(&expected).copied().collect(),
            links: None,
        }
    }
}

/// How the live namespaces compare with a workload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    /// Namespaces the workload covers
    pub expected: usize,
    /// Covered namespaces that exist
    pub present: Vec<NamespaceId>,
    /// Covered namespaces that don't exist
    pub missing: Vec<NamespaceId>,
    /// Test namespaces outside every range
    pub unexpected: Vec<NamespaceId>,
    /// Present namespaces with missing or down interfaces, once checked
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<LinkIssue>>,
}

/// Interfaces of one namespace that don't match the workload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkIssue {
    /// Namespace ID
    pub namespace: NamespaceId,
    /// Expected interfaces that don't exist
    pub missing: Vec<String>,
    /// Expected interfaces that exist but are not up
    pub down: Vec<String>,
}

impl StatusReport {
    /// Check if every covered namespace exists
    ///
    /// Once links were checked, every interface must also exist and be up.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty() && self.links.as_ref().is_none_or(Vec::is_empty)
    }

    /// Check if no covered namespace exists
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.present.is_empty()
    }

    /// Inspect the interfaces of every present namespace
    ///
    /// Runs the read-only `ip -o link show` inside each namespace, with up
    /// to `workers` namespaces in flight, and records the ones whose
    /// interfaces are missing or down.
    ///
    /// # Errors
    /// Returns error if `workers` is zero or a listing could not be started
    pub async fn check_links(
        &mut self,
        config: &ProvisionerConfig,
        runner: Arc<dyn CommandRunner>,
        workers: usize,
    ) -> Result<()> {
        let pool = WorkerPool::new(workers)?;
        let naming = config.naming;
        let interfaces = config.interfaces_per_namespace;

        let results = pool
            .run(self.present.clone(), move |id| {
                let runner = Arc::clone(&runner);
                async move { inspect_links(runner.as_ref(), naming, interfaces, id).await }
            })
            .await?;

        let mut issues = Vec::new();
        for result in results {
            issues.extend(result?);
        }

        tracing::debug!(
            checked = self.present.len(),
            issues = issues.len(),
            "Checked namespace links"
        );
        self.links = Some(issues);
        Ok(())
    }
}

async fn inspect_links(
    runner: &dyn CommandRunner,
    naming: NamingScheme,
    interfaces: u32,
    id: NamespaceId,
) -> Result<Option<LinkIssue>> {
    let namespace = naming.namespace_name(id);
    let output = runner.run(&NetCommand::ListLinks { namespace }).await?;

    let found = if output.is_success() {
        parse_link_listing(&String::from_utf8_lossy(&output.stdout))
    } else {
        tracing::warn!(
            namespace = %naming.namespace_name(id),
            stderr = %output.stderr_text(),
            "Cannot list links"
        );
        BTreeMap::new()
    };

    let mut missing = Vec::new();
    let mut down = Vec::new();
    for intf in 0..interfaces {
        let name = naming.interface_name(id, intf);
        match found.get(&name) {
            None => missing.push(name),
            Some(false) => down.push(name),
            Some(true) => {}
        }
    }

    if missing.is_empty() && down.is_empty() {
        return Ok(None);
    }
    Ok(Some(LinkIssue {
        namespace: id,
        missing,
        down,
    }))
}

/// Parse `ip -o link show` output into link name and whether it is up
///
/// Peer suffixes such as `eth0@if5` are dropped from the name.
#[must_use]
pub fn parse_link_listing(listing: &str) -> BTreeMap<String, bool> {
    listing
        .lines()
        .filter_map(|line| {
            let mut fields = line.splitn(3, ": ");
            let _index = fields.next()?;
            let name = fields.next()?.split('@').next()?;
            let flags = fields.next()?.strip_prefix('<')?.split('>').next()?;
            let up = flags.split(',').any(|flag| flag == "UP");
            Some((name.to_string(), up))
        })
        .collect()
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "status: {} expected, {} present, {} missing, {} unexpected",
            self.expected,
            self.present.len(),
            self.missing.len(),
            self.unexpected.len()
        )?;

        if let Some(issues) = &self.links {
            write!(f, ", {} with link problems", issues.len())?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(ranges: &[(u32, u32)]) -> ProvisionerConfig {
        ProvisionerConfig::new().with_ranges(
            ranges
                .iter()
                .map(|&(lo, hi)| IdRange::new(lo, hi).unwrap())
                .collect(),
        )
    }

    fn ids(raw: &[u32]) -> Vec<NamespaceId> {
        raw.iter().copied().map(NamespaceId::from_raw).collect()
    }

    #[test]
    fn test_status_against_workload() {
        let inventory = NamespaceInventory::from_names([
            "test-router-0",
            "test-router-2",
            "test-router-50",
            "prod-router-1",
            "test-router-x",
        ]);

        let status = inventory.status(&config(&[(0, 3)]));
        assert_eq!(status.expected, 3);
        assert_eq!(status.present, ids(&[0, 2]));
        assert_eq!(status.missing, ids(&[1]));
        assert_eq!(status.unexpected, ids(&[50]));
        assert!(!status.is_complete());
        assert!(!status.is_clean());
        assert_eq!(
            status.to_string(),
            "status: 3 expected, 2 present, 1 missing, 1 unexpected"
        );
    }

    #[test]
    fn test_empty_inventory_is_clean() {
        let status = NamespaceInventory::default().status(&config(&[(0, 3), (5, 6)]));
        assert!(status.is_clean());
        assert_eq!(status.missing, ids(&[0, 1, 2, 5]));
    }

    #[tokio::test]
    async fn test_scan_missing_dir() {
        let dir = std::env::temp_dir().join(format!("nsbatch-missing-{}", std::process::id()));
        let inventory = NamespaceInventory::scan(&dir).await.unwrap();
        assert!(inventory.names().is_empty());
    }

    #[tokio::test]
    async fn test_scan_directory() {
        let dir = std::env::temp_dir().join(format!("nsbatch-scan-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        for name in ["test-router-1", "test-router-7", "other"] {
            tokio::fs::write(dir.join(name), b"").await.unwrap();
        }

        let inventory = NamespaceInventory::scan(&dir).await.unwrap();
        tokio::fs::remove_dir_all(&dir).await.unwrap();

        assert_eq!(inventory.names().len(), 3);
        assert_eq!(inventory.test_namespaces().collect::<Vec<_>>(), ids(&[1, 7]));
    }

    #[test]
    fn test_parse_link_listing() {
        let listing = "1: lo: <LOOPBACK,UP,LOWER_UP> mtu 65536 qdisc noqueue state UNKNOWN\\    link/loopback 00:00:00:00:00:00\n\
                       2: test-eth-30: <BROADCAST,NOARP,UP,LOWER_UP> mtu 1500 qdisc noqueue\\    link/ether 5e:1a:00:00:00:01\n\
                       3: test-eth-31: <BROADCAST,NOARP> mtu 1500 qdisc noop state DOWN\\    link/ether 5e:1a:00:00:00:02\n\
                       4: veth0@if7: <BROADCAST,MULTICAST,UP> mtu 1500\n\
                       garbage\n";

        let links = parse_link_listing(listing);
        assert_eq!(links.len(), 4);
        assert_eq!(links.get("test-eth-30"), Some(&true));
        assert_eq!(links.get("test-eth-31"), Some(&false));
        assert_eq!(links.get("veth0"), Some(&true));
        assert_eq!(links.get("lo"), Some(&true));
    }

    #[tokio::test]
    async fn test_check_links_reports_missing_and_down() {
        use crate::runner::MockRunner;

        let runner = MockRunner::new();
        let config = config(&[(0, 3)]);

        // ns 0 complete, ns 1 with one link left down, ns 2 absent
        let layout = [
            (0, [("test-eth-00", true), ("test-eth-01", true)]),
            (1, [("test-eth-10", true), ("test-eth-11", false)]),
        ];
        for (ns, links) in layout {
            let namespace = format!("test-router-{ns}");
            runner
                .run(&NetCommand::AddNamespace {
                    namespace: namespace.clone(),
                })
                .await
                .unwrap();
            for (link, up) in links {
                runner
                    .run(&NetCommand::AddDummyLink { link: link.into() })
                    .await
                    .unwrap();
                runner
                    .run(&NetCommand::MoveLink {
                        link: link.into(),
                        namespace: namespace.clone(),
                    })
                    .await
                    .unwrap();
                if up {
                    runner
                        .run(&NetCommand::LinkUp {
                            namespace: namespace.clone(),
                            link: link.into(),
                        })
                        .await
                        .unwrap();
                }
            }
        }

        let inventory = NamespaceInventory::from_names(runner.namespaces().await.into_keys());
        let mut status = inventory.status(&config);
        let before = runner.call_count().await;

        status
            .check_links(&config, Arc::new(runner.clone()), 2)
            .await
            .unwrap();

        // One listing per present namespace, nothing for the absent one
        assert_eq!(runner.call_count().await - before, 2);
        assert_eq!(
            status.links,
            Some(vec![LinkIssue {
                namespace: NamespaceId::from_raw(1),
                missing: Vec::new(),
                down: vec!["test-eth-11".to_string()],
            }])
        );
        assert!(!status.is_complete());
        assert_eq!(
            status.to_string(),
            "status: 3 expected, 2 present, 1 missing, 0 unexpected, 1 with link problems"
        );
    }

    #[tokio::test]
    async fn test_check_links_unreadable_namespace() {
        use crate::runner::MockRunner;

        // The directory lists a namespace the runner can't enter
        let config = config(&[(0, 1)]);
        let mut status = NamespaceInventory::from_names(["test-router-0"]).status(&config);

        status
            .check_links(&config, Arc::new(MockRunner::new()), 1)
            .await
            .unwrap();

        let issues = status.links.unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].missing, vec!["test-eth-00", "test-eth-01"]);
    }
}
