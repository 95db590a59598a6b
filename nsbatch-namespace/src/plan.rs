//! Command sequences for one range
//!
//! Workers generate one [`NamespacePlan`] at a time so memory stays flat
//! for wide ranges. [`RangePlan`] collects a whole range for inspection.

use nsbatch_core::{IdRange, Mode, NamespaceId};

use crate::command::NetCommand;
use crate::config::ProvisionerConfig;

/// Commands for a single namespace, in execution order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespacePlan {
    /// Namespace ID
    pub id: NamespaceId,
    /// Namespace name
    pub namespace: String,
    /// Commands touching this namespace
    pub commands: Vec<NetCommand>,
}

/// Every command a worker runs for one range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangePlan {
    /// Batch mode
    pub mode: Mode,
    /// Range covered by the plan
    pub range: IdRange,
    /// Commands run once before the first namespace
    pub preamble: Vec<NetCommand>,
    /// Per-namespace commands in increasing ID order
    pub namespaces: Vec<NamespacePlan>,
}

impl NamespacePlan {
    /// Commands for namespace `id` under `mode`, `None` for [`Mode::Status`]
    #[must_use]
    pub fn build(mode: Mode, id: NamespaceId, config: &ProvisionerConfig) -> Option<Self> {
        match mode {
            Mode::Create => Some(create_namespace(id, config)),
            Mode::Delete => Some(delete_namespace(id, config)),
            Mode::Status => None,
        }
    }
}

impl RangePlan {
    /// Build the plan for `range` under `mode`
    ///
    /// [`Mode::Status`] never runs commands and yields an empty plan.
    #[must_use]
    pub fn build(mode: Mode, range: IdRange, config: &ProvisionerConfig) -> Self {
        Self {
            mode,
            range,
            preamble: Self::preamble(mode, config),
            namespaces: Self::namespace_plans(mode, range, config).collect(),
        }
    }

    /// Commands run once per range before the first namespace
    #[must_use]
    pub fn preamble(mode: Mode, config: &ProvisionerConfig) -> Vec<NetCommand> {
        match mode {
            Mode::Create => vec![NetCommand::LoadModule {
                module: config.conntrack_module.clone(),
            }],
            Mode::Delete | Mode::Status => Vec::new(),
        }
    }

    /// Per-namespace plans in increasing ID order, generated on demand
    pub fn namespace_plans(
        mode: Mode,
        range: IdRange,
        config: &ProvisionerConfig,
    ) -> impl Iterator<Item = NamespacePlan> + '_ {
        range
            .ids()
            .take_while(move |_| mode.is_mutating())
            .filter_map(move |id| NamespacePlan::build(mode, id, config))
    }

    /// All commands in execution order
    pub fn commands(&self) -> impl Iterator<Item = &NetCommand> {
        self.preamble
            .iter()
            .chain(self.namespaces.iter().flat_map(|ns| ns.commands.iter()))
    }

    /// Number of commands in the plan
    #[must_use]
    pub fn command_count(&self) -> usize {
        self.preamble.len()
            + self
                .namespaces
                .iter()
                .map(|ns| ns.commands.len())
                .sum::<usize>()
    }
}

fn create_namespace(id: NamespaceId, config: &ProvisionerConfig) -> NamespacePlan {
    let namespace = config.naming.namespace_name(id);
    let mut commands = vec![NetCommand::AddNamespace {
        namespace: namespace.clone(),
    }];

    for intf in 0..config.interfaces_per_namespace {
        let link = config.naming.interface_name(id, intf);
        commands.push(NetCommand::AddDummyLink { link: link.clone() });
        commands.push(NetCommand::MoveLink {
            link: link.clone(),
            namespace: namespace.clone(),
        });
        commands.push(NetCommand::LinkUp {
            namespace: namespace.clone(),
            link,
        });
    }

    NamespacePlan {
        id,
        namespace,
        commands,
    }
}

fn delete_namespace(id: NamespaceId, config: &ProvisionerConfig) -> NamespacePlan {
    let namespace = config.naming.namespace_name(id);
    let mut commands = vec![NetCommand::DeleteNamespace {
        namespace: namespace.clone(),
    }];

    commands.extend(
        (0..config.interfaces_per_namespace).map(|intf| NetCommand::DeleteLink {
            link: config.naming.interface_name(id, intf),
        }),
    );

    NamespacePlan {
        id,
        namespace,
        commands,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nsbatch_core::NamingScheme;

    fn rendered(plan: &RangePlan) -> Vec<String> {
        plan.commands().map(ToString::to_string).collect()
    }

    #[test]
    fn test_create_plan_order() {
        let config = ProvisionerConfig::new();
        let plan = RangePlan::build(Mode::Create, IdRange::new(0, 2).unwrap(), &config);

        assert_eq!(
            rendered(&plan),
            vec![
                "modprobe ip_conntrack",
                "ip netns add test-router-0",
                "ip link add test-eth-00 type dummy",
                "ip link set test-eth-00 netns test-router-0",
                "ip netns exec test-router-0 ifconfig test-eth-00 up",
                "ip link add test-eth-01 type dummy",
                "ip link set test-eth-01 netns test-router-0",
                "ip netns exec test-router-0 ifconfig test-eth-01 up",
                "ip netns add test-router-1",
                "ip link add test-eth-10 type dummy",
                "ip link set test-eth-10 netns test-router-1",
                "ip netns exec test-router-1 ifconfig test-eth-10 up",
                "ip link add test-eth-11 type dummy",
                "ip link set test-eth-11 netns test-router-1",
                "ip netns exec test-router-1 ifconfig test-eth-11 up",
            ]
        );
        assert_eq!(plan.command_count(), 15);
    }

    #[test]
    fn test_delete_plan_order() {
        let config = ProvisionerConfig::new().with_interfaces(3);
        let plan = RangePlan::build(Mode::Delete, IdRange::new(7, 8).unwrap(), &config);

        assert!(plan.preamble.is_empty());
        assert_eq!(
            rendered(&plan),
            vec![
                "ip netns del test-router-7",
                "ip link del test-eth-70",
                "ip link del test-eth-71",
                "ip link del test-eth-72",
            ]
        );
    }

    #[test]
    fn test_delimited_plan() {
        let config = ProvisionerConfig::new()
            .with_interfaces(1)
            .with_naming(NamingScheme::Delimited);
        let plan = RangePlan::build(Mode::Create, IdRange::new(12, 13).unwrap(), &config);

        assert!(rendered(&plan).contains(&"ip link add test-eth-12-0 type dummy".to_string()));
    }

    #[test]
    fn test_empty_range_still_loads_module() {
        let config = ProvisionerConfig::new();
        let plan = RangePlan::build(Mode::Create, IdRange::new(4, 4).unwrap(), &config);

        assert!(plan.namespaces.is_empty());
        assert_eq!(rendered(&plan), vec!["modprobe ip_conntrack"]);
    }

    #[test]
    fn test_status_plan_is_empty() {
        let config = ProvisionerConfig::new();
        let plan = RangePlan::build(Mode::Status, IdRange::new(0, 100).unwrap(), &config);
        assert_eq!(plan.command_count(), 0);
    }

    #[test]
    fn test_namespace_ids_increasing() {
        let config = ProvisionerConfig::new().with_interfaces(0);
        let plan = RangePlan::build(Mode::Create, IdRange::new(40, 45).unwrap(), &config);

        let ids: Vec<u32> = plan.namespaces.iter().map(|ns| ns.id.as_raw()).collect();
        assert_eq!(ids, vec![40, 41, 42, 43, 44]);
        assert!(plan.namespaces.iter().all(|ns| ns.commands.len() == 1));
    }

    #[test]
    fn test_namespace_plans_are_lazy() {
        let config = ProvisionerConfig::new();
        let wide = IdRange::new(0, u32::MAX).unwrap();

        let first: Vec<NamespacePlan> = RangePlan::namespace_plans(Mode::Delete, wide, &config)
            .take(2)
            .collect();
        assert_eq!(first.len(), 2);
        assert_eq!(first[1].namespace, "test-router-1");

        assert!(
            RangePlan::namespace_plans(Mode::Status, wide, &config)
                .next()
                .is_none()
        );
    }
}
