//! Namespace and interface naming
//!
//! Names are parsed by other tooling, so the default scheme must stay
//! byte-for-byte stable: `test-router-<ns>` for namespaces and
//! `test-eth-<ns><intf>` for interfaces. The interface name is a plain
//! concatenation, which becomes ambiguous once interface indices reach two
//! digits (`ns=1, intf=23` and `ns=12, intf=3` both give `test-eth-123`).
//! [`NamingScheme::Delimited`] avoids that by inserting a dash.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::{IdRange, NamespaceId};

/// Prefix of every namespace created by nsbatch
pub const NAMESPACE_PREFIX: &str = "test-router-";

/// Prefix of every interface created by nsbatch
pub const INTERFACE_PREFIX: &str = "test-eth-";

/// Longest interface name the kernel accepts (`IFNAMSIZ` minus the NUL)
pub const MAX_INTERFACE_NAME_LEN: usize = 15;

/// How interface names are derived from a namespace ID and interface index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamingScheme {
    /// `test-eth-<ns><intf>`
    #[default]
    Concatenated,
    /// `test-eth-<ns>-<intf>`
    Delimited,
}

impl NamingScheme {
    /// Name of the namespace for an ID
    ///
    /// Identical for both schemes.
    #[must_use]
    pub fn namespace_name(self, id: NamespaceId) -> String {
        format!("{NAMESPACE_PREFIX}{id}")
    }

    /// Name of interface `intf` belonging to namespace `id`
    #[must_use]
    pub fn interface_name(self, id: NamespaceId, intf: u32) -> String {
        match self {
            Self::Concatenated => format!("{INTERFACE_PREFIX}{id}{intf}"),
            Self::Delimited => format!("{INTERFACE_PREFIX}{id}-{intf}"),
        }
    }

    /// Recover the namespace ID from a namespace name
    #[must_use]
    pub fn parse_namespace_name(name: &str) -> Option<NamespaceId> {
        let digits = name.strip_prefix(NAMESPACE_PREFIX)?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok().map(NamespaceId::from_raw)
    }

    /// Interface names produced by more than one `(namespace, interface)` pair
    ///
    /// Always empty for [`NamingScheme::Delimited`], and for up to ten
    /// interfaces, where every index is a single digit.
    #[must_use]
    pub fn collisions(self, ranges: &[IdRange], interfaces: u32) -> Vec<NameCollision> {
        if self == Self::Delimited || interfaces <= 10 {
            return Vec::new();
        }

        let mut owners: BTreeMap<String, Vec<(NamespaceId, u32)>> = BTreeMap::new();

        for range in ranges {
            for id in range.ids() {
                for intf in 0..interfaces {
                    owners
                        .entry(self.interface_name(id, intf))
                        .or_default()
                        .push((id, intf));
                }
            }
        }

        owners
            .into_iter()
            .filter(|(_, owners)| owners.len() > 1)
            .map(|(name, owners)| NameCollision { name, owners })
            .collect()
    }
}

impl fmt::Display for NamingScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Concatenated => write!(f, "concatenated"),
            Self::Delimited => write!(f, "delimited"),
        }
    }
}

/// An interface name shared by several `(namespace, interface)` pairs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameCollision {
    /// The ambiguous interface name
    pub name: String,
    /// Every pair that maps to it
    pub owners: Vec<(NamespaceId, u32)>,
}
