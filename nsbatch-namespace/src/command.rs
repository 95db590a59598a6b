//! Typed external commands
//!
//! Every kernel change, and the read-only link listing used by status
//! checks, goes through one of these. Commands are executed
//! directly (no shell), so names are passed as discrete arguments.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One external command issued by the provisioner
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum NetCommand {
    /// `modprobe <module>`
    LoadModule {
        /// Kernel module name
        module: String,
    },
    /// `ip netns add <namespace>`
    AddNamespace {
        /// Namespace name
        namespace: String,
    },
    /// `ip netns del <namespace>`
    DeleteNamespace {
        /// Namespace name
        namespace: String,
    },
    /// `ip link add <link> type dummy`
    AddDummyLink {
        /// Link name
        link: String,
    },
    /// `ip link set <link> netns <namespace>`
    MoveLink {
        /// Link name
        link: String,
        /// Target namespace
        namespace: String,
    },
    /// `ip netns exec <namespace> ifconfig <link> up`
    LinkUp {
        /// Namespace holding the link
        namespace: String,
        /// Link name
        link: String,
    },
    /// `ip link del <link>`
    DeleteLink {
        /// Link name
        link: String,
    },
    /// `ip netns exec <namespace> ip -o link show`
    ListLinks {
        /// Namespace to inspect
        namespace: String,
    },
}

impl NetCommand {
    /// Program to execute
    #[must_use]
    pub const fn program(&self) -> &'static str {
        match self {
            Self::LoadModule { .. } => "modprobe",
            _ => "ip",
        }
    }

    /// Arguments passed to [`program`](Self::program)
    #[must_use]
    pub fn args(&self) -> Vec<&str> {
        match self {
            Self::LoadModule { module } => vec![module.as_str()],
            Self::AddNamespace { namespace } => vec!["netns", "add", namespace.as_str()],
            Self::DeleteNamespace { namespace } => vec!["netns", "del", namespace.as_str()],
            Self::AddDummyLink { link } => vec!["link", "add", link.as_str(), "type", "dummy"],
            Self::MoveLink { link, namespace } => {
                vec!["link", "set", link.as_str(), "netns", namespace.as_str()]
            }
            Self::LinkUp { namespace, link } => {
                vec!["netns", "exec", namespace.as_str(), "ifconfig", link.as_str(), "up"]
            }
            Self::DeleteLink { link } => vec!["link", "del", link.as_str()],
            Self::ListLinks { namespace } => {
                vec!["netns", "exec", namespace.as_str(), "ip", "-o", "link", "show"]
            }
        }
    }

    /// Whether a failure of this command is expected and never fatal
    ///
    /// Deleting a namespace already removes the links inside it, so the
    /// `ip link del` that follows normally fails.
    #[must_use]
    pub const fn failure_tolerated(&self) -> bool {
        matches!(self, Self::DeleteLink { .. })
    }
}

impl fmt::Display for NetCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program())?;
        for arg in self.args() {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}
