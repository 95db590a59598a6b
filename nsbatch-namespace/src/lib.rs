//! Batch provisioning of network namespaces for test environments
//!
//! This crate turns a workload of namespace ID ranges into `ip`/`modprobe`
//! commands and runs them across a bounded worker pool:
//! - Configuration - ranges, interface count, naming and failure policy
//! - Commands and plans - the exact command sequence for each range
//! - Runners - real execution, dry run, and an in-memory mock
//! - Provisioner - parallel create/delete with per-command results
//! - Inventory - which test namespaces currently exist

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

pub mod command;
pub mod config;
pub mod inventory;
pub mod plan;
pub mod pool;
pub mod provisioner;
pub mod report;
pub mod runner;

pub use command::NetCommand;
pub use config::{FailurePolicy, ProvisionerConfig};
pub use inventory::{LinkIssue, NamespaceInventory, StatusReport};
pub use plan::{NamespacePlan, RangePlan};
pub use pool::WorkerPool;
pub use provisioner::Provisioner;
pub use report::{BatchReport, CommandOutcome, CommandRecord, RangeReport};
pub use runner::{CommandOutput, CommandRunner, DryRunRunner, MockRunner, SystemRunner};
