//! CLI argument definitions

use clap::Parser;
use nsbatch_core::IdRange;
use nsbatch_namespace::inventory::NETNS_DIR;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "nsbatch")]
#[command(about = "Batch provisioner for test network namespaces", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// JSON workload file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Namespace ID range, end exclusive (repeatable, replaces the workload's ranges)
    #[arg(short, long = "range", value_name = "LO..HI")]
    pub ranges: Vec<IdRange>,

    /// Dummy interfaces per namespace
    #[arg(short, long, value_name = "N")]
    pub interfaces: Option<u32>,

    /// Name interfaces test-eth-<ns>-<i> instead of test-eth-<ns><i>
    #[arg(long)]
    pub delimited_names: bool,

    /// Stop a range at its first failed command
    #[arg(long)]
    pub strict: bool,

    /// Connection tracking module to load
    #[arg(long, value_name = "NAME")]
    pub module: Option<String>,

    /// Directory inspected by the status mode
    #[arg(long, value_name = "DIR", default_value = NETNS_DIR)]
    pub netns_dir: PathBuf,

    /// With status, also check each namespace's interfaces
    #[arg(long)]
    pub links: bool,

    /// Print commands without executing them
    #[arg(long)]
    pub dry_run: bool,

    /// Print the final report as JSON
    #[arg(long)]
    pub json: bool,

    /// create, delete or status
    pub mode: Option<String>,

    /// Number of ranges processed in parallel
    pub workers: Option<usize>,
}
