//! nsbatch CLI
//!
//! Creates, deletes and inspects numbered test network namespaces with
//! dummy interfaces.

use clap::{CommandFactory, Parser};
use std::process;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod run;

use cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let (Some(mode), Some(workers)) = (cli.mode.clone(), cli.workers) else {
        print_usage();
        return;
    };

    match run::execute(&cli, &mode, workers).await {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {e:#}");
            process::exit(1);
        }
    }
}

fn print_usage() {
    let mut command = Cli::command();
    println!("{}", command.render_usage());
    println!();
    println!("Modes:");
    println!("  create   Create the namespaces and their dummy interfaces");
    println!("  delete   Delete the namespaces and their interfaces");
    println!("  status   Compare existing namespaces with the workload");
    println!();
    println!("Example: nsbatch create 4");
}
