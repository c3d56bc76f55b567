mod artifact;
mod calendar;
mod classify;
mod cli;
mod config;
mod execute;
mod forge;
mod model;
mod notify;
mod pipeline;
mod report;
mod source;
mod steps;
#[cfg(test)]
mod testing;

use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = cli::Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = cli::run(cli) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
