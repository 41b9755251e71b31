//! linkerd-install - staged Linkerd installer
//!
//! Renders the Kubernetes manifests for the Linkerd control plane, either in
//! one pass or split into a cluster-wide config stage and a namespaced
//! control-plane stage, after checking the target cluster for conflicts.

use clap::Parser;
use miette::Diagnostic;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod charts;
mod cli;
mod cluster;
mod commands;
mod error;
mod healthcheck;
mod identity;
mod operations;
mod tree;
mod values;

#[cfg(test)]
mod test_fixtures;

use cli::{Cli, Commands};

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match &cli.command {
        Commands::Install(args) => commands::install::run(&cli, args),
        Commands::Version => commands::version::run(),
        Commands::Completions(args) => commands::completions::run(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        if let Some(help) = e.help() {
            eprintln!();
            eprintln!("{}", help);
        }
        std::process::exit(1);
    }
}
