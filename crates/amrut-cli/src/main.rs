//! AMRUT CLI - reconcile field-survey archives against office data.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Inspect { archive, json } => commands::inspect::run(archive, json),

        Commands::Diff {
            archive,
            layer,
            authoritative,
            projected,
            json,
        } => commands::diff::run(archive, layer, authoritative, projected, json),

        Commands::Review {
            archive,
            layer,
            authoritative,
            script,
            accept_all,
            reject_all,
            projected,
            dry_run,
        } => commands::review::run(
            archive,
            layer,
            authoritative,
            script,
            accept_all,
            reject_all,
            projected,
            dry_run,
        ),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "amrut=debug" } else { "amrut=warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
