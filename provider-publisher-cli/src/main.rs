//! provider-publisher - publish a provider release to a private registry
//!
//! Reads its configuration from CI environment variables (see
//! `provider_publisher::config`). Exits 0 on success, 1 on failure and 130
//! when interrupted.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use provider_publisher::logging;

mod commands;
mod error;

/// Publish a multi-platform provider release to a private registry
#[derive(Parser, Debug)]
#[command(name = "provider-publisher")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the version, upload checksums and publish every platform
    Publish,

    /// Resolve the release and list its artifacts without publishing
    Inspect,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let result = match cli.command {
        Commands::Publish => commands::publish::run(),
        Commands::Inspect => commands::inspect::run(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {}", err);
            ExitCode::from(err.exit_code())
        }
    }
}
