//! # prov CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use prov_cli::digest::{run_digest, DigestArgs};
use prov_cli::replay::{run_replay, ReplayArgs};
use prov_cli::wallet::{run_wallet, WalletArgs};

/// Provenance engine toolchain.
///
/// Previews wallet assignment, computes canonical record digests and replays
/// custody scenarios against an in-process engine.
#[derive(Parser, Debug)]
#[command(name = "prov", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to the engine configuration file (YAML).
    #[arg(long, global = true, env = "PROV_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Wallet pool inspection.
    Wallet(WalletArgs),

    /// Canonical SHA-256 digest of a record.
    Digest(DigestArgs),

    /// Replay a scenario file against a fresh engine.
    Replay(ReplayArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = prov_cli::load_config(cli.config.as_deref()).and_then(|config| match cli.command {
        Commands::Wallet(args) => run_wallet(&args, &config.wallet),
        Commands::Digest(args) => run_digest(&args),
        Commands::Replay(args) => run_replay(&args, config),
    });

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}
