use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// MixAll mixture-model clustering.
#[derive(Parser)]
#[command(
    name = "mixall",
    version,
    about = "Finite mixture model clustering with EM-family algorithms"
)]
pub struct Cli {
    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Command {
    /// Estimate every cluster count of the grid and select the best model.
    Cluster(ClusterArgs),
    /// List the recognised model names.
    Models,
}

/// Arguments for the `cluster` subcommand.
#[derive(clap::Args)]
pub struct ClusterArgs {
    /// Path to TOML configuration file.
    #[arg(short, long, default_value = "mixall.toml")]
    pub config: PathBuf,

    /// Override output JSON path from config.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Override global RNG seed from config.
    #[arg(short, long)]
    pub seed: Option<u64>,
}
