mod cli;
mod cluster_cmd;
mod config;
mod convert;
mod input;
mod logging;
mod report;

use std::process;

use anyhow::Result;
use clap::Parser;
use mixall_components::ModelName;

use crate::cli::{Cli, Command};

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    if let Err(e) = run(cli.command) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Cluster(args) => cluster_cmd::run(args),
        Command::Models => {
            for model in ModelName::all() {
                println!("{model}");
            }
            Ok(())
        }
    }
}
