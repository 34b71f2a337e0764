//! ropstate - ROP table cursor simulator
//!
//! Runs YAML table scenarios against a chosen server generation, decodes
//! ROP bytes to JSON and prints resolved server behavior.

mod commands;
mod scenario;

use clap::{Parser, Subcommand};
use colored::Colorize;
use ropstate_core::{Config, ServerGeneration};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ropstate")]
#[command(about = "ROP codec and table cursor state machine")]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(short, long, env = "ROPSTATE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a table scenario
    Run {
        /// Scenario YAML file
        scenario: PathBuf,

        /// Server generation (overrides the scenario and config)
        #[arg(short, long, value_parser = commands::parse_generation)]
        generation: Option<ServerGeneration>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Decode hex-encoded ROP bytes to JSON
    Decode {
        /// Hex bytes
        hex: String,

        /// Decode as a response instead of a request
        #[arg(short, long)]
        response: bool,

        /// Input is a full ROP buffer with RopSize and handle table
        #[arg(short, long)]
        buffer: bool,

        /// Column set for row-bearing responses
        #[arg(short, long, value_delimiter = ',')]
        columns: Vec<String>,
    },

    /// Print the resolved server behavior as YAML
    Behavior {
        /// Server generation
        #[arg(short, long, value_parser = commands::parse_generation)]
        generation: Option<ServerGeneration>,
    },

    /// List known ROP ids
    Rops {
        /// Show a single ROP by name
        name: Option<String>,
    },
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::from_file(path).map(|mut c| {
            c.apply_env_overrides();
            c
        }),
        None => Config::load(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {}", "Config error".red(), e);
            std::process::exit(1);
        }
    };

    match commands::execute(cli.command, config) {
        Ok(output) => {
            println!("{}", output.text);
            if !output.success {
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            std::process::exit(1);
        }
    }
}
