//! CLI argument definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use super::commands::{classify::ClassifyArgs, config::ConfigArgs, simulate::SimulateArgs};

#[derive(Parser)]
#[command(name = "cadence")]
#[command(about = "Heartbeat-synchronized coordination kernel for layered agent teams", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Load configuration from this YAML file instead of .cadence/
    #[arg(short, long, global = true, env = "CADENCE_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a scripted team through the kernel for a number of heartbeats
    Simulate(SimulateArgs),

    /// Print the effective configuration
    Config(ConfigArgs),

    /// Classify an error message and show its recovery plan
    Classify(ClassifyArgs),
}
