use std::path::PathBuf;

use clap::Parser;

use crate::Commands;

/// Main CLI application arguments and command structure
#[derive(Parser)]
#[clap(
    name = "timecaps",
    version,
    about = "Seal notes to your future self and open them when their date arrives"
)]
pub struct Cli {
    /// Path to the configuration file
    #[clap(short = 'c', long, value_parser)]
    pub config: Option<PathBuf>,

    /// Path to the data directory (overrides the config file)
    #[clap(long, value_parser)]
    pub data_dir: Option<PathBuf>,

    /// Base URL of the remote capsule service (overrides the config file)
    #[clap(long, value_parser)]
    pub api_url: Option<String>,

    /// Verbose output mode
    #[clap(short, long)]
    pub verbose: bool,

    /// Subcommands for the timecaps application
    #[clap(subcommand)]
    pub command: Commands,
}
