//! CLI argument parsing with clap.

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "securemonitor")]
#[command(
    author,
    version,
    about = "Host intrusion detection daemon: log scanning, alerting and firewall enforcement"
)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    /// Listen address for the inspection API (overrides the config file)
    #[arg(short, long)]
    pub listen: Option<String>,

    /// Quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Verbose mode (debug output)
    #[arg(short, long)]
    pub verbose: bool,
}
