use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "credo-node")]
#[command(about = "Credential consensus & reconciliation engine")]
pub struct Cli {
    /// JSON config file, created with defaults if missing
    #[arg(short, long, value_name = "FILE", default_value = "config.json")]
    pub config: PathBuf,

    /// Overrides `data_dir` from the config file
    #[arg(long, value_name = "DIR")]
    pub data_dir: Option<String>,

    /// Overrides `seed` from the config file
    #[arg(long)]
    pub seed: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Mint, sync, export and reconcile a scripted batch, then print a report
    Demo,
    /// Reconcile periodically until Ctrl+C
    Reconcile {
        #[arg(long, value_name = "MS")]
        interval_ms: Option<u64>,
    },
    /// Print persisted metrics and collection sizes
    Metrics,
    /// Reset every component to its initial state
    Clear,
}
