use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use kikoeru_core::Overrides;

#[derive(Clone, Debug, Parser)]
#[command(name = "kikoeru", version = env!("CARGO_PKG_VERSION"), about, long_about = None, propagate_version = true)]
pub struct App {
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    /// Watch a directory and process uploads once they stop changing
    #[command(alias = "m", name = "monitor")]
    Monitor(MonitorArg),
    /// Process one archive right away and exit
    #[command(alias = "p", name = "process")]
    Process(ProcessArg),
    /// Print the effective configuration for a directory
    #[command(alias = "cfg", name = "config")]
    Config(ConfigArg),
}

#[derive(Clone, Debug, Args)]
pub struct MonitorArg {
    /// Directory receiving uploads
    pub dir: PathBuf,
    /// Configuration file, defaults to `<DIR>/kikoeru.toml`
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Seconds between polls
    #[arg(long)]
    pub check_interval: Option<u64>,
    /// Unchanged polls required before an upload is processed
    #[arg(long)]
    pub min_stable_checks: Option<u32>,
    /// Seconds to wait for an upload to settle before giving up on it
    #[arg(long)]
    pub max_wait_time: Option<u64>,
    /// Where diagnostics and outcome records are written
    #[arg(long)]
    pub log_dir: Option<PathBuf>,
}

impl MonitorArg {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            check_interval: self.check_interval,
            min_stable_checks: self.min_stable_checks,
            max_wait_time: self.max_wait_time,
            log_dir: self.log_dir.clone(),
        }
    }
}

#[derive(Clone, Debug, Args)]
pub struct ProcessArg {
    /// Archive to process; results land next to it
    pub file: PathBuf,
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub log_dir: Option<PathBuf>,
}

#[derive(Clone, Debug, Args)]
pub struct ConfigArg {
    pub dir: PathBuf,
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}
