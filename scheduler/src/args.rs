use clap::{ArgAction, Parser};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(version)]
pub struct Args {
    /// Verbose logging
    #[arg(short, long, action(ArgAction::Count))]
    pub verbose: u8,
    /// Load and print a config
    #[arg(long)]
    pub check_config: bool,
    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Don't download the source indexes, schedule based on what's in the database
    #[arg(long)]
    pub skip_sync: bool,
    /// Only update the database, don't schedule anything
    #[arg(long)]
    pub skip_schedule: bool,
}
