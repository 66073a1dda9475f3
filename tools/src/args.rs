use chrono::prelude::*;
use clap::{ArgAction, CommandFactory, Parser};
use clap_complete::Shell;
use reproducible_common::errors::*;
use reproducible_common::BuildStatus;
use std::io;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(version)]
pub struct Args {
    /// Verbose logging
    #[arg(short, long, global = true, action(ArgAction::Count))]
    pub verbose: u8,
    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
    /// Bypass tty detection and always use colors
    #[arg(short = 'C', long, global = true)]
    pub color: bool,
    #[command(subcommand)]
    pub subcommand: SubCommand,
}

#[derive(Debug, Parser)]
pub enum SubCommand {
    /// Schedule packages for testing
    Schedule(Schedule),
    /// Render the report of packages and files in an inconsistent state
    Breakages(Breakages),
    /// Queue related subcommands
    #[command(subcommand)]
    Queue(Queue),
    /// Generate shell completions
    Completions(Completions),
}

fn parse_date(s: &str) -> Result<NaiveDateTime> {
    if let Ok(date) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Ok(date);
    }
    if let Ok(date) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Ok(date);
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| anyhow!("Invalid date, expected YYYY-MM-DD: {:?}", s))?;
    Ok(date.and_time(NaiveTime::MIN))
}

#[derive(Debug, Parser)]
pub struct Schedule {
    /// Only show what would be scheduled, don't write anything
    #[arg(long)]
    pub dry_run: bool,
    /// Read NUL separated package names from stdin
    #[arg(long)]
    pub null: bool,
    /// Save the artifacts of the build(s)
    #[arg(short, long)]
    pub keep_artifacts: bool,
    /// Notify the channel when the build finishes
    #[arg(short, long)]
    pub notify: bool,
    /// Notify the channel when the build starts too
    #[arg(short = 'd', long)]
    pub noisy: bool,
    /// Reason for scheduling the packages
    #[arg(short = 'm', long = "message")]
    pub reason: Option<String>,
    /// Schedule all packages whose latest test has this status
    #[arg(short = 'r', long)]
    pub status: Option<BuildStatus>,
    /// Schedule all packages with notes mentioning this issue
    #[arg(short, long)]
    pub issue: Option<String>,
    /// Schedule all packages last built after this date
    #[arg(short = 't', long, value_parser = parse_date)]
    pub after: Option<NaiveDateTime>,
    /// Schedule all packages last built before this date
    #[arg(short, long, value_parser = parse_date)]
    pub before: Option<NaiveDateTime>,
    #[arg(short, long, default_value = "amd64")]
    pub architecture: String,
    #[arg(short, long, default_value = "unstable")]
    pub suite: String,
    pub packages: Vec<String>,
}

#[derive(Debug, Parser)]
pub struct Breakages {
    /// Write the report to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Parser)]
pub enum Queue {
    /// List the current build queue
    #[command(name = "ls")]
    List(QueueList),
}

#[derive(Debug, Parser)]
pub struct QueueList {
    /// Only show entries for this architecture
    #[arg(short, long)]
    pub architecture: Option<String>,
    /// Only show the first 25 entries
    #[arg(long)]
    pub head: bool,
    /// Print the queue as json
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Parser)]
pub struct Completions {
    pub shell: Shell,
}

pub fn gen_completions(args: &Completions) -> Result<()> {
    clap_complete::generate(args.shell, &mut Args::command(), "reproctl", &mut io::stdout());
    Ok(())
}
