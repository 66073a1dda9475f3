mod args;
mod fancy;

use crate::args::*;
use crate::fancy::Fancy;
use chrono::prelude::*;
use clap::Parser;
use colored::*;
use env_logger::Env;
use reproducible_common::config::{self, ConfigFile};
use reproducible_common::errors::*;
use reproducible_common::Priority;
use reproducible_scheduler::breakages::{self, ArtifactTree};
use reproducible_scheduler::db;
use reproducible_scheduler::manual::{self, Filters, RateLimited, Requester, ScheduleRequest};
use reproducible_scheduler::models::ScheduleEntry;
use reproducible_scheduler::notify;
use serde::Serialize;
use std::fs;
use std::io::{self, Read, Write};
use std::process;

fn packages_from_stdin() -> Result<Vec<String>> {
    let mut buf = Vec::new();
    io::stdin()
        .read_to_end(&mut buf)
        .context("Failed to read package names from stdin")?;
    let buf = String::from_utf8(buf).context("Package names on stdin are not utf-8")?;
    let pkgs = buf
        .split('\0')
        .map(|name| name.trim())
        .filter(|name| !name.is_empty())
        .map(String::from)
        .collect();
    Ok(pkgs)
}

fn schedule(config: &ConfigFile, args: Schedule) -> Result<()> {
    let requester = Requester::from_env()?;

    let mut packages = args.packages;
    if args.null {
        packages.extend(packages_from_stdin()?);
    }

    let request = ScheduleRequest {
        suite: args.suite,
        architecture: args.architecture,
        packages,
        filters: Filters {
            status: args.status,
            issue: args.issue,
            after: args.after,
            before: args.before,
        },
        keep_artifacts: args.keep_artifacts,
        notify: args.notify,
        noisy: args.noisy,
        reason: args.reason,
        dry_run: args.dry_run,
    };

    let notifier = notify::from_config(&config.notify)?;
    let mut connection = db::setup(&config.db.path())?;
    let now = Utc::now().naive_utc();

    let outcome = manual::run(
        &request,
        &requester,
        &config.schedule,
        &config.manual,
        notifier.as_ref(),
        now,
        &mut connection,
    )?;

    if outcome.scheduled.is_empty() {
        warn!("No packages were scheduled");
    } else if request.dry_run {
        info!(
            "Dry run, would have scheduled {} packages",
            outcome.scheduled.len()
        );
    }

    Ok(())
}

fn breakages(config: &ConfigFile, args: Breakages) -> Result<()> {
    let tree = ArtifactTree::new(config.paths.base());
    let mut connection = db::setup(&config.db.path())?;
    let html = breakages::report(&tree, &mut connection)?;

    if let Some(path) = args.output {
        fs::write(&path, html).with_context(|| anyhow!("Failed to write report to {:?}", path))?;
        info!("Breakage report written to {:?}", path);
    } else {
        io::stdout().write_all(html.as_bytes())?;
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct QueueItem<'a> {
    name: &'a str,
    version: &'a str,
    suite: &'a str,
    architecture: &'a str,
    priority: Priority,
    date_scheduled: NaiveDateTime,
    build_started_at: Option<NaiveDateTime>,
    scheduler: Option<&'a str>,
    message: Option<&'a str>,
}

fn queue_list(config: &ConfigFile, ls: QueueList) -> Result<()> {
    let limit = if ls.head { Some(25) } else { None };
    let mut connection = db::setup(&config.db.path())?;
    let queue = ScheduleEntry::list(ls.architecture.as_deref(), limit, &mut connection)?;

    if ls.json {
        let items = queue
            .iter()
            .map(|(entry, pkg)| QueueItem {
                name: &pkg.name,
                version: &pkg.version,
                suite: &pkg.suite,
                architecture: &pkg.architecture,
                priority: entry.priority,
                date_scheduled: entry.date_scheduled,
                build_started_at: entry.build_started_at,
                scheduler: entry.scheduler.as_deref(),
                message: entry.message.as_deref(),
            })
            .collect::<Vec<_>>();
        let mut stdout = io::stdout();
        serde_json::to_writer_pretty(&mut stdout, &items)?;
        stdout.write_all(b"\n")?;
        return Ok(());
    }

    let mut stdout = io::stdout();
    for (entry, pkg) in queue {
        let pkg_str = format!("{} {}", pkg.name.bold(), pkg.version);
        let building = format!(
            "{:8}",
            if entry.build_started_at.is_some() {
                "building"
            } else {
                ""
            }
        );
        let scheduler = entry.scheduler.as_deref().unwrap_or("");

        if writeln!(
            stdout,
            "{} [{}] {:-60} {} {:?} {:?} {}",
            entry
                .date_scheduled
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
                .bright_black(),
            entry.priority.fancy(),
            pkg_str,
            building.green(),
            pkg.suite,
            pkg.architecture,
            scheduler,
        )
        .is_err()
        {
            break;
        }
    }
    Ok(())
}

fn run(args: Args) -> Result<()> {
    let config_path = args.config;
    let load_config = || -> Result<ConfigFile> {
        dotenvy::dotenv().ok();
        config::load(config_path.as_deref())
    };

    match args.subcommand {
        SubCommand::Schedule(schedule_args) => schedule(&load_config()?, schedule_args)?,
        SubCommand::Breakages(breakages_args) => breakages(&load_config()?, breakages_args)?,
        SubCommand::Queue(Queue::List(ls)) => queue_list(&load_config()?, ls)?,
        SubCommand::Completions(completions) => args::gen_completions(&completions)?,
    }

    Ok(())
}

fn main() {
    let args = Args::parse();

    let logging = match args.verbose {
        0 => "info",
        1 => "info,reproctl=debug,reproducible_scheduler=debug",
        2 => "debug",
        _ => "trace",
    };
    env_logger::init_from_env(Env::default().default_filter_or(logging));

    if args.color {
        colored::control::set_override(true);
    }

    if let Err(err) = run(args) {
        error!("Error: {:#}", err);
        if let Some(limited) = err.downcast_ref::<RateLimited>() {
            debug!("Rejected by rate limit: {:?}", limited);
            process::exit(2);
        }
        process::exit(1);
    }
}
