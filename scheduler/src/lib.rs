use crate::pipeline::Scheduler;
use crate::quota::QuotaPolicy;
use chrono::prelude::*;
use diesel::SqliteConnection;
use reproducible_common::config::ConfigFile;
use reproducible_common::errors::*;
use reproducible_common::http;

pub mod breakages;
pub mod db;
pub mod decompress;
pub mod manual;
pub mod models;
pub mod notify;
pub mod pipeline;
pub mod queue;
pub mod quota;
pub mod schema;
pub mod selectors;
pub mod sources;
pub mod sync;
pub mod versions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    pub sync: bool,
    pub schedule: bool,
}

/// Download the source index of every suite and sync it for each architecture that tests it.
pub fn sync_all(config: &ConfigFile, now: NaiveDateTime, connection: &mut SqliteConnection) -> Result<()> {
    let client = http::client()?;
    let targets = config.schedule.targets();

    info!("Updating sources tables for all suites.");
    for suite in config.schedule.suites() {
        let architectures = targets
            .iter()
            .filter(|(s, _)| *s == suite)
            .map(|(_, arch)| arch.as_str())
            .collect::<Vec<_>>();
        if architectures.is_empty() {
            debug!("No architecture tests {}, not syncing it", suite);
            continue;
        }

        let pkgs = sources::fetch_sources(&client, config.mirror.url(), config.mirror.component(), &suite)
            .with_context(|| anyhow!("Failed to fetch source index of {}", suite))?;
        for arch in architectures {
            sync::run(&suite, arch, pkgs.clone(), now, connection)?;
        }
    }
    Ok(())
}

pub fn run(config: &ConfigFile, options: &RunOptions) -> Result<()> {
    let policy = QuotaPolicy::builtin().with_overrides(&config.schedule.limits)?;
    let notifier = notify::from_config(&config.notify)?;

    let mut connection = db::setup(&config.db.path())?;
    let now = Utc::now().naive_utc();

    if options.sync {
        sync_all(config, now, &mut connection)?;
    }

    if options.schedule {
        let scheduler = Scheduler {
            config: &config.schedule,
            policy: &policy,
            notifier: notifier.as_ref(),
        };
        let reports = scheduler.run(now, &mut connection)?;
        let total = reports.iter().map(|r| r.scheduled).sum::<usize>();
        info!("Scheduled {} packages in total", total);
    }

    Ok(())
}
