use crate::models::ScheduleEntry;
use crate::notify::{self, Notify};
use crate::queue::{self, Merged, Selection};
use crate::quota::QuotaPolicy;
use crate::selectors::{self, Cutoffs};
use chrono::prelude::*;
use diesel::prelude::*;
use reproducible_common::config::ScheduleConfig;
use reproducible_common::errors::*;
use reproducible_common::Category;

/// Queue depth plus everything selected by the categories evaluated so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunningTotal(u32);

impl RunningTotal {
    pub fn new(depth: u32) -> RunningTotal {
        RunningTotal(depth)
    }

    pub fn get(&self) -> u32 {
        self.0
    }

    pub fn add(&mut self, n: usize) {
        let n = u32::try_from(n).unwrap_or(u32::MAX);
        self.0 = self.0.saturating_add(n);
    }
}

/// How much scheduling an architecture gets, based on how full its queue is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Full,
    NewVersionsOnly,
    Skip,
}

impl Mode {
    pub fn for_depth(depth: u32, maximum: u32) -> Mode {
        if depth > maximum.saturating_mul(2) {
            Mode::Skip
        } else if depth > maximum {
            Mode::NewVersionsOnly
        } else {
            Mode::Full
        }
    }

    pub fn includes(&self, category: Category) -> bool {
        match self {
            Mode::Full => true,
            Mode::NewVersionsOnly => category == Category::NewVersion,
            Mode::Skip => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchReport {
    pub architecture: String,
    pub depth: u32,
    pub mode: Mode,
    pub scheduled: usize,
    pub message: Option<String>,
}

pub struct Scheduler<'a> {
    pub config: &'a ScheduleConfig,
    pub policy: &'a QuotaPolicy,
    pub notifier: &'a dyn Notify,
}

impl Scheduler<'_> {
    fn select_all(
        &self,
        architecture: &str,
        suites: &[String],
        mode: Mode,
        depth: u32,
        cutoffs: &Cutoffs,
        connection: &mut SqliteConnection,
    ) -> Result<Vec<Selection>> {
        let mut total = RunningTotal::new(depth);
        let mut selections = Vec::new();

        for category in Category::ALL {
            let mut selection = Selection::new(category);
            if mode.includes(category) {
                for suite in suites {
                    let limit = self
                        .policy
                        .allowance(category, architecture, suite, total.get());
                    info!(
                        "Requesting {} {} packages in {}/{}...",
                        limit, category, suite, architecture
                    );
                    let pkgs =
                        selectors::select(category, suite, architecture, limit, cutoffs, connection)?;
                    info!(
                        "Received {} {} packages in {}/{} to schedule.",
                        pkgs.len(),
                        category,
                        suite,
                        architecture
                    );
                    selection.push(suite, pkgs);
                }
            } else {
                for suite in suites {
                    selection.push(suite, Vec::new());
                }
            }
            total.add(selection.len());
            selections.push(selection);
        }

        Ok(selections)
    }

    fn schedule(
        &self,
        architecture: &str,
        suites: &[String],
        mode: Mode,
        depth: u32,
        now: NaiveDateTime,
        connection: &mut SqliteConnection,
    ) -> Result<(Merged, Vec<(String, usize)>)> {
        let settings = self.config.arch_settings(architecture);
        let cutoffs = Cutoffs::new(now, self.config.ftbfs_grace_days(), settings.minimum_age);

        let selections = self.select_all(architecture, suites, mode, depth, &cutoffs, connection)?;
        let merged = queue::merge(&selections, &self.config.priorities, now);
        queue::write(&merged, connection)?;

        let mut queued = Vec::new();
        for suite in suites {
            let n = ScheduleEntry::count_for_suite_arch(suite, architecture, connection)?;
            queued.push((suite.clone(), n as usize));
        }

        Ok((merged, queued))
    }

    /// Run one scheduling pass for an architecture and notify about it.
    pub fn run_arch(
        &self,
        architecture: &str,
        now: NaiveDateTime,
        connection: &mut SqliteConnection,
    ) -> Result<ArchReport> {
        let settings = self.config.arch_settings(architecture);
        let suites = self
            .config
            .suites()
            .into_iter()
            .filter(|suite| settings.tests_suite(suite))
            .collect::<Vec<_>>();

        let depth = ScheduleEntry::count_for_arch(architecture, connection)?;
        let depth = u32::try_from(depth).unwrap_or(u32::MAX);
        let mode = Mode::for_depth(depth, settings.maximum);

        let mut report = ArchReport {
            architecture: architecture.to_string(),
            depth,
            mode,
            scheduled: 0,
            message: None,
        };

        match mode {
            Mode::Skip => {
                info!(
                    "{} packages already scheduled for {}, nothing to do.",
                    depth, architecture
                );
                return Ok(report);
            }
            Mode::NewVersionsOnly => info!(
                "{} packages already scheduled for {}, only scheduling new versions.",
                depth, architecture
            ),
            Mode::Full => info!(
                "{} packages already scheduled for {}, scheduling some more...",
                depth, architecture
            ),
        }

        let (merged, queued) = connection.transaction::<_, Error, _>(|connection| {
            self.schedule(architecture, &suites, mode, depth, now, connection)
        })?;

        report.scheduled = merged.len();
        if !merged.is_empty() {
            let message = queue::summary_message(architecture, &merged, &queued);
            info!("{}", message);
            notify::send(self.notifier, &message);
            report.message = Some(message);
        }
        info!("Scheduling for architecture {} done.", architecture);

        Ok(report)
    }

    pub fn run(&self, now: NaiveDateTime, connection: &mut SqliteConnection) -> Result<Vec<ArchReport>> {
        let mut reports = Vec::new();
        for architecture in self.config.architectures() {
            info!("Scheduling for {}...", architecture);
            reports.push(self.run_arch(&architecture, now, connection)?);
        }
        Ok(reports)
    }
}
