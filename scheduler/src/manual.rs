use crate::models::{ManualRequest, NewManualRequest, NewScheduleEntry, ScheduleEntry, SourcePackage};
use crate::notify::{self, Notify};
use crate::schema::*;
use chrono::prelude::*;
use chrono::Duration;
use diesel::prelude::*;
use reproducible_common::config::{ManualConfig, ScheduleConfig};
use reproducible_common::errors::*;
use reproducible_common::utils::truncate_chars;
use reproducible_common::BuildStatus;
use std::collections::HashSet;
use std::env;
use std::error::Error as StdError;
use std::fmt;

/// Requests made by the maintenance job on the main node aren't announced.
pub const MAINTENANCE_REQUESTER: &str = "jenkins maintenance job";

const MESSAGE_PACKAGES_LEN: usize = 256;

/// Who asked for packages to be scheduled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requester {
    pub name: String,
    /// Set for calls made on the main node, those aren't rate limited.
    pub local: bool,
}

impl Requester {
    pub fn from_env() -> Result<Requester> {
        let name = env::var("LC_USER").map_err(|_| {
            anyhow!("LC_USER is not set, please use the provided script to schedule packages")
        })?;
        let local = env::var("LOCAL_CALL").map(|v| v == "true").unwrap_or(false);
        Ok(Requester { name, local })
    }

    fn is_silent(&self) -> bool {
        self.local && self.name == MAINTENANCE_REQUESTER
    }
}

/// Select packages by their latest test instead of by name. All given filters must match.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Filters {
    pub status: Option<BuildStatus>,
    pub issue: Option<String>,
    pub after: Option<NaiveDateTime>,
    pub before: Option<NaiveDateTime>,
}

impl Filters {
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.issue.is_none() && self.after.is_none() && self.before.is_none()
    }

    /// Names of the packages matching the filters, blacklisted packages are never matched.
    pub fn query(
        &self,
        suite: &str,
        architecture: &str,
        connection: &mut SqliteConnection,
    ) -> Result<Vec<String>> {
        let mut query = sources::table
            .inner_join(results::table)
            .left_join(notes::table)
            .filter(sources::suite.eq(suite))
            .filter(sources::architecture.eq(architecture))
            .filter(results::status.ne(BuildStatus::Blacklisted))
            .select(sources::name)
            .order_by(sources::name)
            .into_boxed();

        if let Some(status) = self.status {
            query = query.filter(results::status.eq(status));
        }
        if let Some(issue) = &self.issue {
            let pattern = format!("%{}%", escape_like(issue));
            query = query.filter(notes::issues.like(pattern).escape('\\'));
        }
        if let Some(after) = self.after {
            query = query.filter(results::build_date.gt(after));
        }
        if let Some(before) = self.before {
            query = query.filter(results::build_date.lt(before));
        }

        let names = query.load::<String>(connection)?;
        Ok(names)
    }
}

fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleRequest {
    pub suite: String,
    pub architecture: String,
    pub packages: Vec<String>,
    pub filters: Filters,
    pub keep_artifacts: bool,
    pub notify: bool,
    /// Also notify when the build starts.
    pub noisy: bool,
    pub reason: Option<String>,
    pub dry_run: bool,
}

impl ScheduleRequest {
    pub fn notify_level(&self) -> i32 {
        if self.noisy {
            2
        } else if self.notify || self.keep_artifacts {
            1
        } else {
            0
        }
    }
}

/// A requester tried to schedule more packages than allowed within a day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimited {
    pub requester: String,
    pub already: i64,
    pub requested: usize,
    pub limit: usize,
}

impl fmt::Display for RateLimited {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} already scheduled {} packages within the last 24h, scheduling {} more would exceed the limit of {}",
            self.requester, self.already, self.requested, self.limit
        )
    }
}

impl StdError for RateLimited {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub scheduled: Vec<SourcePackage>,
    pub message: String,
    pub notified: bool,
}

fn dedup(names: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .into_iter()
        .filter(|name| !name.is_empty())
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

/// Look up the requested packages, skipping unknown packages and packages that are building.
fn resolve(
    names: &[String],
    suite: &str,
    architecture: &str,
    connection: &mut SqliteConnection,
) -> Result<Vec<SourcePackage>> {
    let mut pkgs = Vec::new();
    for name in names {
        let Some(pkg) = SourcePackage::get_by(name, suite, architecture, connection)? else {
            error!("The package {} is not available in {}/{}", name, suite, architecture);
            continue;
        };
        let building = ScheduleEntry::get_by_package(pkg.id, connection)?
            .is_some_and(|entry| entry.build_started_at.is_some());
        if building {
            warn!("The package {} is already building, not scheduling it.", name);
            continue;
        }
        pkgs.push(pkg);
    }
    Ok(pkgs)
}

pub fn format_message(requester: &str, request: &ScheduleRequest, pkgs: &[SourcePackage]) -> String {
    let names = pkgs.iter().map(|p| p.name.as_str()).collect::<Vec<_>>();

    let mut message = format!("{} scheduled ", requester);
    if pkgs.len() > 1 {
        message.push_str(&format!("{} packages ", pkgs.len()));
    }
    message.push_str(&format!("in {}/{}", request.suite, request.architecture));
    if let Some(reason) = &request.reason {
        message.push_str(&format!(", reason: '{}'", reason));
    }
    message.push_str(": ");
    message.push_str(&truncate_chars(&names.join(" "), MESSAGE_PACKAGES_LEN));

    if request.keep_artifacts {
        message.push_str(" - artifacts will be preserved");
    }
    if request.notify {
        message.push_str(" - with irc notification");
    }
    if request.noisy {
        message.push_str(" - notify on start too");
    }
    message
}

fn validate(request: &ScheduleRequest, config: &ScheduleConfig) -> Result<()> {
    let suites = config.suites();
    if !suites.contains(&request.suite) {
        bail!(
            "The suite {:?} is not being tested, please choose between {}",
            request.suite,
            suites.join(", ")
        );
    }
    let architectures = config.architectures();
    if !architectures.contains(&request.architecture) {
        bail!(
            "The architecture {:?} is not being tested, please choose between {}",
            request.architecture,
            architectures.join(", ")
        );
    }
    Ok(())
}

fn schedule(
    request: &ScheduleRequest,
    requester: &Requester,
    schedule_config: &ScheduleConfig,
    manual_config: &ManualConfig,
    now: NaiveDateTime,
    connection: &mut SqliteConnection,
) -> Result<Vec<SourcePackage>> {
    let mut names = request.packages.clone();
    if !request.filters.is_empty() {
        info!("Querying packages with given issues/status...");
        let selected = request
            .filters
            .query(&request.suite, &request.architecture, connection)?;
        info!("Selected packages: {}", selected.join(" "));
        names.extend(selected);
    }
    let names = dedup(names);

    let notify_limit = manual_config.notify_limit();
    if request.notify && names.len() > notify_limit {
        bail!(
            "Do not reschedule more than {} packages with notification, discuss this with the channel first",
            notify_limit
        );
    }

    let pkgs = resolve(&names, &request.suite, &request.architecture, connection)?;

    let cutoff = now - Duration::hours(24);
    let already = ManualRequest::count_since(&requester.name, cutoff, connection)?;
    debug!("{} already scheduled {} packages today", requester.name, already);
    let limit = manual_config.daily_limit();
    if !requester.local && already + pkgs.len() as i64 > limit as i64 {
        return Err(RateLimited {
            requester: requester.name.clone(),
            already,
            requested: pkgs.len(),
            limit,
        }
        .into());
    }

    if request.dry_run {
        info!("Ran with --dry-run, scheduled nothing");
        return Ok(pkgs);
    }

    let priority = schedule_config.priorities.manual();
    let entries = pkgs
        .iter()
        .map(|pkg| NewScheduleEntry {
            package_id: pkg.id,
            date_scheduled: now,
            priority,
            save_artifacts: request.keep_artifacts,
            notify: request.notify_level(),
            scheduler: Some(requester.name.clone()),
            message: request.reason.clone(),
        })
        .collect::<Vec<_>>();
    let audit = pkgs
        .iter()
        .map(|pkg| NewManualRequest {
            package_id: pkg.id,
            requester: requester.name.clone(),
            requested_at: now,
        })
        .collect::<Vec<_>>();

    NewScheduleEntry::replace_batch(&entries, connection)?;
    NewManualRequest::insert_batch(&audit, connection)?;

    Ok(pkgs)
}

/// Schedule packages on behalf of an operator.
pub fn run(
    request: &ScheduleRequest,
    requester: &Requester,
    schedule_config: &ScheduleConfig,
    manual_config: &ManualConfig,
    notifier: &dyn Notify,
    now: NaiveDateTime,
    connection: &mut SqliteConnection,
) -> Result<Outcome> {
    debug!("Requester: {} (local={})", requester.name, requester.local);
    debug!("Request: {:?}", request);
    validate(request, schedule_config)?;

    if request.keep_artifacts {
        info!("The artifacts of the build(s) will be saved to the location mentioned at the end of the build log(s).");
    }
    if request.noisy {
        info!("The channel will be notified when the build starts");
    }

    let scheduled = connection.transaction::<_, Error, _>(|connection| {
        schedule(
            request,
            requester,
            schedule_config,
            manual_config,
            now,
            connection,
        )
    })?;

    let message = format_message(&requester.name, request, &scheduled);
    info!("{}", message);

    let notified = !request.dry_run && !scheduled.is_empty() && !requester.is_silent();
    if notified {
        notify::send(notifier, &message);
    }

    Ok(Outcome {
        scheduled,
        message,
        notified,
    })
}
