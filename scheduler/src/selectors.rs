use crate::models::SourcePackage;
use crate::schema::*;
use crate::versions::compare_versions;
use chrono::prelude::*;
use chrono::Duration;
use diesel::define_sql_function;
use diesel::prelude::*;
use reproducible_common::errors::*;
use reproducible_common::{BuildStatus, Category};
use std::cmp::Ordering;

define_sql_function! {
    #[sql_name = "RANDOM"]
    fn sqlite_random() -> Integer
}

/// Age limits for rescheduling packages that were already tested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cutoffs {
    /// Failures are retried once their last build is older than this.
    pub stale_failure: NaiveDateTime,
    /// Known versions are retried once their last build is older than this.
    pub old_version: NaiveDateTime,
}

impl Cutoffs {
    pub fn new(now: NaiveDateTime, ftbfs_grace_days: i64, minimum_age_days: i64) -> Cutoffs {
        Cutoffs {
            stale_failure: now - Duration::days(ftbfs_grace_days),
            old_version: now - Duration::days(minimum_age_days),
        }
    }
}

/// Packages that were never tested and aren't queued, in random order.
pub fn untested(
    suite: &str,
    architecture: &str,
    limit: u32,
    connection: &mut SqliteConnection,
) -> Result<Vec<SourcePackage>> {
    let pkgs = sources::table
        .left_join(results::table)
        .left_join(schedule::table)
        .filter(sources::suite.eq(suite))
        .filter(sources::architecture.eq(architecture))
        .filter(results::id.is_null())
        .filter(schedule::id.is_null())
        .order_by(sqlite_random())
        .limit(i64::from(limit))
        .select(SourcePackage::as_select())
        .load::<SourcePackage>(connection)?;
    Ok(pkgs)
}

/// Packages with a greater version than the one tested last, oldest test first.
pub fn new_versions(
    suite: &str,
    architecture: &str,
    limit: u32,
    connection: &mut SqliteConnection,
) -> Result<Vec<SourcePackage>> {
    let rows = sources::table
        .inner_join(results::table)
        .left_join(schedule::table)
        .filter(sources::suite.eq(suite))
        .filter(sources::architecture.eq(architecture))
        .filter(sources::version.ne(results::version))
        .filter(results::status.ne(BuildStatus::Blacklisted))
        .filter(schedule::id.is_null())
        .order_by((results::build_date, sources::id))
        .select((SourcePackage::as_select(), results::version))
        .load::<(SourcePackage, String)>(connection)?;

    let pkgs = rows
        .into_iter()
        .filter(|(pkg, tested)| {
            let newer = compare_versions(&pkg.version, tested) == Ordering::Greater;
            if !newer {
                debug!(
                    "Not scheduling {} {}, it's not newer than the tested {}",
                    pkg.name, pkg.version, tested
                );
            }
            newer
        })
        .map(|(pkg, _)| pkg)
        .take(limit as usize)
        .collect();
    Ok(pkgs)
}

/// Packages that failed to build or had unmet dependencies a while ago without a bug filed,
/// oldest test first.
pub fn stale_failures(
    suite: &str,
    architecture: &str,
    limit: u32,
    cutoff: NaiveDateTime,
    connection: &mut SqliteConnection,
) -> Result<Vec<SourcePackage>> {
    let pkgs = sources::table
        .inner_join(results::table)
        .left_join(notes::table)
        .left_join(schedule::table)
        .filter(sources::suite.eq(suite))
        .filter(sources::architecture.eq(architecture))
        .filter(results::status.eq_any(vec![BuildStatus::Ftbfs, BuildStatus::Depwait]))
        .filter(
            notes::bugs
                .is_null()
                .or(notes::bugs.eq(""))
                .or(notes::bugs.eq("[]")),
        )
        .filter(results::build_date.lt(cutoff))
        .filter(schedule::id.is_null())
        .order_by((results::build_date, sources::id))
        .limit(i64::from(limit))
        .select(SourcePackage::as_select())
        .load::<SourcePackage>(connection)?;
    Ok(pkgs)
}

/// Packages whose last test is older than the minimum age, oldest test first.
pub fn old_versions(
    suite: &str,
    architecture: &str,
    limit: u32,
    cutoff: NaiveDateTime,
    connection: &mut SqliteConnection,
) -> Result<Vec<SourcePackage>> {
    let pkgs = sources::table
        .inner_join(results::table)
        .left_join(schedule::table)
        .filter(sources::suite.eq(suite))
        .filter(sources::architecture.eq(architecture))
        .filter(results::status.ne(BuildStatus::Blacklisted))
        .filter(results::build_date.lt(cutoff))
        .filter(schedule::id.is_null())
        .order_by((results::build_date, sources::id))
        .limit(i64::from(limit))
        .select(SourcePackage::as_select())
        .load::<SourcePackage>(connection)?;
    Ok(pkgs)
}

pub fn select(
    category: Category,
    suite: &str,
    architecture: &str,
    limit: u32,
    cutoffs: &Cutoffs,
    connection: &mut SqliteConnection,
) -> Result<Vec<SourcePackage>> {
    if limit == 0 {
        return Ok(Vec::new());
    }
    let pkgs = match category {
        Category::Untested => untested(suite, architecture, limit, connection),
        Category::NewVersion => new_versions(suite, architecture, limit, connection),
        Category::StaleFailure => {
            stale_failures(suite, architecture, limit, cutoffs.stale_failure, connection)
        }
        Category::OldVersion => {
            old_versions(suite, architecture, limit, cutoffs.old_version, connection)
        }
    }
    .with_context(|| anyhow!("Failed to select {} packages in {}/{}", category, suite, architecture))?;
    debug!(
        "Selected {} {} packages in {}/{} (limit={})",
        pkgs.len(),
        category,
        suite,
        architecture,
        limit
    );
    Ok(pkgs)
}
