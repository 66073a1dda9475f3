use chrono::prelude::*;
use chrono::Duration;
use diesel::SqliteConnection;
use reproducible_common::BuildStatus;
use reproducible_scheduler::models::{NewBuildResult, NewNote, NewSourcePackage, SourcePackage};
use reproducible_scheduler::sources::SourceEntry;

pub const DUMMY_SUITE: &str = "unstable";
pub const DUMMY_OTHER_SUITE: &str = "experimental";
pub const DUMMY_ARCHITECTURE: &str = "amd64";
pub const DUMMY_REQUESTER: &str = "alice";

pub fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

pub fn days_ago(days: i64) -> NaiveDateTime {
    now() - Duration::days(days)
}

pub fn entry(name: &str, version: &str) -> SourceEntry {
    SourceEntry::new(name, version)
}

pub fn insert_package(
    name: &str,
    version: &str,
    suite: &str,
    connection: &mut SqliteConnection,
) -> SourcePackage {
    NewSourcePackage {
        name: name.to_string(),
        version: version.to_string(),
        suite: suite.to_string(),
        architecture: DUMMY_ARCHITECTURE.to_string(),
    }
    .insert(connection)
    .unwrap()
}

pub fn insert_result(
    pkg: &SourcePackage,
    version: &str,
    status: BuildStatus,
    build_date: NaiveDateTime,
    connection: &mut SqliteConnection,
) {
    NewBuildResult {
        package_id: pkg.id,
        version: version.to_string(),
        status,
        build_date: Some(build_date),
        build_duration: Some(600),
    }
    .upsert(connection)
    .unwrap();
}

pub fn insert_bugs(pkg: &SourcePackage, bugs: &str, connection: &mut SqliteConnection) {
    NewNote {
        package_id: pkg.id,
        version: Some(pkg.version.clone()),
        bugs: Some(bugs.to_string()),
        ..Default::default()
    }
    .upsert(connection)
    .unwrap();
}

pub fn insert_issues(pkg: &SourcePackage, issues: &str, connection: &mut SqliteConnection) {
    NewNote {
        package_id: pkg.id,
        version: Some(pkg.version.clone()),
        issues: Some(issues.to_string()),
        ..Default::default()
    }
    .upsert(connection)
    .unwrap();
}
