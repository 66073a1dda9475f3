use crate::data::*;
use crate::fixtures::*;
use crate::setup::*;
use reproducible_common::{BuildStatus, Category, Priority};
use reproducible_scheduler::models::NewScheduleEntry;
use reproducible_scheduler::selectors::{self, Cutoffs};
use rstest::rstest;

fn cutoffs() -> Cutoffs {
    Cutoffs::new(now(), 3, 7)
}

fn enqueue(pkg: &reproducible_scheduler::models::SourcePackage, connection: &mut diesel::SqliteConnection) {
    NewScheduleEntry::replace_batch(
        &[NewScheduleEntry::new(pkg.id, Priority::untested(), days_ago(1))],
        connection,
    )
    .unwrap();
}

fn names(pkgs: &[reproducible_scheduler::models::SourcePackage]) -> Vec<&str> {
    pkgs.iter().map(|pkg| pkg.name.as_str()).collect()
}

#[rstest]
pub fn untested_skips_tested_and_queued(isolated_database: IsolatedDatabase) {
    let mut connection = isolated_database.connection;
    let fresh = insert_package("fresh", "1.0-1", DUMMY_SUITE, &mut connection);
    let tested = insert_package("tested", "1.0-1", DUMMY_SUITE, &mut connection);
    insert_result(&tested, "1.0-1", BuildStatus::Reproducible, days_ago(1), &mut connection);
    setup_queued_packages(2, &mut connection);

    let pkgs = selectors::untested(DUMMY_SUITE, DUMMY_ARCHITECTURE, 10, &mut connection).unwrap();
    assert_eq!(pkgs, vec![fresh]);
}

#[rstest]
pub fn untested_honors_limit(isolated_database: IsolatedDatabase) {
    let mut connection = isolated_database.connection;
    setup_untested_packages(10, &mut connection);

    let pkgs = selectors::untested(DUMMY_SUITE, DUMMY_ARCHITECTURE, 4, &mut connection).unwrap();
    assert_eq!(pkgs.len(), 4);
}

#[rstest]
pub fn zero_limit_selects_nothing(isolated_database: IsolatedDatabase) {
    let mut connection = isolated_database.connection;
    setup_untested_packages(3, &mut connection);

    let pkgs = selectors::select(
        Category::Untested,
        DUMMY_SUITE,
        DUMMY_ARCHITECTURE,
        0,
        &cutoffs(),
        &mut connection,
    )
    .unwrap();
    assert!(pkgs.is_empty());
}

#[rstest]
pub fn new_version_compares_debian_versions(isolated_database: IsolatedDatabase) {
    let mut connection = isolated_database.connection;
    let newer = insert_package("newer", "1.10", DUMMY_SUITE, &mut connection);
    insert_result(&newer, "1.9", BuildStatus::Reproducible, days_ago(1), &mut connection);
    let older = insert_package("older", "1.9", DUMMY_SUITE, &mut connection);
    insert_result(&older, "1.10", BuildStatus::Reproducible, days_ago(1), &mut connection);
    let same = insert_package("same", "2.0-1", DUMMY_SUITE, &mut connection);
    insert_result(&same, "2.0-1", BuildStatus::Reproducible, days_ago(1), &mut connection);

    let pkgs =
        selectors::new_versions(DUMMY_SUITE, DUMMY_ARCHITECTURE, 10, &mut connection).unwrap();
    assert_eq!(names(&pkgs), vec!["newer"]);
}

#[rstest]
pub fn new_version_skips_blacklisted(isolated_database: IsolatedDatabase) {
    let mut connection = isolated_database.connection;
    let pkg = insert_package("blocked", "2.0-1", DUMMY_SUITE, &mut connection);
    insert_result(&pkg, "1.0-1", BuildStatus::Blacklisted, days_ago(1), &mut connection);

    let pkgs =
        selectors::new_versions(DUMMY_SUITE, DUMMY_ARCHITECTURE, 10, &mut connection).unwrap();
    assert!(pkgs.is_empty());
}

#[rstest]
pub fn new_version_oldest_build_first(isolated_database: IsolatedDatabase) {
    let mut connection = isolated_database.connection;
    let recent = insert_package("recent", "2.0-1", DUMMY_SUITE, &mut connection);
    insert_result(&recent, "1.0-1", BuildStatus::Reproducible, days_ago(1), &mut connection);
    let ancient = insert_package("ancient", "2.0-1", DUMMY_SUITE, &mut connection);
    insert_result(&ancient, "1.0-1", BuildStatus::Unreproducible, days_ago(90), &mut connection);

    let pkgs =
        selectors::new_versions(DUMMY_SUITE, DUMMY_ARCHITECTURE, 1, &mut connection).unwrap();
    assert_eq!(names(&pkgs), vec!["ancient"]);
}

#[rstest]
pub fn stale_failure_without_bugs_is_selected(isolated_database: IsolatedDatabase) {
    let mut connection = isolated_database.connection;
    let pkg = insert_package("broken", "1.0-1", DUMMY_SUITE, &mut connection);
    insert_result(&pkg, "1.0-1", BuildStatus::Ftbfs, days_ago(5), &mut connection);
    let depwait = insert_package("waiting", "1.0-1", DUMMY_SUITE, &mut connection);
    insert_result(&depwait, "1.0-1", BuildStatus::Depwait, days_ago(4), &mut connection);
    insert_bugs(&depwait, "[]", &mut connection);

    let pkgs = selectors::stale_failures(
        DUMMY_SUITE,
        DUMMY_ARCHITECTURE,
        10,
        cutoffs().stale_failure,
        &mut connection,
    )
    .unwrap();
    assert_eq!(names(&pkgs), vec!["broken", "waiting"]);
}

#[rstest]
pub fn stale_failure_with_bugs_is_excluded(isolated_database: IsolatedDatabase) {
    let mut connection = isolated_database.connection;
    let pkg = insert_package("broken", "1.0-1", DUMMY_SUITE, &mut connection);
    insert_result(&pkg, "1.0-1", BuildStatus::Ftbfs, days_ago(5), &mut connection);
    insert_bugs(&pkg, "[1066666]", &mut connection);

    let pkgs = selectors::stale_failures(
        DUMMY_SUITE,
        DUMMY_ARCHITECTURE,
        10,
        cutoffs().stale_failure,
        &mut connection,
    )
    .unwrap();
    assert!(pkgs.is_empty());
}

#[rstest]
pub fn recent_failure_is_not_stale(isolated_database: IsolatedDatabase) {
    let mut connection = isolated_database.connection;
    let pkg = insert_package("broken", "1.0-1", DUMMY_SUITE, &mut connection);
    insert_result(&pkg, "1.0-1", BuildStatus::Ftbfs, days_ago(1), &mut connection);

    let pkgs = selectors::stale_failures(
        DUMMY_SUITE,
        DUMMY_ARCHITECTURE,
        10,
        cutoffs().stale_failure,
        &mut connection,
    )
    .unwrap();
    assert!(pkgs.is_empty());
}

#[rstest]
pub fn old_versions_respect_minimum_age(isolated_database: IsolatedDatabase) {
    let mut connection = isolated_database.connection;
    let old = insert_package("old", "1.0-1", DUMMY_SUITE, &mut connection);
    insert_result(&old, "1.0-1", BuildStatus::Reproducible, days_ago(30), &mut connection);
    let young = insert_package("young", "1.0-1", DUMMY_SUITE, &mut connection);
    insert_result(&young, "1.0-1", BuildStatus::Reproducible, days_ago(2), &mut connection);
    let blacklisted = insert_package("blacklisted", "1.0-1", DUMMY_SUITE, &mut connection);
    insert_result(&blacklisted, "1.0-1", BuildStatus::Blacklisted, days_ago(30), &mut connection);

    let pkgs = selectors::old_versions(
        DUMMY_SUITE,
        DUMMY_ARCHITECTURE,
        10,
        cutoffs().old_version,
        &mut connection,
    )
    .unwrap();
    assert_eq!(names(&pkgs), vec!["old"]);
}

#[rstest]
pub fn selectors_stay_in_their_suite(isolated_database: IsolatedDatabase) {
    let mut connection = isolated_database.connection;
    insert_package("elsewhere", "1.0-1", DUMMY_OTHER_SUITE, &mut connection);

    let pkgs = selectors::untested(DUMMY_SUITE, DUMMY_ARCHITECTURE, 10, &mut connection).unwrap();
    assert!(pkgs.is_empty());
}

#[rstest]
pub fn new_version_skips_queued(isolated_database: IsolatedDatabase) {
    let mut connection = isolated_database.connection;
    let pkg = insert_package("updated", "2.0-1", DUMMY_SUITE, &mut connection);
    insert_result(&pkg, "1.0-1", BuildStatus::Reproducible, days_ago(1), &mut connection);
    enqueue(&pkg, &mut connection);

    let pkgs =
        selectors::new_versions(DUMMY_SUITE, DUMMY_ARCHITECTURE, 10, &mut connection).unwrap();
    assert!(pkgs.is_empty());
}

#[rstest]
pub fn stale_failure_skips_queued(isolated_database: IsolatedDatabase) {
    let mut connection = isolated_database.connection;
    let pkg = insert_package("broken", "1.0-1", DUMMY_SUITE, &mut connection);
    insert_result(&pkg, "1.0-1", BuildStatus::Ftbfs, days_ago(5), &mut connection);
    enqueue(&pkg, &mut connection);

    let pkgs = selectors::stale_failures(
        DUMMY_SUITE,
        DUMMY_ARCHITECTURE,
        10,
        cutoffs().stale_failure,
        &mut connection,
    )
    .unwrap();
    assert!(pkgs.is_empty());
}

#[rstest]
pub fn old_version_skips_queued(isolated_database: IsolatedDatabase) {
    let mut connection = isolated_database.connection;
    let pkg = insert_package("old", "1.0-1", DUMMY_SUITE, &mut connection);
    insert_result(&pkg, "1.0-1", BuildStatus::Reproducible, days_ago(30), &mut connection);
    enqueue(&pkg, &mut connection);

    let pkgs = selectors::old_versions(
        DUMMY_SUITE,
        DUMMY_ARCHITECTURE,
        10,
        cutoffs().old_version,
        &mut connection,
    )
    .unwrap();
    assert!(pkgs.is_empty());
}
