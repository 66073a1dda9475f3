use crate::data::*;
use crate::fixtures::*;
use diesel::RunQueryDsl;
use reproducible_common::BuildStatus;
use reproducible_common::Priority;
use reproducible_scheduler::models::*;
use reproducible_scheduler::sync;
use rstest::rstest;

#[rstest]
pub fn sync_into_empty_database(isolated_database: IsolatedDatabase) {
    let mut connection = isolated_database.connection;

    let report = sync::run(
        DUMMY_SUITE,
        DUMMY_ARCHITECTURE,
        vec![entry("a", "1.0-1"), entry("b", "2.0-1")],
        now(),
        &mut connection,
    )
    .unwrap();

    assert_eq!(report.added, 2);
    assert_eq!(report.updated, 0);
    assert!(report.removed.is_empty());
    assert_eq!(
        SourcePackage::list_suite_arch(DUMMY_SUITE, DUMMY_ARCHITECTURE, &mut connection)
            .unwrap()
            .len(),
        2
    );
}

#[rstest]
pub fn new_version_is_updated_in_place(isolated_database: IsolatedDatabase) {
    let mut connection = isolated_database.connection;
    let a = insert_package("a", "1.0", DUMMY_SUITE, &mut connection);
    insert_result(&a, "1.0", BuildStatus::Reproducible, days_ago(2), &mut connection);

    let report = sync::run(
        DUMMY_SUITE,
        DUMMY_ARCHITECTURE,
        vec![entry("a", "1.1"), entry("b", "2.0")],
        now(),
        &mut connection,
    )
    .unwrap();
    assert_eq!(report.added, 1);
    assert_eq!(report.updated, 1);
    assert_eq!(report.total, 2);

    let updated = SourcePackage::get_by("a", DUMMY_SUITE, DUMMY_ARCHITECTURE, &mut connection)
        .unwrap()
        .unwrap();
    assert_eq!(updated.id, a.id);
    assert_eq!(updated.version, "1.1");

    // the test result of the previous version is kept
    let result = BuildResult::get_by_package(a.id, &mut connection)
        .unwrap()
        .unwrap();
    assert_eq!(result.version, "1.0");

    assert_eq!(
        SourcePackage::count_distinct_names(DUMMY_SUITE, DUMMY_ARCHITECTURE, &mut connection)
            .unwrap(),
        2
    );
}

#[rstest]
pub fn duplicate_entries_keep_greatest_version(isolated_database: IsolatedDatabase) {
    let mut connection = isolated_database.connection;

    sync::run(
        DUMMY_SUITE,
        DUMMY_ARCHITECTURE,
        vec![entry("a", "1.9"), entry("a", "1.10"), entry("a", "1.2")],
        now(),
        &mut connection,
    )
    .unwrap();

    let pkg = SourcePackage::get_by("a", DUMMY_SUITE, DUMMY_ARCHITECTURE, &mut connection)
        .unwrap()
        .unwrap();
    assert_eq!(pkg.version, "1.10");
}

#[rstest]
pub fn removed_package_is_cleaned_up(isolated_database: IsolatedDatabase) {
    let mut connection = isolated_database.connection;
    let a = insert_package("a", "1.0", DUMMY_SUITE, &mut connection);
    let b = insert_package("b", "1.0", DUMMY_SUITE, &mut connection);
    insert_result(&b, "1.0", BuildStatus::Ftbfs, days_ago(5), &mut connection);
    insert_bugs(&b, "[123456]", &mut connection);
    NewScheduleEntry::replace_batch(
        &[NewScheduleEntry::new(b.id, Priority::old_version(), now())],
        &mut connection,
    )
    .unwrap();

    let report = sync::run(
        DUMMY_SUITE,
        DUMMY_ARCHITECTURE,
        vec![entry("a", "1.0")],
        now(),
        &mut connection,
    )
    .unwrap();
    assert_eq!(report.removed, vec!["b".to_string()]);
    assert_eq!(report.added, 0);
    assert_eq!(report.updated, 0);

    assert!(
        SourcePackage::get_by("b", DUMMY_SUITE, DUMMY_ARCHITECTURE, &mut connection)
            .unwrap()
            .is_none()
    );
    assert!(BuildResult::get_by_package(b.id, &mut connection)
        .unwrap()
        .is_none());
    assert!(ScheduleEntry::get_by_package(b.id, &mut connection)
        .unwrap()
        .is_none());
    assert!(
        SourcePackage::get_by("a", DUMMY_SUITE, DUMMY_ARCHITECTURE, &mut connection)
            .unwrap()
            .is_some_and(|pkg| pkg.id == a.id)
    );

    let removed =
        RemovedPackage::list_suite_arch(DUMMY_SUITE, DUMMY_ARCHITECTURE, &mut connection).unwrap();
    assert_eq!(removed.len(), 1);
    assert_eq!(removed[0].name, "b");
    assert_eq!(removed[0].removed_at, now());
}

#[rstest]
pub fn other_suites_are_untouched(isolated_database: IsolatedDatabase) {
    let mut connection = isolated_database.connection;
    insert_package("a", "1.0", DUMMY_OTHER_SUITE, &mut connection);

    sync::run(
        DUMMY_SUITE,
        DUMMY_ARCHITECTURE,
        vec![entry("b", "1.0")],
        now(),
        &mut connection,
    )
    .unwrap();

    assert!(
        SourcePackage::get_by("a", DUMMY_OTHER_SUITE, DUMMY_ARCHITECTURE, &mut connection)
            .unwrap()
            .is_some()
    );
    assert!(
        RemovedPackage::list_suite_arch(DUMMY_OTHER_SUITE, DUMMY_ARCHITECTURE, &mut connection)
            .unwrap()
            .is_empty()
    );
}

#[rstest]
pub fn lower_version_is_not_a_downgrade(isolated_database: IsolatedDatabase) {
    let mut connection = isolated_database.connection;
    insert_package("a", "2.0", DUMMY_SUITE, &mut connection);

    let report = sync::run(
        DUMMY_SUITE,
        DUMMY_ARCHITECTURE,
        vec![entry("a", "1.0")],
        now(),
        &mut connection,
    )
    .unwrap();
    assert_eq!(report.updated, 0);

    let pkg = SourcePackage::get_by("a", DUMMY_SUITE, DUMMY_ARCHITECTURE, &mut connection)
        .unwrap()
        .unwrap();
    assert_eq!(pkg.version, "2.0");
}

#[rstest]
pub fn failed_sync_is_rolled_back(isolated_database: IsolatedDatabase) {
    let mut connection = isolated_database.connection;
    insert_package("a", "1.0", DUMMY_SUITE, &mut connection);
    insert_package("gone", "1.0", DUMMY_SUITE, &mut connection);
    diesel::sql_query(
        "CREATE TRIGGER reject_tombstones BEFORE INSERT ON removed_packages
         BEGIN SELECT RAISE(ABORT, 'tombstones are read-only'); END",
    )
    .execute(&mut connection)
    .unwrap();

    let err = sync::run(
        DUMMY_SUITE,
        DUMMY_ARCHITECTURE,
        vec![entry("a", "1.1"), entry("b", "2.0")],
        now(),
        &mut connection,
    )
    .unwrap_err();
    assert!(format!("{:#}", err).contains("tombstones are read-only"));

    let pkgs = SourcePackage::list_suite_arch(DUMMY_SUITE, DUMMY_ARCHITECTURE, &mut connection)
        .unwrap()
        .into_iter()
        .map(|pkg| (pkg.name, pkg.version))
        .collect::<Vec<_>>();
    assert_eq!(
        pkgs,
        vec![
            ("a".to_string(), "1.0".to_string()),
            ("gone".to_string(), "1.0".to_string()),
        ]
    );
}

#[rstest]
pub fn inconsistent_sync_is_rolled_back(isolated_database: IsolatedDatabase) {
    let mut connection = isolated_database.connection;
    insert_package("a", "1.0", DUMMY_SUITE, &mut connection);
    // swallow every newly inserted package so the count check fails
    diesel::sql_query(
        "CREATE TRIGGER swallow_new_packages AFTER INSERT ON sources
         BEGIN DELETE FROM sources WHERE id = NEW.id; END",
    )
    .execute(&mut connection)
    .unwrap();

    let err = sync::run(
        DUMMY_SUITE,
        DUMMY_ARCHITECTURE,
        vec![entry("a", "1.1"), entry("b", "2.0")],
        now(),
        &mut connection,
    )
    .unwrap_err();
    assert!(format!("{:#}", err).contains("inconsistent"));

    let pkg = SourcePackage::get_by("a", DUMMY_SUITE, DUMMY_ARCHITECTURE, &mut connection)
        .unwrap()
        .unwrap();
    assert_eq!(pkg.version, "1.0");
    assert!(
        RemovedPackage::list_suite_arch(DUMMY_SUITE, DUMMY_ARCHITECTURE, &mut connection)
            .unwrap()
            .is_empty()
    );
}
