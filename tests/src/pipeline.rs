use crate::data::*;
use crate::fixtures::*;
use crate::setup::*;
use diesel::RunQueryDsl;
use reproducible_common::config::{ArchConfig, ScheduleConfig};
use reproducible_common::{BuildStatus, Category, Priority};
use reproducible_scheduler::models::ScheduleEntry;
use reproducible_scheduler::pipeline::{Mode, Scheduler};
use reproducible_scheduler::quota::{Allowance, QuotaPolicy, Tier};
use rstest::rstest;

fn flat_policy(untested: u32, new: u32, stale: u32, old: u32) -> QuotaPolicy {
    let mut policy = QuotaPolicy::empty();
    for (category, n) in [
        (Category::Untested, untested),
        (Category::NewVersion, new),
        (Category::StaleFailure, stale),
        (Category::OldVersion, old),
    ] {
        policy.set(category, DUMMY_ARCHITECTURE, DUMMY_SUITE, Allowance::Flat(n));
    }
    policy
}

#[rstest]
pub fn untested_limited_by_quota(
    isolated_database: IsolatedDatabase,
    schedule_config: ScheduleConfig,
    notifier: RecordingNotifier,
) {
    let mut connection = isolated_database.connection;
    setup_untested_packages(10, &mut connection);
    let policy = flat_policy(3, 0, 0, 0);

    let scheduler = Scheduler {
        config: &schedule_config,
        policy: &policy,
        notifier: &notifier,
    };
    let report = scheduler
        .run_arch(DUMMY_ARCHITECTURE, now(), &mut connection)
        .unwrap();

    assert_eq!(report.mode, Mode::Full);
    assert_eq!(report.scheduled, 3);
    assert_eq!(
        ScheduleEntry::count_for_arch(DUMMY_ARCHITECTURE, &mut connection).unwrap(),
        3
    );
    assert_eq!(
        report.message.as_deref(),
        Some("Scheduled in unstable (amd64): 3 new packages, for 3 packages in total.")
    );
    assert_eq!(*notifier.messages.borrow(), vec![report.message.unwrap()]);
}

#[rstest]
pub fn package_is_only_queued_once(
    isolated_database: IsolatedDatabase,
    schedule_config: ScheduleConfig,
    notifier: RecordingNotifier,
) {
    let mut connection = isolated_database.connection;
    // qualifies as new version and as old version
    let pkg = insert_package("both", "2.0-1", DUMMY_SUITE, &mut connection);
    insert_result(&pkg, "1.0-1", BuildStatus::Reproducible, days_ago(60), &mut connection);
    let policy = flat_policy(10, 10, 10, 10);

    let scheduler = Scheduler {
        config: &schedule_config,
        policy: &policy,
        notifier: &notifier,
    };
    let report = scheduler
        .run_arch(DUMMY_ARCHITECTURE, now(), &mut connection)
        .unwrap();
    assert_eq!(report.scheduled, 1);

    let entry = ScheduleEntry::get_by_package(pkg.id, &mut connection)
        .unwrap()
        .unwrap();
    assert_eq!(entry.priority, Priority::new_version());
    assert_eq!(entry.date_scheduled, now());
    assert_eq!(
        report.message.as_deref(),
        Some("Scheduled in unstable (amd64): 1 new versions, for 1 packages in total.")
    );
}

#[rstest]
pub fn busy_architecture_only_gets_new_versions(
    isolated_database: IsolatedDatabase,
    mut schedule_config: ScheduleConfig,
    notifier: RecordingNotifier,
) {
    let mut connection = isolated_database.connection;
    schedule_config.arch.insert(
        DUMMY_ARCHITECTURE.to_string(),
        ArchConfig {
            maximum: Some(2),
            ..Default::default()
        },
    );
    setup_queued_packages(3, &mut connection);
    setup_untested_packages(5, &mut connection);
    let pkg = insert_package("updated", "2.0-1", DUMMY_SUITE, &mut connection);
    insert_result(&pkg, "1.0-1", BuildStatus::Reproducible, days_ago(1), &mut connection);
    let policy = flat_policy(10, 10, 10, 10);

    let scheduler = Scheduler {
        config: &schedule_config,
        policy: &policy,
        notifier: &notifier,
    };
    let report = scheduler
        .run_arch(DUMMY_ARCHITECTURE, now(), &mut connection)
        .unwrap();

    assert_eq!(report.depth, 3);
    assert_eq!(report.mode, Mode::NewVersionsOnly);
    assert_eq!(report.scheduled, 1);
    assert!(ScheduleEntry::get_by_package(pkg.id, &mut connection)
        .unwrap()
        .is_some());
}

#[rstest]
pub fn full_queue_is_skipped(
    isolated_database: IsolatedDatabase,
    mut schedule_config: ScheduleConfig,
    notifier: RecordingNotifier,
) {
    let mut connection = isolated_database.connection;
    schedule_config.arch.insert(
        DUMMY_ARCHITECTURE.to_string(),
        ArchConfig {
            maximum: Some(1),
            ..Default::default()
        },
    );
    setup_queued_packages(3, &mut connection);
    setup_untested_packages(5, &mut connection);
    let policy = flat_policy(10, 10, 10, 10);

    let scheduler = Scheduler {
        config: &schedule_config,
        policy: &policy,
        notifier: &notifier,
    };
    let report = scheduler
        .run_arch(DUMMY_ARCHITECTURE, now(), &mut connection)
        .unwrap();

    assert_eq!(report.mode, Mode::Skip);
    assert_eq!(report.scheduled, 0);
    assert!(report.message.is_none());
    assert!(notifier.messages.borrow().is_empty());
    assert_eq!(
        ScheduleEntry::count_for_arch(DUMMY_ARCHITECTURE, &mut connection).unwrap(),
        3
    );
}

#[rstest]
pub fn nothing_to_schedule_is_not_announced(
    isolated_database: IsolatedDatabase,
    schedule_config: ScheduleConfig,
    notifier: RecordingNotifier,
) {
    let mut connection = isolated_database.connection;
    let policy = flat_policy(10, 10, 10, 10);

    let scheduler = Scheduler {
        config: &schedule_config,
        policy: &policy,
        notifier: &notifier,
    };
    let reports = scheduler.run(now(), &mut connection).unwrap();

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].scheduled, 0);
    assert!(notifier.messages.borrow().is_empty());
}

#[rstest]
pub fn running_total_tightens_later_quotas(
    isolated_database: IsolatedDatabase,
    schedule_config: ScheduleConfig,
    notifier: RecordingNotifier,
) {
    let mut connection = isolated_database.connection;
    setup_untested_packages(5, &mut connection);
    let pkg = insert_package("updated", "2.0-1", DUMMY_SUITE, &mut connection);
    insert_result(&pkg, "1.0-1", BuildStatus::Reproducible, days_ago(1), &mut connection);

    let mut policy = flat_policy(5, 0, 0, 0);
    // new versions are only allowed while fewer than 5 packages are queued
    policy.set(
        Category::NewVersion,
        DUMMY_ARCHITECTURE,
        DUMMY_SUITE,
        Allowance::Tiered {
            tiers: vec![Tier {
                threshold: 4,
                allowance: 10,
            }],
            default: 0,
        },
    );

    let scheduler = Scheduler {
        config: &schedule_config,
        policy: &policy,
        notifier: &notifier,
    };
    let report = scheduler
        .run_arch(DUMMY_ARCHITECTURE, now(), &mut connection)
        .unwrap();

    assert_eq!(report.scheduled, 5);
    assert!(ScheduleEntry::get_by_package(pkg.id, &mut connection)
        .unwrap()
        .is_none());
}

#[rstest]
pub fn failed_pass_is_rolled_back_and_not_announced(
    isolated_database: IsolatedDatabase,
    schedule_config: ScheduleConfig,
    notifier: RecordingNotifier,
) {
    let mut connection = isolated_database.connection;
    setup_queued_packages(2, &mut connection);
    setup_untested_packages(5, &mut connection);
    diesel::sql_query(
        "CREATE TRIGGER reject_schedule BEFORE INSERT ON schedule
         BEGIN SELECT RAISE(ABORT, 'queue is read-only'); END",
    )
    .execute(&mut connection)
    .unwrap();
    let policy = flat_policy(10, 10, 10, 10);

    let scheduler = Scheduler {
        config: &schedule_config,
        policy: &policy,
        notifier: &notifier,
    };
    let err = scheduler
        .run_arch(DUMMY_ARCHITECTURE, now(), &mut connection)
        .unwrap_err();
    assert!(format!("{:#}", err).contains("queue is read-only"));

    assert_eq!(
        ScheduleEntry::count_for_arch(DUMMY_ARCHITECTURE, &mut connection).unwrap(),
        2
    );
    assert!(notifier.messages.borrow().is_empty());
}
