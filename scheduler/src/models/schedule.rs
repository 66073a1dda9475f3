use crate::models::SourcePackage;
use crate::schema::*;
use chrono::prelude::*;
use diesel::prelude::*;
use reproducible_common::errors::*;
use reproducible_common::Priority;
use serde::Serialize;

#[derive(Identifiable, Queryable, Selectable, AsChangeset, Serialize, Clone, PartialEq, Eq, Debug)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(table_name = schedule)]
pub struct ScheduleEntry {
    pub id: i32,
    pub package_id: i32,
    pub date_scheduled: NaiveDateTime,
    pub priority: Priority,
    pub save_artifacts: bool,
    pub notify: i32,
    pub scheduler: Option<String>,
    pub message: Option<String>,
    pub build_started_at: Option<NaiveDateTime>,
}

impl ScheduleEntry {
    pub fn get_by_package(
        my_package_id: i32,
        connection: &mut SqliteConnection,
    ) -> Result<Option<ScheduleEntry>> {
        use crate::schema::schedule::dsl::*;
        let item = schedule
            .filter(package_id.eq(my_package_id))
            .select(ScheduleEntry::as_select())
            .first::<ScheduleEntry>(connection)
            .optional()?;
        Ok(item)
    }

    /// Everything queued for an architecture, across all suites.
    pub fn count_for_arch(my_architecture: &str, connection: &mut SqliteConnection) -> Result<i64> {
        let count = schedule::table
            .inner_join(sources::table)
            .filter(sources::architecture.eq(my_architecture))
            .count()
            .get_result::<i64>(connection)?;
        Ok(count)
    }

    pub fn count_for_suite_arch(
        my_suite: &str,
        my_architecture: &str,
        connection: &mut SqliteConnection,
    ) -> Result<i64> {
        let count = schedule::table
            .inner_join(sources::table)
            .filter(sources::suite.eq(my_suite))
            .filter(sources::architecture.eq(my_architecture))
            .count()
            .get_result::<i64>(connection)?;
        Ok(count)
    }

    /// List the queue in pickup order.
    pub fn list(
        my_architecture: Option<&str>,
        limit: Option<i64>,
        connection: &mut SqliteConnection,
    ) -> Result<Vec<(ScheduleEntry, SourcePackage)>> {
        let mut query = schedule::table
            .inner_join(sources::table)
            .select((ScheduleEntry::as_select(), SourcePackage::as_select()))
            .order_by((schedule::priority, schedule::date_scheduled, schedule::id))
            .into_boxed();

        if let Some(arch) = my_architecture {
            query = query.filter(sources::architecture.eq(arch));
        }
        if let Some(limit) = limit {
            query = query.limit(limit);
        }

        let results = query.load::<(ScheduleEntry, SourcePackage)>(connection)?;
        Ok(results)
    }
}

#[derive(Insertable, Serialize, PartialEq, Eq, Debug, Clone)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(table_name = schedule)]
#[diesel(treat_none_as_default_value = false)]
pub struct NewScheduleEntry {
    pub package_id: i32,
    pub date_scheduled: NaiveDateTime,
    pub priority: Priority,
    pub save_artifacts: bool,
    pub notify: i32,
    pub scheduler: Option<String>,
    pub message: Option<String>,
}

impl NewScheduleEntry {
    pub fn new(package_id: i32, priority: Priority, date_scheduled: NaiveDateTime) -> Self {
        NewScheduleEntry {
            package_id,
            date_scheduled,
            priority,
            save_artifacts: false,
            notify: 0,
            scheduler: None,
            message: None,
        }
    }

    /// Insert the entries, replacing any row already queued for the same package.
    pub fn replace_batch(
        entries: &[NewScheduleEntry],
        connection: &mut SqliteConnection,
    ) -> Result<()> {
        for chunk in entries.chunks(1000) {
            diesel::replace_into(schedule::table)
                .values(chunk)
                .execute(connection)?;
        }
        Ok(())
    }
}
