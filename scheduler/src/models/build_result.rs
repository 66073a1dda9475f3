use crate::schema::*;
use chrono::prelude::*;
use diesel::prelude::*;
use reproducible_common::errors::*;
use reproducible_common::BuildStatus;

#[derive(Identifiable, Queryable, Selectable, AsChangeset, Clone, PartialEq, Eq, Debug)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(table_name = results)]
pub struct BuildResult {
    pub id: i32,
    pub package_id: i32,
    pub version: String,
    pub status: BuildStatus,
    pub build_date: Option<NaiveDateTime>,
    pub build_duration: Option<i32>,
}

impl BuildResult {
    pub fn get_by_package(
        my_package_id: i32,
        connection: &mut SqliteConnection,
    ) -> Result<Option<BuildResult>> {
        use crate::schema::results::dsl::*;
        let result = results
            .filter(package_id.eq(my_package_id))
            .select(BuildResult::as_select())
            .first::<BuildResult>(connection)
            .optional()?;
        Ok(result)
    }
}

/// Results are written by the build worker, this is used to seed the store in tests and tools.
#[derive(Insertable, PartialEq, Eq, Debug, Clone)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(table_name = results)]
#[diesel(treat_none_as_default_value = false)]
pub struct NewBuildResult {
    pub package_id: i32,
    pub version: String,
    pub status: BuildStatus,
    pub build_date: Option<NaiveDateTime>,
    pub build_duration: Option<i32>,
}

impl NewBuildResult {
    pub fn upsert(&self, connection: &mut SqliteConnection) -> Result<()> {
        diesel::replace_into(results::table)
            .values(self)
            .execute(connection)?;
        Ok(())
    }
}
