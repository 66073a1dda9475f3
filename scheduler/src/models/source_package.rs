use crate::schema::*;
use diesel::prelude::*;
use reproducible_common::errors::*;

#[derive(Identifiable, Queryable, Selectable, AsChangeset, Clone, PartialEq, Eq, Debug)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(table_name = sources)]
pub struct SourcePackage {
    pub id: i32,
    pub name: String,
    pub version: String,
    pub suite: String,
    pub architecture: String,
    pub notify_maintainer: i32,
}

impl SourcePackage {
    pub fn get_by(
        my_name: &str,
        my_suite: &str,
        my_architecture: &str,
        connection: &mut SqliteConnection,
    ) -> Result<Option<SourcePackage>> {
        use crate::schema::sources::dsl::*;
        let pkg = sources
            .filter(name.eq(my_name))
            .filter(suite.eq(my_suite))
            .filter(architecture.eq(my_architecture))
            .select(SourcePackage::as_select())
            .first::<SourcePackage>(connection)
            .optional()?;
        Ok(pkg)
    }

    pub fn list_suite_arch(
        my_suite: &str,
        my_architecture: &str,
        connection: &mut SqliteConnection,
    ) -> Result<Vec<SourcePackage>> {
        use crate::schema::sources::dsl::*;
        let pkgs = sources
            .filter(suite.eq(my_suite))
            .filter(architecture.eq(my_architecture))
            .order_by(name)
            .select(SourcePackage::as_select())
            .load::<SourcePackage>(connection)?;
        Ok(pkgs)
    }

    pub fn count_distinct_names(
        my_suite: &str,
        my_architecture: &str,
        connection: &mut SqliteConnection,
    ) -> Result<i64> {
        use crate::schema::sources::dsl::*;
        let count = sources
            .filter(suite.eq(my_suite))
            .filter(architecture.eq(my_architecture))
            .select(diesel::dsl::count(name).aggregate_distinct())
            .get_result::<i64>(connection)?;
        Ok(count)
    }

    /// Names known in any suite or architecture.
    pub fn list_all_names(connection: &mut SqliteConnection) -> Result<Vec<String>> {
        use crate::schema::sources::dsl::*;
        let names = sources
            .select(name)
            .distinct()
            .order_by(name)
            .load::<String>(connection)?;
        Ok(names)
    }

    /// Only the version changes, the id and the maintainer notification flag stay as they are.
    pub fn update_version(&self, connection: &mut SqliteConnection) -> Result<()> {
        use crate::schema::sources::columns::*;
        diesel::update(sources::table.filter(id.eq(self.id)))
            .set(version.eq(&self.version))
            .execute(connection)?;
        Ok(())
    }

    /// Delete packages together with everything that references them.
    pub fn delete_multiple(ids: &[i32], connection: &mut SqliteConnection) -> Result<()> {
        diesel::delete(results::table.filter(results::package_id.eq_any(ids)))
            .execute(connection)?;
        diesel::delete(schedule::table.filter(schedule::package_id.eq_any(ids)))
            .execute(connection)?;
        diesel::delete(notes::table.filter(notes::package_id.eq_any(ids)))
            .execute(connection)?;
        diesel::delete(sources::table.filter(sources::id.eq_any(ids))).execute(connection)?;
        Ok(())
    }
}

#[derive(Insertable, PartialEq, Eq, Debug, Clone)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(table_name = sources)]
pub struct NewSourcePackage {
    pub name: String,
    pub version: String,
    pub suite: String,
    pub architecture: String,
}

impl NewSourcePackage {
    pub fn insert(&self, connection: &mut SqliteConnection) -> Result<SourcePackage> {
        diesel::insert_into(sources::table)
            .values(self)
            .execute(connection)?;
        SourcePackage::get_by(&self.name, &self.suite, &self.architecture, connection)?
            .ok_or_else(|| anyhow!("Failed to find freshly inserted package: {:?}", self.name))
    }

    pub fn insert_batch(pkgs: &[NewSourcePackage], connection: &mut SqliteConnection) -> Result<()> {
        diesel::insert_into(sources::table)
            .values(pkgs)
            .execute(connection)?;
        Ok(())
    }
}
