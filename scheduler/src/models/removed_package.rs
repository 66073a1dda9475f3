use crate::schema::*;
use chrono::prelude::*;
use diesel::prelude::*;
use reproducible_common::errors::*;

#[derive(Identifiable, Queryable, Selectable, Clone, PartialEq, Eq, Debug)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(table_name = removed_packages)]
pub struct RemovedPackage {
    pub id: i32,
    pub name: String,
    pub suite: String,
    pub architecture: String,
    pub removed_at: NaiveDateTime,
}

impl RemovedPackage {
    pub fn list_suite_arch(
        my_suite: &str,
        my_architecture: &str,
        connection: &mut SqliteConnection,
    ) -> Result<Vec<RemovedPackage>> {
        use crate::schema::removed_packages::dsl::*;
        let removed = removed_packages
            .filter(suite.eq(my_suite))
            .filter(architecture.eq(my_architecture))
            .order_by((removed_at, id))
            .select(RemovedPackage::as_select())
            .load::<RemovedPackage>(connection)?;
        Ok(removed)
    }
}

#[derive(Insertable, PartialEq, Eq, Debug, Clone)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(table_name = removed_packages)]
pub struct NewRemovedPackage {
    pub name: String,
    pub suite: String,
    pub architecture: String,
    pub removed_at: NaiveDateTime,
}

impl NewRemovedPackage {
    pub fn insert_batch(
        removed: &[NewRemovedPackage],
        connection: &mut SqliteConnection,
    ) -> Result<()> {
        diesel::insert_into(removed_packages::table)
            .values(removed)
            .execute(connection)?;
        Ok(())
    }
}
