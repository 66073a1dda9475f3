use crate::schema::*;
use chrono::prelude::*;
use diesel::prelude::*;
use reproducible_common::errors::*;

#[derive(Identifiable, Queryable, Selectable, Clone, PartialEq, Eq, Debug)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(table_name = manual_scheduler)]
pub struct ManualRequest {
    pub id: i32,
    pub package_id: i32,
    pub requester: String,
    pub requested_at: NaiveDateTime,
}

impl ManualRequest {
    /// Number of packages `my_requester` asked for since `cutoff`.
    pub fn count_since(
        my_requester: &str,
        cutoff: NaiveDateTime,
        connection: &mut SqliteConnection,
    ) -> Result<i64> {
        use crate::schema::manual_scheduler::dsl::*;
        let count = manual_scheduler
            .filter(requester.eq(my_requester))
            .filter(requested_at.gt(cutoff))
            .count()
            .get_result::<i64>(connection)?;
        Ok(count)
    }
}

#[derive(Insertable, PartialEq, Eq, Debug, Clone)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(table_name = manual_scheduler)]
pub struct NewManualRequest {
    pub package_id: i32,
    pub requester: String,
    pub requested_at: NaiveDateTime,
}

impl NewManualRequest {
    pub fn insert_batch(
        requests: &[NewManualRequest],
        connection: &mut SqliteConnection,
    ) -> Result<()> {
        for chunk in requests.chunks(1000) {
            diesel::insert_into(manual_scheduler::table)
                .values(chunk)
                .execute(connection)?;
        }
        Ok(())
    }
}
