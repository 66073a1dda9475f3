#[cfg(feature = "diesel")]
use diesel::{
    deserialize::FromSql,
    serialize::{IsNull, Output, ToSql},
    sql_types::Integer,
    sqlite::{Sqlite, SqliteValue},
    {AsExpression, FromSqlRow},
};
use serde::{Deserialize, Serialize};

/// Represents the priority of a schedule entry. The build worker picks up entries sorted by
/// priority and then by scheduling date, so the lower this number is, the earlier the package is
/// built.
///
/// There are utility functions on the type for the priorities of each scheduling category. They
/// are only defaults, the scheduler reads the effective values from the config file.
/// ```
/// use reproducible_common::Priority;
///
/// assert_eq!(Priority::from(0), Priority::manual());
/// assert_eq!(Priority::from(1), Priority::new_version());
/// assert!(Priority::new_version() < Priority::untested());
/// assert!(Priority::stale_failure() < Priority::old_version());
/// ```
#[derive(Serialize, Deserialize, Debug, Eq, PartialEq, Ord, PartialOrd, Copy, Clone)]
#[serde(transparent)]
#[cfg_attr(feature = "diesel", derive(FromSqlRow, AsExpression))]
#[cfg_attr(feature = "diesel", diesel(sql_type = Integer))]
#[cfg_attr(feature = "diesel", diesel(check_for_backend(diesel::sqlite::Sqlite)))]
pub struct Priority(i32);

impl Priority {
    const MANUAL_PRIORITY: i32 = 0;
    const NEW_VERSION_PRIORITY: i32 = Self::MANUAL_PRIORITY + 1;
    const UNTESTED_PRIORITY: i32 = Self::NEW_VERSION_PRIORITY + 1;
    const STALE_FAILURE_PRIORITY: i32 = Self::UNTESTED_PRIORITY + 1;
    const OLD_VERSION_PRIORITY: i32 = Self::STALE_FAILURE_PRIORITY + 1;

    /// Packages an operator asked for explicitly.
    pub fn manual() -> Self {
        Priority(Self::MANUAL_PRIORITY)
    }

    /// New uploads should be tested promptly, even ahead of never tested packages.
    pub fn new_version() -> Self {
        Priority(Self::NEW_VERSION_PRIORITY)
    }

    pub fn untested() -> Self {
        Priority(Self::UNTESTED_PRIORITY)
    }

    pub fn stale_failure() -> Self {
        Priority(Self::STALE_FAILURE_PRIORITY)
    }

    pub fn old_version() -> Self {
        Priority(Self::OLD_VERSION_PRIORITY)
    }

    pub fn value(&self) -> i32 {
        self.0
    }
}

#[cfg(feature = "diesel")]
impl FromSql<Integer, Sqlite> for Priority {
    fn from_sql(bytes: SqliteValue) -> diesel::deserialize::Result<Self> {
        let value = <i32 as FromSql<Integer, Sqlite>>::from_sql(bytes)?;
        Ok(Priority(value))
    }
}

#[cfg(feature = "diesel")]
impl ToSql<Integer, Sqlite> for Priority {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Sqlite>) -> diesel::serialize::Result {
        out.set_value(self.0);
        Ok(IsNull::No)
    }
}

impl From<i32> for Priority {
    fn from(value: i32) -> Self {
        Priority(value)
    }
}
