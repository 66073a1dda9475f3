use crate::schema::*;
use diesel::prelude::*;
use reproducible_common::errors::*;

#[derive(Identifiable, Queryable, Selectable, Clone, PartialEq, Eq, Debug)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(table_name = notes)]
pub struct Note {
    pub id: i32,
    pub package_id: i32,
    pub version: Option<String>,
    pub issues: Option<String>,
    pub bugs: Option<String>,
    pub comments: Option<String>,
}

impl Note {
    /// Whether a bug was filed for this package. Notes are imported with `[]` for an empty list.
    pub fn has_bugs(&self) -> bool {
        match self.bugs.as_deref() {
            None | Some("") | Some("[]") => false,
            Some(_) => true,
        }
    }
}

#[derive(Insertable, PartialEq, Eq, Debug, Clone, Default)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(table_name = notes)]
#[diesel(treat_none_as_default_value = false)]
pub struct NewNote {
    pub package_id: i32,
    pub version: Option<String>,
    pub issues: Option<String>,
    pub bugs: Option<String>,
    pub comments: Option<String>,
}

impl NewNote {
    pub fn upsert(&self, connection: &mut SqliteConnection) -> Result<()> {
        diesel::replace_into(notes::table)
            .values(self)
            .execute(connection)?;
        Ok(())
    }
}
