#[cfg(feature = "diesel")]
use diesel::{
    deserialize::FromSql, serialize::Output, serialize::ToSql, sql_types::Text, sqlite::Sqlite,
    sqlite::SqliteValue, AsExpression, FromSqlRow,
};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::fmt::Formatter;
use std::str::FromStr;

/// The outcome of the latest reproducibility test of a source package, as written by the build
/// worker into the `results` table.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "diesel", derive(FromSqlRow, AsExpression))]
#[cfg_attr(feature = "diesel", diesel(sql_type = Text))]
#[cfg_attr(feature = "diesel", diesel(check_for_backend(diesel::sqlite::Sqlite)))]
pub enum BuildStatus {
    #[serde(rename = "reproducible")]
    Reproducible,

    #[serde(rename = "unreproducible")]
    Unreproducible,

    #[serde(rename = "FTBFS")]
    Ftbfs,

    #[serde(rename = "depwait")]
    Depwait,

    #[serde(rename = "blacklisted")]
    Blacklisted,

    #[serde(rename = "404")]
    NotFound,

    #[serde(rename = "not for us")]
    NotForUs,

    /// A result row exists but the worker hasn't filled in a status yet.
    #[serde(rename = "")]
    Empty,
}

impl BuildStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildStatus::Reproducible => "reproducible",
            BuildStatus::Unreproducible => "unreproducible",
            BuildStatus::Ftbfs => "FTBFS",
            BuildStatus::Depwait => "depwait",
            BuildStatus::Blacklisted => "blacklisted",
            BuildStatus::NotFound => "404",
            BuildStatus::NotForUs => "not for us",
            BuildStatus::Empty => "",
        }
    }

    /// Whether the build went far enough to produce a .buildinfo file.
    pub fn is_successful_build(&self) -> bool {
        matches!(
            self,
            BuildStatus::Reproducible | BuildStatus::Unreproducible
        )
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct BuildStatusParseError {
    value: String,
}

impl fmt::Display for BuildStatusParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let value = &self.value;
        write!(f, "could not parse \"{value}\" as a build status")
    }
}

impl Error for BuildStatusParseError {}

impl TryFrom<&str> for BuildStatus {
    type Error = BuildStatusParseError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "reproducible" => Ok(BuildStatus::Reproducible),
            "unreproducible" => Ok(BuildStatus::Unreproducible),
            "FTBFS" => Ok(BuildStatus::Ftbfs),
            "depwait" => Ok(BuildStatus::Depwait),
            "blacklisted" => Ok(BuildStatus::Blacklisted),
            "404" => Ok(BuildStatus::NotFound),
            "not for us" => Ok(BuildStatus::NotForUs),
            "" => Ok(BuildStatus::Empty),
            _ => Err(BuildStatusParseError {
                value: value.to_string(),
            }),
        }
    }
}

impl FromStr for BuildStatus {
    type Err = BuildStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BuildStatus::try_from(s)
    }
}

#[cfg(feature = "diesel")]
impl FromSql<Text, Sqlite> for BuildStatus {
    fn from_sql(bytes: SqliteValue) -> diesel::deserialize::Result<Self> {
        let t = <String as FromSql<Text, Sqlite>>::from_sql(bytes)?;
        Ok(t.as_str().try_into()?)
    }
}

#[cfg(feature = "diesel")]
impl ToSql<Text, Sqlite> for BuildStatus {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Sqlite>) -> diesel::serialize::Result {
        out.set_value(self.as_str());
        Ok(diesel::serialize::IsNull::No)
    }
}
