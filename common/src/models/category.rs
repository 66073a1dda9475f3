use crate::models::Priority;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::fmt::Formatter;
use std::str::FromStr;

/// The reasons a package can get scheduled automatically. The order of `Category::ALL` is the
/// order the scheduler evaluates them in, earlier categories get the first claim on queue capacity.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "untested")]
    Untested,
    #[serde(rename = "new")]
    NewVersion,
    #[serde(rename = "ftbfs+depwait")]
    StaleFailure,
    #[serde(rename = "old")]
    OldVersion,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Untested,
        Category::NewVersion,
        Category::StaleFailure,
        Category::OldVersion,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Untested => "untested",
            Category::NewVersion => "new",
            Category::StaleFailure => "ftbfs+depwait",
            Category::OldVersion => "old",
        }
    }

    /// Human readable description of what a package in this category is, used in notifications.
    pub fn label(&self) -> &'static str {
        match self {
            Category::Untested => "new packages",
            Category::NewVersion => "new versions",
            Category::StaleFailure => "ftbfs and depwait versions without bugs filed",
            Category::OldVersion => "known versions",
        }
    }

    pub fn default_priority(&self) -> Priority {
        match self {
            Category::Untested => Priority::untested(),
            Category::NewVersion => Priority::new_version(),
            Category::StaleFailure => Priority::stale_failure(),
            Category::OldVersion => Priority::old_version(),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct CategoryParseError {
    value: String,
}

impl fmt::Display for CategoryParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let value = &self.value;
        write!(f, "could not parse \"{value}\" as a scheduling category")
    }
}

impl Error for CategoryParseError {}

impl FromStr for Category {
    type Err = CategoryParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "untested" => Ok(Category::Untested),
            "new" => Ok(Category::NewVersion),
            "ftbfs+depwait" => Ok(Category::StaleFailure),
            "old" => Ok(Category::OldVersion),
            _ => Err(CategoryParseError {
                value: s.to_string(),
            }),
        }
    }
}
