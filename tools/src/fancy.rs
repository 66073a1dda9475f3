use colored::Colorize;
use reproducible_common::{BuildStatus, Priority};

pub trait Fancy {
    fn fancy(&self) -> String;
}

impl Fancy for BuildStatus {
    fn fancy(&self) -> String {
        match self {
            BuildStatus::Reproducible => self.to_string().green().to_string(),
            BuildStatus::Unreproducible => self.to_string().red().to_string(),
            BuildStatus::Ftbfs | BuildStatus::Depwait => self.to_string().red().to_string(),
            BuildStatus::Blacklisted | BuildStatus::NotForUs => {
                self.to_string().bright_black().to_string()
            }
            BuildStatus::NotFound | BuildStatus::Empty => self.to_string().yellow().to_string(),
        }
    }
}

impl Fancy for Priority {
    fn fancy(&self) -> String {
        let s = format!("{:>2}", self.value());
        if *self == Priority::manual() {
            s.green().bold().to_string()
        } else if *self <= Priority::untested() {
            s.yellow().to_string()
        } else {
            s.bright_black().to_string()
        }
    }
}
