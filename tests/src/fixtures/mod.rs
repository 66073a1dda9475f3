use crate::data::{DUMMY_ARCHITECTURE, DUMMY_SUITE};
use diesel::SqliteConnection;
use reproducible_common::config::ScheduleConfig;
use reproducible_common::errors::*;
use reproducible_scheduler::db;
use reproducible_scheduler::notify::Notify;
use rstest::fixture;
use std::cell::RefCell;
use tempfile::TempDir;

pub struct IsolatedDatabase {
    _dir: TempDir,
    pub connection: SqliteConnection,
}

#[fixture]
pub fn isolated_database() -> IsolatedDatabase {
    let _ = env_logger::builder().is_test(true).try_init();

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("reproducible.db");
    info!("Setting up database at {:?}", path);
    let connection = db::setup(path.to_str().unwrap()).unwrap();

    IsolatedDatabase {
        _dir: dir,
        connection,
    }
}

#[fixture]
pub fn schedule_config() -> ScheduleConfig {
    ScheduleConfig {
        suites: Some(vec![DUMMY_SUITE.to_string()]),
        architectures: Some(vec![DUMMY_ARCHITECTURE.to_string()]),
        ..Default::default()
    }
}

/// Keeps every message instead of sending it anywhere.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    pub messages: RefCell<Vec<String>>,
}

impl Notify for RecordingNotifier {
    fn notify(&self, message: &str) -> Result<()> {
        self.messages.borrow_mut().push(message.to_string());
        Ok(())
    }
}

#[fixture]
pub fn notifier() -> RecordingNotifier {
    RecordingNotifier::default()
}
