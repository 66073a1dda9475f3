use crate::errors::*;
use crate::models::{Category, Priority};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_DB_PATH: &str = "/var/lib/jenkins/reproducible.db";
pub const DEFAULT_MIRROR: &str = "http://ftp.de.debian.org/debian";
pub const DEFAULT_COMPONENT: &str = "main";
pub const DEFAULT_ARTIFACTS_BASE: &str = "/var/lib/jenkins/userContent/reproducible";

pub const DEFAULT_ARCHITECTURES: &[&str] = &["amd64", "armhf"];
pub const DEFAULT_MAXIMUM: u32 = 750;
pub const DEFAULT_MINIMUM_AGE: i64 = 7;
pub const DEFAULT_FTBFS_GRACE_DAYS: i64 = 3;

pub const DEFAULT_MANUAL_DAILY_LIMIT: usize = 200;
pub const DEFAULT_MANUAL_NOTIFY_LIMIT: usize = 50;

pub fn load<P: AsRef<Path>>(path: Option<P>) -> Result<ConfigFile> {
    let mut config = ConfigFile::default();

    if let Some(c) = load_from("/etc/reproducible.conf")? {
        config.update(c);
    }

    if let Ok(path) = config_path() {
        if let Some(c) = load_from(path)? {
            config.update(c);
        }
    }

    if let Some(path) = path {
        let c = load_from(path)?.ok_or_else(|| format_err!("Failed to read config file"))?;
        config.update(c);
    }

    Ok(config)
}

fn config_path() -> Result<PathBuf> {
    let config_dir =
        dirs_next::config_dir().ok_or_else(|| format_err!("Failed to find config dir"))?;
    Ok(config_dir.join("reproducible.conf"))
}

fn load_from<P: AsRef<Path>>(path: P) -> Result<Option<ConfigFile>> {
    if let Ok(buf) = fs::read_to_string(path.as_ref()) {
        debug!("loading config file {:?}", path.as_ref());
        let config = toml::from_str(&buf)
            .with_context(|| anyhow!("Failed to load config {:?}", path.as_ref()))?;
        Ok(Some(config))
    } else {
        Ok(None)
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub mirror: MirrorConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub manual: ManualConfig,
    #[serde(default)]
    pub paths: PathsConfig,
}

impl ConfigFile {
    pub fn update(&mut self, c: ConfigFile) {
        self.db.update(c.db);
        self.mirror.update(c.mirror);
        self.schedule.update(c.schedule);
        self.notify.update(c.notify);
        self.manual.update(c.manual);
        self.paths.update(c.paths);
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct DbConfig {
    pub path: Option<String>,
}

impl DbConfig {
    pub fn update(&mut self, c: DbConfig) {
        if c.path.is_some() {
            self.path = c.path;
        }
    }

    pub fn path(&self) -> String {
        if let Ok(path) = env::var("REPRODUCIBLE_DB") {
            path
        } else if let Some(path) = &self.path {
            path.clone()
        } else {
            DEFAULT_DB_PATH.to_string()
        }
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct MirrorConfig {
    pub url: Option<String>,
    pub component: Option<String>,
}

impl MirrorConfig {
    pub fn update(&mut self, c: MirrorConfig) {
        if c.url.is_some() {
            self.url = c.url;
        }
        if c.component.is_some() {
            self.component = c.component;
        }
    }

    pub fn url(&self) -> &str {
        self.url.as_deref().unwrap_or(DEFAULT_MIRROR)
    }

    pub fn component(&self) -> &str {
        self.component.as_deref().unwrap_or(DEFAULT_COMPONENT)
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct ScheduleConfig {
    pub suites: Option<Vec<String>>,
    pub architectures: Option<Vec<String>>,
    #[serde(default)]
    pub arch: BTreeMap<String, ArchConfig>,
    pub ftbfs_grace_days: Option<i64>,
    #[serde(default)]
    pub priorities: PrioritiesConfig,
    #[serde(default)]
    pub limits: Vec<LimitConfig>,
}

impl ScheduleConfig {
    pub fn update(&mut self, c: ScheduleConfig) {
        if c.suites.is_some() {
            self.suites = c.suites;
        }
        if c.architectures.is_some() {
            self.architectures = c.architectures;
        }
        for (k, v) in c.arch {
            if let Some(o) = self.arch.get_mut(&k) {
                o.update(v);
            } else {
                self.arch.insert(k, v);
            }
        }
        if c.ftbfs_grace_days.is_some() {
            self.ftbfs_grace_days = c.ftbfs_grace_days;
        }
        self.priorities.update(c.priorities);
        self.limits.extend(c.limits);
    }

    pub fn suites(&self) -> Vec<String> {
        if let Some(suites) = &self.suites {
            suites.clone()
        } else {
            crate::DEFAULT_SUITES.iter().map(|s| s.to_string()).collect()
        }
    }

    pub fn architectures(&self) -> Vec<String> {
        if let Some(architectures) = &self.architectures {
            architectures.clone()
        } else {
            DEFAULT_ARCHITECTURES.iter().map(|s| s.to_string()).collect()
        }
    }

    /// Resolve the settings of an architecture, filling in the values of the production farm for
    /// anything the config files don't mention.
    pub fn arch_settings(&self, arch: &str) -> ArchSettings {
        let mut settings = ArchSettings::builtin(arch);
        if let Some(c) = self.arch.get(arch) {
            if let Some(maximum) = c.maximum {
                settings.maximum = maximum;
            }
            if let Some(minimum_age) = c.minimum_age {
                settings.minimum_age = minimum_age;
            }
            if let Some(skip_suites) = &c.skip_suites {
                settings.skip_suites = skip_suites.clone();
            }
        }
        settings
    }

    /// The (suite, architecture) combinations that are synced and scheduled.
    pub fn targets(&self) -> Vec<(String, String)> {
        let mut targets = Vec::new();
        for suite in self.suites() {
            for arch in self.architectures() {
                if self.arch_settings(&arch).tests_suite(&suite) {
                    targets.push((suite.clone(), arch));
                }
            }
        }
        targets
    }

    pub fn ftbfs_grace_days(&self) -> i64 {
        self.ftbfs_grace_days.unwrap_or(DEFAULT_FTBFS_GRACE_DAYS)
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct ArchConfig {
    pub maximum: Option<u32>,
    pub minimum_age: Option<i64>,
    pub skip_suites: Option<Vec<String>>,
}

impl ArchConfig {
    pub fn update(&mut self, c: ArchConfig) {
        if c.maximum.is_some() {
            self.maximum = c.maximum;
        }
        if c.minimum_age.is_some() {
            self.minimum_age = c.minimum_age;
        }
        if c.skip_suites.is_some() {
            self.skip_suites = c.skip_suites;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchSettings {
    /// Above this many queued packages only new versions are scheduled.
    pub maximum: u32,
    /// Old versions are only rescheduled if their last build is older than this (in days).
    pub minimum_age: i64,
    pub skip_suites: Vec<String>,
}

impl ArchSettings {
    pub fn builtin(arch: &str) -> ArchSettings {
        match arch {
            "armhf" => ArchSettings {
                maximum: 375,
                minimum_age: 42,
                skip_suites: vec!["testing".to_string()],
            },
            _ => ArchSettings {
                maximum: DEFAULT_MAXIMUM,
                minimum_age: DEFAULT_MINIMUM_AGE,
                skip_suites: Vec::new(),
            },
        }
    }

    pub fn tests_suite(&self, suite: &str) -> bool {
        !self.skip_suites.iter().any(|s| s == suite)
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct PrioritiesConfig {
    pub manual: Option<i32>,
    pub untested: Option<i32>,
    pub new: Option<i32>,
    #[serde(rename = "ftbfs+depwait")]
    pub stale_failure: Option<i32>,
    pub old: Option<i32>,
}

impl PrioritiesConfig {
    pub fn update(&mut self, c: PrioritiesConfig) {
        if c.manual.is_some() {
            self.manual = c.manual;
        }
        if c.untested.is_some() {
            self.untested = c.untested;
        }
        if c.new.is_some() {
            self.new = c.new;
        }
        if c.stale_failure.is_some() {
            self.stale_failure = c.stale_failure;
        }
        if c.old.is_some() {
            self.old = c.old;
        }
    }

    pub fn manual(&self) -> Priority {
        self.manual.map(Priority::from).unwrap_or_else(Priority::manual)
    }

    pub fn for_category(&self, category: Category) -> Priority {
        let configured = match category {
            Category::Untested => self.untested,
            Category::NewVersion => self.new,
            Category::StaleFailure => self.stale_failure,
            Category::OldVersion => self.old,
        };
        configured
            .map(Priority::from)
            .unwrap_or_else(|| category.default_priority())
    }
}

/// A single entry of the quota policy, overriding the built-in table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LimitConfig {
    pub category: Category,
    pub architecture: String,
    pub suite: String,
    /// `(threshold, allowance)` pairs, empty for a flat allowance
    #[serde(default)]
    pub tiers: Vec<(u32, u32)>,
    pub default: u32,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct NotifyConfig {
    /// argv of the command that relays a message, the message is appended as last argument
    pub command: Option<Vec<String>>,
}

impl NotifyConfig {
    pub fn update(&mut self, c: NotifyConfig) {
        if c.command.is_some() {
            self.command = c.command;
        }
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct ManualConfig {
    pub daily_limit: Option<usize>,
    pub notify_limit: Option<usize>,
}

impl ManualConfig {
    pub fn update(&mut self, c: ManualConfig) {
        if c.daily_limit.is_some() {
            self.daily_limit = c.daily_limit;
        }
        if c.notify_limit.is_some() {
            self.notify_limit = c.notify_limit;
        }
    }

    pub fn daily_limit(&self) -> usize {
        self.daily_limit.unwrap_or(DEFAULT_MANUAL_DAILY_LIMIT)
    }

    pub fn notify_limit(&self) -> usize {
        self.notify_limit.unwrap_or(DEFAULT_MANUAL_NOTIFY_LIMIT)
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct PathsConfig {
    pub base: Option<PathBuf>,
}

impl PathsConfig {
    pub fn update(&mut self, c: PathsConfig) {
        if c.base.is_some() {
            self.base = c.base;
        }
    }

    pub fn base(&self) -> PathBuf {
        self.base
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ARTIFACTS_BASE))
    }
}
