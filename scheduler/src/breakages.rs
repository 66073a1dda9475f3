use crate::models::SourcePackage;
use crate::schema::*;
use crate::versions::strip_epoch;
use askama::Template;
use diesel::prelude::*;
use regex::bytes::Regex;
use reproducible_common::errors::*;
use reproducible_common::BuildStatus;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Files in the log trees younger than this are probably about to be cleaned up.
pub const RECENT_FILE_GRACE: Duration = Duration::from_secs(30 * 60);

pub const PAGE_TITLE: &str = "Breakage on reproducible.debian.net";

/// The directories the test runs write their artifacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactTree {
    base: PathBuf,
}

impl ArtifactTree {
    pub fn new<P: Into<PathBuf>>(base: P) -> ArtifactTree {
        ArtifactTree { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn rbuild(&self) -> PathBuf {
        self.base.join("rbuild")
    }

    pub fn logs(&self) -> PathBuf {
        self.base.join("logs")
    }

    pub fn logdiffs(&self) -> PathBuf {
        self.base.join("logdiffs")
    }

    pub fn dbd(&self) -> PathBuf {
        self.base.join("dbd")
    }

    pub fn dbdtxt(&self) -> PathBuf {
        self.base.join("dbdtxt")
    }

    pub fn buildinfo(&self) -> PathBuf {
        self.base.join("buildinfo")
    }

    pub fn rb_pkg(&self) -> PathBuf {
        self.base.join("rb-pkg")
    }

    pub fn history(&self) -> PathBuf {
        self.base.join("history")
    }

    /// `{dir}/{suite}/{arch}/{name}_{version}{suffix}`, the version without its epoch.
    fn pkg_file(&self, dir: PathBuf, pkg: &PackageRef, suffix: &str) -> PathBuf {
        dir.join(&pkg.suite).join(&pkg.architecture).join(format!(
            "{}_{}{}",
            pkg.name,
            strip_epoch(&pkg.version),
            suffix
        ))
    }

    pub fn rbuild_log(&self, pkg: &PackageRef) -> PathBuf {
        self.pkg_file(self.rbuild(), pkg, ".rbuild.log")
    }

    pub fn diffoscope_html(&self, pkg: &PackageRef) -> PathBuf {
        self.pkg_file(self.dbd(), pkg, ".diffoscope.html")
    }

    pub fn buildinfo_file(&self, pkg: &PackageRef) -> PathBuf {
        let suffix = format!("_{}.buildinfo", pkg.architecture);
        self.pkg_file(self.buildinfo(), pkg, &suffix)
    }

    fn has_rbuild(&self, pkg: &PackageRef) -> bool {
        let log = self.rbuild_log(pkg);
        let mut gz = log.clone().into_os_string();
        gz.push(".gz");
        log.is_file() || Path::new(&gz).is_file()
    }
}

/// A tested package, with the version of its latest test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRef {
    pub name: String,
    pub version: String,
    pub suite: String,
    pub architecture: String,
}

#[derive(Debug, Clone)]
struct CatalogEntry {
    pkg: SourcePackage,
    result: Option<(String, BuildStatus)>,
}

impl CatalogEntry {
    fn status(&self) -> Option<BuildStatus> {
        self.result.as_ref().map(|(_, status)| *status)
    }

    fn tested(&self) -> Option<PackageRef> {
        let (version, _) = self.result.as_ref()?;
        Some(PackageRef {
            name: self.pkg.name.clone(),
            version: version.clone(),
            suite: self.pkg.suite.clone(),
            architecture: self.pkg.architecture.clone(),
        })
    }
}

type Key = (String, String, String);

fn key(name: &str, suite: &str, architecture: &str) -> Key {
    (name.to_string(), suite.to_string(), architecture.to_string())
}

/// Every known package with its latest result.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
    index: HashMap<Key, usize>,
    names: HashSet<String>,
}

impl Catalog {
    pub fn load(connection: &mut SqliteConnection) -> Result<Catalog> {
        let rows = sources::table
            .left_join(results::table)
            .select((
                SourcePackage::as_select(),
                (results::version, results::status).nullable(),
            ))
            .order_by((
                sources::name.asc(),
                sources::suite.desc(),
                sources::architecture.asc(),
            ))
            .load::<(SourcePackage, Option<(String, BuildStatus)>)>(connection)?;

        let mut catalog = Catalog::default();
        for (pkg, result) in rows {
            catalog.push(pkg, result);
        }
        Ok(catalog)
    }

    fn push(&mut self, pkg: SourcePackage, result: Option<(String, BuildStatus)>) {
        self.names.insert(pkg.name.clone());
        self.index.insert(
            key(&pkg.name, &pkg.suite, &pkg.architecture),
            self.entries.len(),
        );
        self.entries.push(CatalogEntry { pkg, result });
    }

    fn get(&self, name: &str, suite: &str, architecture: &str) -> Option<&CatalogEntry> {
        let idx = self.index.get(&key(name, suite, architecture))?;
        self.entries.get(*idx)
    }

    fn status(&self, name: &str, suite: &str, architecture: &str) -> Option<BuildStatus> {
        self.get(name, suite, architecture)?.status()
    }

    fn tested<F: Fn(&CatalogEntry) -> bool>(&self, f: F) -> Vec<PackageRef> {
        self.entries
            .iter()
            .filter(|entry| f(entry))
            .filter_map(|entry| entry.tested())
            .collect()
    }
}

/// A file found at `{dir}/{suite}/{arch}/{file}`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FoundFile {
    path: PathBuf,
    suite: String,
    architecture: String,
    file: String,
}

impl FoundFile {
    fn display(&self) -> String {
        self.path.display().to_string()
    }
}

fn walk(dir: &Path) -> Result<Vec<FoundFile>> {
    let Some(dir_str) = dir.to_str() else {
        bail!("Artifact directory is not valid utf-8: {:?}", dir);
    };
    let pattern = format!("{}/*/*/*", glob::Pattern::escape(dir_str));

    let mut found = Vec::new();
    for path in glob::glob(&pattern)? {
        let path = path?;
        if !path.is_file() {
            continue;
        }
        let mut components = path
            .iter()
            .rev()
            .take(3)
            .map(|c| c.to_str().map(String::from));
        let (Some(Some(file)), Some(Some(architecture)), Some(Some(suite))) =
            (components.next(), components.next(), components.next())
        else {
            warn!("Skipping file with a name that isn't valid utf-8: {:?}", path);
            continue;
        };
        found.push(FoundFile {
            path,
            suite,
            architecture,
            file,
        });
    }
    Ok(found)
}

/// Split `{name}_{version}.{ext}.{ext}` into name and version, `extensions` is the number of
/// extensions to remove.
fn split_artifact_name(file: &str, extensions: usize) -> Option<(&str, &str)> {
    let mut stem = file;
    for _ in 0..extensions {
        stem = stem.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(stem);
    }
    stem.rsplit_once('_')
}

fn read_head(path: &Path, len: usize) -> io::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(len);
    fs::File::open(path)?.take(len as u64).read_to_end(&mut buf)?;
    Ok(buf)
}

/// One group of problems on the breakages page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub header: &'static str,
    pub packages: Vec<PackageRef>,
    pub files: Vec<String>,
}

impl Section {
    fn packages(header: &'static str, packages: Vec<PackageRef>) -> Section {
        Section {
            header,
            packages,
            files: Vec::new(),
        }
    }

    fn files(header: &'static str, files: Vec<String>) -> Section {
        Section {
            header,
            packages: Vec::new(),
            files,
        }
    }

    pub fn len(&self) -> usize {
        self.packages.len() + self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Template)]
#[template(path = "breakages.html")]
pub struct BreakagesPage<'a> {
    pub title: &'a str,
    pub sections: &'a [Section],
}

pub struct Checker<'a> {
    pub tree: &'a ArtifactTree,
    pub catalog: &'a Catalog,
    pub now: SystemTime,
}

impl Checker<'_> {
    fn is_recent(&self, path: &Path) -> io::Result<bool> {
        let modified = fs::metadata(path)?.modified()?;
        Ok(modified + RECENT_FILE_GRACE > self.now)
    }

    /// Log files of packages that have no result.
    pub fn alien_logs(&self) -> Result<Vec<String>> {
        let mut bad = Vec::new();
        for dir in [self.tree.rbuild(), self.tree.logs(), self.tree.logdiffs()] {
            info!("running alien_log check over {:?}...", dir);
            for found in walk(&dir)? {
                let Some((name, _)) = split_artifact_name(&found.file, 2) else {
                    error!("{} does not seem to be a file that should be there", found.display());
                    continue;
                };
                let status = self.catalog.status(name, &found.suite, &found.architecture);
                if status.is_some_and(|s| s != BuildStatus::Empty) {
                    continue;
                }
                match self.is_recent(&found.path) {
                    Ok(false) => {
                        warn!("{} should not be there", found.display());
                        bad.push(found.display());
                    }
                    Ok(true) => info!(
                        "ignoring {} which should not be there, but is also less than 30m old and will probably soon be gone.",
                        found.display()
                    ),
                    // the file is already gone
                    Err(err) if err.kind() == io::ErrorKind::NotFound => (),
                    Err(err) => return Err(err.into()),
                }
            }
        }
        Ok(bad)
    }

    /// Diffoscope output of packages that aren't unreproducible.
    pub fn alien_dbd(&self) -> Result<Vec<String>> {
        info!("running alien_dbd check...");
        let mut bad = Vec::new();
        for dir in [self.tree.dbd(), self.tree.dbdtxt()] {
            for found in walk(&dir)? {
                let Some((name, _)) = split_artifact_name(&found.file, 2) else {
                    error!("{} does not seem to be a file that should be there", found.display());
                    continue;
                };
                match self.catalog.status(name, &found.suite, &found.architecture) {
                    Some(BuildStatus::Unreproducible) => (),
                    Some(status) => {
                        warn!("{} should not be there ({} package)", found.display(), status);
                        bad.push(format!("{} ({} package)", found.display(), status));
                    }
                    None => {
                        warn!("{} should not be there (missing package)", found.display());
                        bad.push(format!("{} (missing package)", found.display()));
                    }
                }
            }
        }
        Ok(bad)
    }

    /// Package pages of unknown packages.
    pub fn alien_rbpkg(&self) -> Result<Vec<String>> {
        info!("running alien_rbpkg check...");
        let mut bad = Vec::new();
        for found in walk(&self.tree.rb_pkg())? {
            let name = found
                .file
                .rsplit_once('.')
                .map(|(name, _)| name)
                .unwrap_or(&found.file);
            if self.catalog.get(name, &found.suite, &found.architecture).is_none() {
                warn!("{} should not be there", found.display());
                bad.push(found.display());
            }
        }
        Ok(bad)
    }

    /// .buildinfo files of packages that didn't build successfully.
    pub fn alien_buildinfo(&self) -> Result<Vec<String>> {
        info!("running alien_buildinfo check...");
        let mut bad = Vec::new();
        for found in walk(&self.tree.buildinfo())? {
            let Some((name, _)) = found.file.split_once('_') else {
                error!("{} does not seem to be a file that should be there", found.display());
                continue;
            };
            let built = self
                .catalog
                .status(name, &found.suite, &found.architecture)
                .is_some_and(|s| s.is_successful_build());
            if !built {
                warn!("{} should not be there", found.display());
                bad.push(found.display());
            }
        }
        Ok(bad)
    }

    /// History pages of packages that aren't in any suite.
    pub fn alien_history(&self) -> Result<Vec<String>> {
        info!("running alien_history check...");
        let dir = self.tree.history();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(err).with_context(|| anyhow!("Failed to list {:?}", dir));
            }
        };

        let mut files = Vec::new();
        for entry in entries {
            files.push(entry?.path());
        }
        files.sort();

        let mut bad = Vec::new();
        for path in files {
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if !self.catalog.names.contains(name) {
                warn!("{} should not be there", path.display());
                bad.push(path.display().to_string());
            }
        }
        Ok(bad)
    }

    pub fn not_unreproducible_with_dbd(&self) -> Vec<PackageRef> {
        info!("running not_unrep_with_dbd_file check...");
        self.catalog
            .tested(|entry| entry.status() != Some(BuildStatus::Unreproducible))
            .into_iter()
            .filter(|pkg| {
                let dbd = self.tree.diffoscope_html(pkg);
                let exists = dbd.is_file();
                if exists {
                    warn!(
                        "{} exists but {}/{}/{} ({}) is not unreproducible.",
                        dbd.display(),
                        pkg.suite,
                        pkg.architecture,
                        pkg.name,
                        pkg.version
                    );
                }
                exists
            })
            .collect()
    }

    pub fn lack_rbuild(&self) -> Vec<PackageRef> {
        info!("running lack_rbuild check...");
        self.catalog
            .tested(|entry| {
                !matches!(
                    entry.status(),
                    Some(BuildStatus::Blacklisted) | Some(BuildStatus::Empty)
                )
            })
            .into_iter()
            .filter(|pkg| {
                let missing = !self.tree.has_rbuild(pkg);
                if missing {
                    warn!(
                        "{}/{}/{} ({}) has been built, but a buildlog is missing.",
                        pkg.suite, pkg.architecture, pkg.name, pkg.version
                    );
                }
                missing
            })
            .collect()
    }

    pub fn lack_buildinfo(&self) -> Vec<PackageRef> {
        info!("running lack_buildinfo check...");
        self.catalog
            .tested(|entry| entry.status().is_some_and(|s| s.is_successful_build()))
            .into_iter()
            .filter(|pkg| {
                let missing = !self.tree.buildinfo_file(pkg).is_file();
                if missing {
                    warn!(
                        "{}/{}/{} ({}) has been successfully built, but a .buildinfo is missing",
                        pkg.suite, pkg.architecture, pkg.name, pkg.version
                    );
                }
                missing
            })
            .collect()
    }

    /// Unreproducible packages without diffoscope output, and those whose output isn't html.
    pub fn unreproducible_dbd_issues(&self) -> Result<(Vec<PackageRef>, Vec<PackageRef>)> {
        info!("running unrep_with_dbd_issues check...");
        let mut without_dbd = Vec::new();
        let mut bad_dbd = Vec::new();
        for pkg in self
            .catalog
            .tested(|entry| entry.status() == Some(BuildStatus::Unreproducible))
        {
            let dbd = self.tree.diffoscope_html(&pkg);
            match read_head(&dbd, 3) {
                Ok(head) => {
                    if !head.contains(&b'<') {
                        warn!(
                            "{}/{}/{} ({}) has diffoscope output, but it does not seem to be an html page.",
                            pkg.suite, pkg.architecture, pkg.name, pkg.version
                        );
                        bad_dbd.push(pkg);
                    } else {
                        debug!("{} found.", dbd.display());
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    warn!(
                        "{}/{}/{} ({}) is unreproducible without diffoscope file.",
                        pkg.suite, pkg.architecture, pkg.name, pkg.version
                    );
                    without_dbd.push(pkg);
                }
                Err(err) => {
                    return Err(err).with_context(|| anyhow!("Failed to read {:?}", dbd));
                }
            }
        }
        Ok((without_dbd, bad_dbd))
    }

    /// FTBFS packages in testing that failed to install their build dependencies.
    pub fn pbuilder_dep_fail(&self) -> Result<Vec<PackageRef>> {
        info!("running pbuilder_dep_fail check...");
        let re = Regex::new(r"E: pbuilder-satisfydepends failed\.")?;
        let mut bad = Vec::new();
        for pkg in self.catalog.tested(|entry| {
            entry.status() == Some(BuildStatus::Ftbfs) && entry.pkg.suite == "testing"
        }) {
            let rbuild = self.tree.rbuild_log(&pkg);
            let log = match fs::read(&rbuild) {
                Ok(log) => log,
                Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
                Err(err) => {
                    return Err(err).with_context(|| anyhow!("Failed to read {:?}", rbuild));
                }
            };
            debug!("looking at {}", rbuild.display());
            if re.is_match(&log) {
                warn!(
                    "{}/{}/{} ({}) failed to satisfy its dependencies.",
                    pkg.suite, pkg.architecture, pkg.name, pkg.version
                );
                bad.push(pkg);
            }
        }
        Ok(bad)
    }

    /// Run all checks, only sections with findings are returned.
    pub fn run(&self) -> Result<Vec<Section>> {
        let (without_dbd, bad_dbd) = self.unreproducible_dbd_issues()?;
        let sections = vec![
            Section::files("log files that should not be there:", self.alien_logs()?),
            Section::files("diffoscope files that should not be there:", self.alien_dbd()?),
            Section::files("rb-pkg pages that should not be there:", self.alien_rbpkg()?),
            Section::files("buildinfo files that should not be there:", self.alien_buildinfo()?),
            Section::files("history tables that should not be there:", self.alien_history()?),
            Section::packages(
                "are not marked as unreproducible, but they have a diffoscope file:",
                self.not_unreproducible_with_dbd(),
            ),
            Section::packages("have been built but don't have a buildlog:", self.lack_rbuild()),
            Section::packages(
                "have been built but don't have a .buildinfo file:",
                self.lack_buildinfo(),
            ),
            Section::packages(
                "are marked as unreproducible, but there is no diffoscope output - so probably diffoscope crashed:",
                without_dbd,
            ),
            Section::packages(
                "are marked as unreproducible, but their diffoscope output does not seem to be an html file - so probably diffoscope ran into a timeout:",
                bad_dbd,
            ),
            Section::packages(
                "failed to satisfy their build-dependencies:",
                self.pbuilder_dep_fail()?,
            ),
        ];
        Ok(sections.into_iter().filter(|s| !s.is_empty()).collect())
    }
}

pub fn render(sections: &[Section]) -> Result<String> {
    let page = BreakagesPage {
        title: PAGE_TITLE,
        sections,
    };
    let html = page.render().context("Failed to render breakages page")?;
    Ok(html)
}

/// Check the artifact tree against the database and render the results.
pub fn report(tree: &ArtifactTree, connection: &mut SqliteConnection) -> Result<String> {
    let catalog = Catalog::load(connection)?;
    let checker = Checker {
        tree,
        catalog: &catalog,
        now: SystemTime::now(),
    };
    let sections = checker.run()?;
    info!("Found {} kinds of breakage", sections.len());
    render(&sections)
}
