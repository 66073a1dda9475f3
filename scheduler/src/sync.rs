use crate::models;
use crate::sources::{self, SourceEntry};
use crate::versions::PkgVerCmp;
use chrono::prelude::*;
use diesel::prelude::*;
use reproducible_common::errors::*;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

// this holds all packages we know about for a (suite, architecture)
// when syncing we remove all packages that are still in the index
// the remaining packages are no longer referenced and are going to be deleted
pub struct CurrentSourceNamespace {
    pkgs: HashMap<String, models::SourcePackage>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Presence {
    New,
    Unchanged,
    Updated(models::SourcePackage),
}

impl CurrentSourceNamespace {
    pub fn new(pkgs: Vec<models::SourcePackage>) -> Self {
        let pkgs = pkgs
            .into_iter()
            .map(|pkg| (pkg.name.clone(), pkg))
            .collect();
        CurrentSourceNamespace { pkgs }
    }

    pub fn load_from_database(
        suite: &str,
        architecture: &str,
        connection: &mut SqliteConnection,
    ) -> Result<Self> {
        let pkgs = models::SourcePackage::list_suite_arch(suite, architecture, connection)?;
        for pkg in &pkgs {
            trace!(
                "adding known package {:?} for suite={:?}, architecture={:?}",
                pkg.name,
                suite,
                architecture
            );
        }
        Ok(Self::new(pkgs))
    }

    pub fn len(&self) -> usize {
        self.pkgs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pkgs.is_empty()
    }

    // the package is taken out of the namespace if we know it already,
    // with its version bumped if the index has a greater one
    pub fn mark_still_present(&mut self, entry: &SourceEntry) -> Presence {
        let Some(mut pkg) = self.pkgs.remove(&entry.name) else {
            debug!("package is not yet present: {:?}", entry.name);
            return Presence::New;
        };

        let old_version = pkg.version.clone();
        match pkg.bump_version(&entry.version) {
            Ordering::Less => {
                debug!(
                    "package {:?} has a new version: {:?} -> {:?}",
                    entry.name, old_version, entry.version
                );
                Presence::Updated(pkg)
            }
            Ordering::Equal => Presence::Unchanged,
            Ordering::Greater => {
                warn!(
                    "index lists an older version of {:?} than we know about ({:?} < {:?}), keeping ours",
                    entry.name, entry.version, old_version
                );
                Presence::Unchanged
            }
        }
    }

    fn into_remaining(self) -> Vec<models::SourcePackage> {
        let mut pkgs = self.pkgs.into_values().collect::<Vec<_>>();
        pkgs.sort_by(|a, b| a.name.cmp(&b.name));
        pkgs
    }
}

/// What needs to change in the store to match a fetched index.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SyncPlan {
    pub inserts: Vec<SourceEntry>,
    pub updates: Vec<models::SourcePackage>,
    pub removals: Vec<models::SourcePackage>,
}

impl SyncPlan {
    pub fn new(
        mut current: CurrentSourceNamespace,
        fetched: &BTreeMap<String, SourceEntry>,
    ) -> SyncPlan {
        let mut plan = SyncPlan::default();
        for entry in fetched.values() {
            match current.mark_still_present(entry) {
                Presence::New => plan.inserts.push(entry.clone()),
                Presence::Updated(pkg) => plan.updates.push(pkg),
                Presence::Unchanged => (),
            }
        }
        plan.removals = current.into_remaining();
        plan
    }

    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty() && self.removals.is_empty()
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub added: usize,
    pub updated: usize,
    pub removed: Vec<String>,
    pub total: usize,
}

fn apply(
    plan: &SyncPlan,
    suite: &str,
    architecture: &str,
    now: NaiveDateTime,
    connection: &mut SqliteConnection,
) -> Result<()> {
    let mut progress_insert = 0;
    for batch in plan.inserts.chunks(1_000) {
        progress_insert += batch.len();
        info!(
            "inserting new packages in batch: {}/{}",
            progress_insert,
            plan.inserts.len()
        );
        let batch = batch
            .iter()
            .map(|entry| models::NewSourcePackage {
                name: entry.name.clone(),
                version: entry.version.clone(),
                suite: suite.to_string(),
                architecture: architecture.to_string(),
            })
            .collect::<Vec<_>>();
        if log::log_enabled!(log::Level::Trace) {
            for pkg in &batch {
                trace!("pkg in this batch: {:?}", pkg);
            }
        }
        models::NewSourcePackage::insert_batch(&batch, connection)?;
    }

    for pkg in &plan.updates {
        pkg.update_version(connection)
            .with_context(|| anyhow!("Failed to update version of {:?}", pkg.name))?;
    }

    if !plan.removals.is_empty() {
        let ids = plan.removals.iter().map(|pkg| pkg.id).collect::<Vec<_>>();
        for ids in ids.chunks(1_000) {
            models::SourcePackage::delete_multiple(ids, connection)?;
        }

        let tombstones = plan
            .removals
            .iter()
            .map(|pkg| models::NewRemovedPackage {
                name: pkg.name.clone(),
                suite: suite.to_string(),
                architecture: architecture.to_string(),
                removed_at: now,
            })
            .collect::<Vec<_>>();
        for batch in tombstones.chunks(1_000) {
            models::NewRemovedPackage::insert_batch(batch, connection)?;
        }
    }

    Ok(())
}

fn sync(
    suite: &str,
    architecture: &str,
    fetched: &BTreeMap<String, SourceEntry>,
    now: NaiveDateTime,
    connection: &mut SqliteConnection,
) -> Result<SyncReport> {
    info!("loading existing packages for {}/{} from database...", suite, architecture);
    let current = CurrentSourceNamespace::load_from_database(suite, architecture, connection)?;
    info!("found existing packages: len={}", current.len());

    let plan = SyncPlan::new(current, fetched);
    info!("found packages that need to be added to database: len={}", plan.inserts.len());
    info!("found packages with a new version: len={}", plan.updates.len());
    info!("found packages no longer present: len={}", plan.removals.len());

    apply(&plan, suite, architecture, now, connection)?;

    let stored = models::SourcePackage::count_distinct_names(suite, architecture, connection)?;
    if stored != fetched.len() as i64 {
        bail!(
            "Sync of {}/{} is inconsistent: {} distinct packages in the database but {} in the index",
            suite,
            architecture,
            stored,
            fetched.len()
        );
    }

    let removed = plan.removals.into_iter().map(|pkg| pkg.name).collect();
    Ok(SyncReport {
        added: plan.inserts.len(),
        updated: plan.updates.len(),
        removed,
        total: fetched.len(),
    })
}

/// Reconcile the stored packages of a suite and architecture with a fetched index.
///
/// Everything happens in one transaction, if the database doesn't match the index afterwards
/// the transaction is rolled back and an error is returned.
pub fn run(
    suite: &str,
    architecture: &str,
    fetched: Vec<SourceEntry>,
    now: NaiveDateTime,
    connection: &mut SqliteConnection,
) -> Result<SyncReport> {
    let fetched = sources::dedup_greatest(fetched);
    let report = connection.transaction::<_, Error, _>(|connection| {
        sync(suite, architecture, &fetched, now, connection)
    })?;

    if !report.removed.is_empty() {
        info!(
            "removed from {}/{}: {}",
            suite,
            architecture,
            report.removed.join(" ")
        );
    }
    info!(
        "successfully synced {}/{}: {} packages, {} new, {} updated, {} removed",
        suite,
        architecture,
        report.total,
        report.added,
        report.updated,
        report.removed.len()
    );

    Ok(report)
}
