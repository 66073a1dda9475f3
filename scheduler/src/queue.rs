use crate::models::{NewScheduleEntry, SourcePackage};
use chrono::prelude::*;
use diesel::prelude::*;
use reproducible_common::config::PrioritiesConfig;
use reproducible_common::errors::*;
use reproducible_common::utils::join_human;
use reproducible_common::Category;
use std::collections::HashSet;

/// The candidates a selector returned for one category, per suite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub category: Category,
    pub suites: Vec<(String, Vec<SourcePackage>)>,
}

impl Selection {
    pub fn new(category: Category) -> Selection {
        Selection {
            category,
            suites: Vec::new(),
        }
    }

    pub fn push(&mut self, suite: &str, pkgs: Vec<SourcePackage>) {
        self.suites.push((suite.to_string(), pkgs));
    }

    pub fn len(&self) -> usize {
        self.suites.iter().map(|(_, pkgs)| pkgs.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Candidates of all categories merged into schedule rows.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Merged {
    pub entries: Vec<NewScheduleEntry>,
    /// Per category, the number of packages scheduled in each suite.
    pub counts: Vec<(Category, Vec<(String, usize)>)>,
}

impl Merged {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Merge the selections into schedule rows.
///
/// Selections are expected in evaluation order, a package selected by multiple categories is
/// only scheduled for the first one.
pub fn merge(
    selections: &[Selection],
    priorities: &PrioritiesConfig,
    now: NaiveDateTime,
) -> Merged {
    let mut seen = HashSet::new();
    let mut merged = Merged::default();

    for selection in selections {
        let priority = priorities.for_category(selection.category);
        let mut counts = Vec::new();

        for (suite, pkgs) in &selection.suites {
            let mut names = Vec::new();
            for pkg in pkgs {
                if !seen.insert(pkg.id) {
                    debug!(
                        "Package {} in {} is already queued, not scheduling it as {}",
                        pkg.name, suite, selection.category
                    );
                    continue;
                }
                names.push(pkg.name.as_str());
                merged
                    .entries
                    .push(NewScheduleEntry::new(pkg.id, priority, now));
            }

            if !names.is_empty() {
                info!(
                    "The following {} source packages in {} have been queued up as {}: {}",
                    names.len(),
                    suite,
                    selection.category,
                    names.join(" ")
                );
            }
            counts.push((suite.clone(), names.len()));
        }

        merged.counts.push((selection.category, counts));
    }

    merged
}

/// Insert the merged rows, replacing rows already queued for the same packages.
pub fn write(merged: &Merged, connection: &mut SqliteConnection) -> Result<()> {
    let mut progress = 0;
    for batch in merged.entries.chunks(1_000) {
        progress += batch.len();
        info!("inserting to schedule in batch: {}/{}", progress, merged.len());
        if log::log_enabled!(log::Level::Trace) {
            for entry in batch {
                trace!("entry in this batch: {:?}", entry);
            }
        }
        NewScheduleEntry::replace_batch(batch, connection)?;
    }
    Ok(())
}

fn add_up(counts: &[(String, usize)]) -> Option<String> {
    if counts.iter().all(|(_, n)| *n == 0) {
        None
    } else {
        let sums = counts.iter().map(|(_, n)| n.to_string()).collect::<Vec<_>>();
        Some(sums.join("+"))
    }
}

/// Render the summary of one scheduling pass, `queued` is the queue depth per suite afterwards.
pub fn summary_message(architecture: &str, merged: &Merged, queued: &[(String, usize)]) -> String {
    let suites = queued
        .iter()
        .map(|(suite, _)| suite.as_str())
        .collect::<Vec<_>>();

    let parts = merged
        .counts
        .iter()
        .filter_map(|(category, counts)| {
            add_up(counts).map(|sum| format!("{} {}", sum, category.label()))
        })
        .collect::<Vec<_>>();

    let total = queued.iter().map(|(_, n)| n).sum::<usize>();
    let mut message = format!(
        "Scheduled in {} ({}): {}, for {}",
        suites.join("+"),
        architecture,
        join_human(&parts),
        total
    );
    if queued.len() > 1 {
        let per_suite = queued
            .iter()
            .map(|(_, n)| n.to_string())
            .collect::<Vec<_>>();
        message.push_str(" or ");
        message.push_str(&per_suite.join("+"));
    }
    message.push_str(" packages in total.");
    message
}
