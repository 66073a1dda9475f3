use reproducible_common::config::LimitConfig;
use reproducible_common::errors::*;
use reproducible_common::Category;
use std::collections::HashMap;

/// Allowance used when the policy has no entry for a combination.
pub const MISSING_ENTRY_ALLOWANCE: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tier {
    /// Applies while the running total is at most this.
    pub threshold: u32,
    pub allowance: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Allowance {
    Flat(u32),
    Tiered { tiers: Vec<Tier>, default: u32 },
}

impl Allowance {
    fn tiered(tiers: &[(u32, u32)], default: u32) -> Allowance {
        let tiers = tiers
            .iter()
            .map(|&(threshold, allowance)| Tier {
                threshold,
                allowance,
            })
            .collect();
        Allowance::Tiered { tiers, default }
    }

    fn from_config(c: &LimitConfig) -> Result<Allowance> {
        if c.tiers.is_empty() {
            return Ok(Allowance::Flat(c.default));
        }
        for pair in c.tiers.windows(2) {
            if pair[0].0 >= pair[1].0 {
                bail!(
                    "Thresholds of {}/{}/{} must be strictly ascending: {:?}",
                    c.category,
                    c.architecture,
                    c.suite,
                    c.tiers
                );
            }
        }
        Ok(Allowance::tiered(&c.tiers, c.default))
    }

    /// Size of the batch that may be scheduled when `total` packages are already queued.
    pub fn for_total(&self, total: u32) -> u32 {
        match self {
            Allowance::Flat(n) => *n,
            Allowance::Tiered { tiers, default } => tiers
                .iter()
                .find(|tier| total <= tier.threshold)
                .map(|tier| tier.allowance)
                .unwrap_or(*default),
        }
    }
}

type Key = (Category, String, String);

#[derive(Debug, Clone, Default)]
pub struct QuotaPolicy {
    entries: HashMap<Key, Allowance>,
}

impl QuotaPolicy {
    pub fn empty() -> QuotaPolicy {
        QuotaPolicy::default()
    }

    pub fn set(&mut self, category: Category, arch: &str, suite: &str, allowance: Allowance) {
        self.entries
            .insert((category, arch.to_string(), suite.to_string()), allowance);
    }

    fn set_suites(&mut self, category: Category, arch: &str, suites: [(&str, Allowance); 3]) {
        for (suite, allowance) in suites {
            self.set(category, arch, suite, allowance);
        }
    }

    /// The limits the production farm runs with.
    pub fn builtin() -> QuotaPolicy {
        use Allowance::Flat;
        let t = Allowance::tiered;

        let mut policy = QuotaPolicy::empty();

        policy.set_suites(
            Category::Untested,
            "amd64",
            [("testing", Flat(440)), ("unstable", Flat(440)), ("experimental", Flat(440))],
        );
        policy.set_suites(
            Category::Untested,
            "armhf",
            [("testing", Flat(0)), ("unstable", Flat(250)), ("experimental", Flat(250))],
        );

        policy.set_suites(
            Category::NewVersion,
            "amd64",
            [
                ("testing", t(&[(100, 250), (200, 200)], 0)),
                ("unstable", t(&[(100, 250), (200, 200)], 150)),
                ("experimental", t(&[(100, 250), (200, 200)], 150)),
            ],
        );
        policy.set_suites(
            Category::NewVersion,
            "armhf",
            [
                ("testing", t(&[(100, 0), (200, 0)], 0)),
                ("unstable", t(&[(100, 75), (200, 60)], 45)),
                ("experimental", t(&[(100, 75), (200, 60)], 45)),
            ],
        );

        policy.set_suites(
            Category::StaleFailure,
            "amd64",
            [
                ("testing", t(&[(250, 40), (350, 20)], 0)),
                ("unstable", t(&[(250, 40), (350, 20)], 0)),
                ("experimental", t(&[(250, 40), (350, 20)], 0)),
            ],
        );
        policy.set_suites(
            Category::StaleFailure,
            "armhf",
            [
                ("testing", t(&[(250, 0), (350, 0)], 0)),
                ("unstable", t(&[(250, 12), (350, 6)], 0)),
                ("experimental", t(&[(250, 12), (350, 6)], 0)),
            ],
        );

        policy.set_suites(
            Category::OldVersion,
            "amd64",
            [
                ("testing", t(&[(300, 800), (400, 666)], 0)),
                ("unstable", t(&[(300, 1000), (400, 888)], 0)),
                ("experimental", t(&[(300, 70), (400, 50)], 0)),
            ],
        );
        policy.set_suites(
            Category::OldVersion,
            "armhf",
            [
                ("testing", t(&[(300, 0), (400, 0)], 0)),
                ("unstable", t(&[(300, 250), (400, 200)], 0)),
                ("experimental", t(&[(300, 20), (400, 10)], 0)),
            ],
        );

        policy
    }

    /// Replace entries with the ones from the config file.
    pub fn with_overrides(mut self, limits: &[LimitConfig]) -> Result<QuotaPolicy> {
        for c in limits {
            let allowance = Allowance::from_config(c)?;
            debug!(
                "Overriding limit for {}/{}/{}: {:?}",
                c.category, c.architecture, c.suite, allowance
            );
            self.set(c.category, &c.architecture, &c.suite, allowance);
        }
        Ok(self)
    }

    pub fn get(&self, category: Category, arch: &str, suite: &str) -> Option<&Allowance> {
        self.entries
            .get(&(category, arch.to_string(), suite.to_string()))
    }

    /// How many packages of `category` may be scheduled for `arch`/`suite` given `total` packages
    /// are queued or selected already.
    pub fn allowance(&self, category: Category, arch: &str, suite: &str, total: u32) -> u32 {
        match self.get(category, arch, suite) {
            Some(allowance) => allowance.for_total(total),
            None => {
                error!(
                    "No limit configured for {} in {}/{}, allowing {}",
                    category, suite, arch, MISSING_ENTRY_ALLOWANCE
                );
                MISSING_ENTRY_ALLOWANCE
            }
        }
    }
}
