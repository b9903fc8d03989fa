//! Directive installation
//!
//! Every rule change replaces the whole installed directive set: remove all
//! previously installed ids, add the freshly compiled set, in one native
//! call. The installer remembers what it last installed and drops installs
//! from generations older than that, so the last write wins.
//!
//! Asynchronous hosts split an install into [`Installer::plan`] and
//! [`Installer::commit`]. Plans must reach the native engine in the order
//! they were prepared; while one is in flight, later plans also remove the
//! ids it adds.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use ts_rs::TS;

use crate::directive::{Directive, NativeRule};

/// Error type for directive installation.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InstallError {
    #[error("Native engine rejected directive update: {0}")]
    Rejected(String),
}

/// The native "update dynamic rules" operation.
pub trait DirectiveSink {
    /// Remove `remove_ids` and add `add_rules` as one atomic update.
    fn replace_dynamic_rules(
        &mut self,
        remove_ids: &[u32],
        add_rules: &[NativeRule],
    ) -> Result<(), InstallError>;
}

/// One pending replacement, shaped like the browser's update options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct InstallPlan {
    #[serde(skip)]
    #[ts(skip)]
    pub generation: u64,
    pub remove_rule_ids: Vec<u32>,
    pub add_rules: Vec<NativeRule>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed { removed: usize, added: usize },
    /// A newer generation is already installed
    Superseded { generation: u64, installed: u64 },
}

#[derive(Debug, Clone, Default)]
pub struct Installer {
    installed_ids: Vec<u32>,
    installed_generation: Option<u64>,
    /// Prepared but not yet committed, by generation
    in_flight: BTreeMap<u64, InstallPlan>,
}

impl Installer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from ids already present in the native engine (for example
    /// rules left by a previous session).
    pub fn with_installed_ids(ids: Vec<u32>) -> Self {
        Self {
            installed_ids: ids,
            installed_generation: None,
            in_flight: BTreeMap::new(),
        }
    }

    pub fn installed_ids(&self) -> &[u32] {
        &self.installed_ids
    }

    pub fn installed_generation(&self) -> Option<u64> {
        self.installed_generation
    }

    /// Generations prepared but not yet committed or abandoned.
    pub fn in_flight(&self) -> impl Iterator<Item = u64> + '_ {
        self.in_flight.keys().copied()
    }

    /// Build the replacement for `directives` and track it as in flight, or
    /// return `None` if `generation` is older than the installed one.
    pub fn plan(&mut self, generation: u64, directives: &[Directive]) -> Option<InstallPlan> {
        if self.superseded(generation).is_some() {
            return None;
        }
        let plan = self.build_plan(generation, directives);
        self.in_flight.insert(generation, plan.clone());
        Some(plan)
    }

    /// Record a plan the native engine accepted.
    ///
    /// Older in-flight plans were applied before this one and are dropped.
    pub fn commit(&mut self, plan: &InstallPlan) -> InstallOutcome {
        if let Some(outcome) = self.superseded(plan.generation) {
            self.in_flight.remove(&plan.generation);
            return outcome;
        }
        self.in_flight.retain(|&generation, _| generation > plan.generation);
        let removed = plan.remove_rule_ids.len();
        self.installed_ids = plan.add_rules.iter().map(|r| r.id).collect();
        self.installed_generation = Some(plan.generation);
        InstallOutcome::Installed {
            removed,
            added: plan.add_rules.len(),
        }
    }

    /// Commit the in-flight plan prepared for `generation`.
    pub fn commit_generation(&mut self, generation: u64) -> Option<InstallOutcome> {
        let plan = self.in_flight.get(&generation)?.clone();
        Some(self.commit(&plan))
    }

    /// Forget an in-flight plan the native engine rejected.
    pub fn abandon(&mut self, generation: u64) -> bool {
        self.in_flight.remove(&generation).is_some()
    }

    /// Plan, apply through `sink`, and commit.
    ///
    /// On failure the installed ids are left as they were; installing again
    /// is the retry.
    pub fn install<S: DirectiveSink + ?Sized>(
        &mut self,
        sink: &mut S,
        generation: u64,
        directives: &[Directive],
    ) -> Result<InstallOutcome, InstallError> {
        if let Some(outcome) = self.superseded(generation) {
            log::debug!("skipping install of generation {}: superseded", generation);
            return Ok(outcome);
        }
        let plan = self.build_plan(generation, directives);

        if let Err(e) = sink.replace_dynamic_rules(&plan.remove_rule_ids, &plan.add_rules) {
            log::warn!("failed to install generation {}: {}", generation, e);
            return Err(e);
        }

        let outcome = self.commit(&plan);
        log::debug!("installed generation {}: {:?}", generation, outcome);
        Ok(outcome)
    }

    /// Removes every id the native engine may hold: the installed set plus
    /// whatever in-flight plans add. Unknown remove ids are ignored natively.
    fn build_plan(&self, generation: u64, directives: &[Directive]) -> InstallPlan {
        let mut remove: BTreeSet<u32> = self.installed_ids.iter().copied().collect();
        for plan in self.in_flight.values() {
            remove.extend(plan.add_rules.iter().map(|r| r.id));
        }
        InstallPlan {
            generation,
            remove_rule_ids: remove.into_iter().collect(),
            add_rules: directives.iter().map(Directive::to_native).collect(),
        }
    }

    fn superseded(&self, generation: u64) -> Option<InstallOutcome> {
        match self.installed_generation {
            Some(installed) if generation < installed => Some(InstallOutcome::Superseded {
                generation,
                installed,
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use rr_core::Rule;

    use super::*;
    use crate::compiler::compile;

    #[derive(Default)]
    struct MemorySink {
        rules: Vec<NativeRule>,
        calls: usize,
        fail_next: bool,
    }

    impl DirectiveSink for MemorySink {
        fn replace_dynamic_rules(
            &mut self,
            remove_ids: &[u32],
            add_rules: &[NativeRule],
        ) -> Result<(), InstallError> {
            self.calls += 1;
            if self.fail_next {
                self.fail_next = false;
                return Err(InstallError::Rejected("quota exceeded".to_string()));
            }
            self.rules.retain(|r| !remove_ids.contains(&r.id));
            self.rules.extend_from_slice(add_rules);
            Ok(())
        }
    }

    impl MemorySink {
        /// Apply a plan the way the browser does, rejecting duplicate ids.
        fn apply(&mut self, plan: &InstallPlan) -> Result<(), InstallError> {
            let mut after: Vec<u32> = ids(self)
                .into_iter()
                .filter(|id| !plan.remove_rule_ids.contains(id))
                .collect();
            for rule in &plan.add_rules {
                if after.contains(&rule.id) {
                    return Err(InstallError::Rejected(format!("duplicate id {}", rule.id)));
                }
                after.push(rule.id);
            }
            self.replace_dynamic_rules(&plan.remove_rule_ids, &plan.add_rules)
        }
    }

    fn ids(sink: &MemorySink) -> Vec<u32> {
        sink.rules.iter().map(|r| r.id).collect()
    }

    #[test]
    fn replaces_previous_generation() {
        let mut sink = MemorySink::default();
        let mut installer = Installer::new();

        let first = compile(&[
            Rule::new("https://a.com/1", "https://b.com/1"),
            Rule::new("https://a.com/2", "https://b.com/2"),
            Rule::new("https://a.com/3", "https://b.com/3"),
        ]);
        let outcome = installer.install(&mut sink, 1, &first).expect("install");
        assert_eq!(outcome, InstallOutcome::Installed { removed: 0, added: 3 });
        assert_eq!(ids(&sink), vec![1, 2, 3]);

        let second = compile(&[Rule::new("https://a.com/9", "https://b.com/9")]);
        let outcome = installer.install(&mut sink, 2, &second).expect("install");
        assert_eq!(outcome, InstallOutcome::Installed { removed: 3, added: 1 });
        assert_eq!(ids(&sink), vec![1]);
        assert_eq!(sink.rules[0].condition.url_filter.as_deref(), Some("|https://a.com/9|"));
        assert_eq!(installer.installed_ids(), &[1]);
    }

    #[test]
    fn stale_generation_is_superseded() {
        let mut sink = MemorySink::default();
        let mut installer = Installer::new();
        let directives = compile(&[Rule::new("https://a.com/", "https://b.com/")]);

        installer.install(&mut sink, 5, &directives).expect("install");
        let outcome = installer.install(&mut sink, 4, &[]).expect("skip");
        assert_eq!(
            outcome,
            InstallOutcome::Superseded {
                generation: 4,
                installed: 5
            }
        );
        assert_eq!(sink.calls, 1);
        assert_eq!(ids(&sink), vec![1]);
    }

    #[test]
    fn failure_keeps_last_known_state() {
        let mut sink = MemorySink::default();
        let mut installer = Installer::new();
        let directives = compile(&[Rule::new("https://a.com/", "https://b.com/")]);
        installer.install(&mut sink, 1, &directives).expect("install");

        sink.fail_next = true;
        let err = installer.install(&mut sink, 2, &[]).expect_err("sink rejects");
        assert_eq!(err, InstallError::Rejected("quota exceeded".to_string()));
        assert_eq!(installer.installed_ids(), &[1]);
        assert_eq!(installer.installed_generation(), Some(1));
        assert_eq!(ids(&sink), vec![1]);

        // Retrying the same generation succeeds.
        installer.install(&mut sink, 2, &[]).expect("retry");
        assert!(sink.rules.is_empty());
    }

    #[test]
    fn adopts_ids_from_previous_session() {
        let mut sink = MemorySink::default();
        sink.rules = compile(&[
            Rule::new("https://old.com/1", "https://x.com/"),
            Rule::new("https://old.com/2", "https://x.com/"),
        ])
        .iter()
        .map(Directive::to_native)
        .collect();

        let mut installer = Installer::with_installed_ids(ids(&sink));
        let plan = installer
            .plan(1, &compile(&[Rule::new("https://a.com/", "https://b.com/")]))
            .expect("not stale");
        assert_eq!(plan.remove_rule_ids, vec![1, 2]);

        let json = serde_json::to_value(&plan).expect("serialize");
        assert!(json.get("generation").is_none());
        assert_eq!(json["removeRuleIds"], serde_json::json!([1, 2]));
        assert_eq!(json["addRules"][0]["id"], 1);

        sink.replace_dynamic_rules(&plan.remove_rule_ids, &plan.add_rules)
            .expect("apply");
        installer.commit(&plan);
        assert_eq!(ids(&sink), vec![1]);
    }

    #[test]
    fn late_commit_of_older_plan_is_ignored() {
        let mut installer = Installer::new();
        let older = installer.plan(1, &[]).expect("plan");
        let newer = installer
            .plan(2, &compile(&[Rule::new("https://a.com/", "https://b.com/")]))
            .expect("plan");
        installer.commit(&newer);
        assert_eq!(
            installer.commit(&older),
            InstallOutcome::Superseded {
                generation: 1,
                installed: 2
            }
        );
        assert_eq!(installer.installed_ids(), &[1]);
    }

    #[test]
    fn overlapping_plans_remove_in_flight_ids() {
        let mut sink = MemorySink::default();
        let mut installer = Installer::new();
        let one = compile(&[Rule::new("https://a.com/1", "https://b.com/1")]);
        let two = compile(&[
            Rule::new("https://a.com/1", "https://b.com/1"),
            Rule::new("https://a.com/2", "https://b.com/2"),
        ]);

        let first = installer.plan(1, &one).expect("plan");
        let second = installer.plan(2, &two).expect("plan");
        assert!(first.remove_rule_ids.is_empty());
        assert_eq!(second.remove_rule_ids, vec![1]);

        sink.apply(&first).expect("first applies");
        assert_eq!(
            installer.commit_generation(1),
            Some(InstallOutcome::Installed { removed: 0, added: 1 })
        );
        assert_eq!(installer.installed_ids(), &[1]);

        sink.apply(&second).expect("no duplicate ids");
        assert_eq!(
            installer.commit_generation(2),
            Some(InstallOutcome::Installed { removed: 1, added: 2 })
        );
        assert_eq!(ids(&sink), vec![1, 2]);
        assert_eq!(installer.installed_ids(), &[1, 2]);
        assert_eq!(installer.in_flight().count(), 0);

        let third = installer.plan(3, &[]).expect("plan");
        assert_eq!(third.remove_rule_ids, vec![1, 2]);
    }

    #[test]
    fn newer_commit_drops_older_in_flight_plans() {
        let mut installer = Installer::new();
        let directives = compile(&[Rule::new("https://a.com/", "https://b.com/")]);
        installer.plan(1, &directives).expect("plan");
        installer.plan(2, &directives).expect("plan");
        installer.plan(3, &directives).expect("plan");

        assert!(installer.commit_generation(2).is_some());
        assert_eq!(installer.in_flight().collect::<Vec<_>>(), vec![3]);
        assert!(installer.commit_generation(1).is_none());

        assert!(installer.abandon(3));
        assert!(!installer.abandon(3));
        assert!(installer.commit_generation(3).is_none());
        assert_eq!(installer.installed_generation(), Some(2));
    }
}
