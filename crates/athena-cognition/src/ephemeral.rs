//! Ephemeral plan store
//!
//! Machine-generated plans live here until they earn a place in the agent's
//! permanent library (promotion) or are forgotten (pruning). Each entry has
//! a usage counter that grows every time an equivalent plan is proposed.

use athena_core::{
    AgentMind, Error, Literal, PlanRule, Result, EPHEMERAL_ANNOTATION, RATIONALE_ANNOTATION,
    SOURCE_ANNOTATION,
};
use parking_lot::Mutex;
use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// Prefix of generated plan labels.
pub const LABEL_PREFIX: &str = "athena_";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EvictionMode {
    /// Drop entries beyond the keep count.
    Prune,
    /// Drop entries beyond the keep count and make the rest permanent.
    Promote,
}

/// What happened to a plan handed to [`EphemeralStore::admit`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Admission {
    Added { label: String },
    /// An equivalent ephemeral plan already existed.
    Reinforced { label: String, usage: u64 },
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EvictionReport {
    /// Labels removed from the mind, lowest usage last.
    pub pruned: Vec<String>,
    /// Labels made permanent.
    pub promoted: Vec<String>,
    /// Labels still ephemeral after the pass.
    pub kept: Vec<String>,
}

impl EvictionReport {
    pub fn is_empty(&self) -> bool {
        self.pruned.is_empty() && self.promoted.is_empty()
    }
}

#[derive(Default)]
struct StoreInner {
    /// Insertion order.
    entries: Vec<PlanRule>,
    usage: HashMap<String, u64>,
}

impl StoreInner {
    fn usage_of(&self, plan: &PlanRule) -> u64 {
        plan.label_name()
            .and_then(|label| self.usage.get(label))
            .copied()
            .unwrap_or(0)
    }
}

/// Ephemeral entries plus their usage tracker, one per agent.
///
/// Every multi-step sequence (find-or-insert, rank-and-evict) runs under a
/// single lock so the store and the tracker never disagree.
#[derive(Default)]
pub struct EphemeralStore {
    inner: Mutex<StoreInner>,
}

impl EphemeralStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn labels(&self) -> Vec<String> {
        self.inner
            .lock()
            .entries
            .iter()
            .filter_map(|p| p.label_name().map(String::from))
            .collect()
    }

    /// Usage counter of a tracked label.
    pub fn usage(&self, label: &str) -> Option<u64> {
        self.inner.lock().usage.get(label).copied()
    }

    /// Register a proposed plan. An equivalent entry has its usage bumped;
    /// otherwise the plan is labelled, tagged ephemeral and installed.
    pub fn admit(&self, mind: &dyn AgentMind, mut plan: PlanRule) -> Result<Admission> {
        let mut inner = self.inner.lock();

        let existing = inner
            .entries
            .iter()
            .find(|entry| entry.is_equivalent(&plan))
            .and_then(|entry| entry.label_name().map(String::from));
        if let Some(label) = existing {
            let usage = inner.usage.entry(label.clone()).or_insert(0);
            *usage += 1;
            let usage = *usage;
            debug!("Reinforced ephemeral plan {} (usage {})", label, usage);
            return Ok(Admission::Reinforced { label, usage });
        }

        let mut label = match plan.label.take() {
            Some(label) => label,
            None => Literal::new(format!("{}{}", LABEL_PREFIX, uuid::Uuid::new_v4().simple())),
        };
        let name = label.functor().to_string();
        if inner.usage.contains_key(&name)
            || mind.plans().iter().any(|p| p.label_name() == Some(name.as_str()))
        {
            return Err(Error::malformed(
                plan.to_string(),
                format!("label @{} is already taken by a different plan", name),
            ));
        }
        label.annotate(SOURCE_ANNOTATION);
        label.annotate(RATIONALE_ANNOTATION);
        label.annotate(EPHEMERAL_ANNOTATION);
        plan.label = Some(label);

        mind.install_plan(plan.clone())?;
        inner.usage.insert(name.clone(), 1);
        inner.entries.push(plan);
        Ok(Admission::Added { label: name })
    }

    /// Rank entries by usage (ties keep insertion order), remove everything
    /// beyond `keep` from the mind and, in promote mode, make the survivors
    /// permanent.
    pub fn evict(&self, mind: &dyn AgentMind, keep: usize, mode: EvictionMode) -> EvictionReport {
        let mut inner = self.inner.lock();
        let mut report = EvictionReport::default();

        let mut ranked: Vec<usize> = (0..inner.entries.len()).collect();
        ranked.sort_by_key(|&i| Reverse(inner.usage_of(&inner.entries[i])));
        let survivors: HashSet<usize> = ranked.iter().take(keep).copied().collect();

        for &i in ranked.iter().skip(keep) {
            let Some(label) = inner.entries[i].label_name().map(String::from) else {
                continue;
            };
            if let Err(e) = mind.uninstall_plan(&label) {
                warn!("Failed to remove ephemeral plan {}: {}", label, e);
            }
            inner.usage.remove(&label);
            report.pruned.push(label);
        }

        let entries = std::mem::take(&mut inner.entries);
        let survivors: Vec<PlanRule> = entries
            .into_iter()
            .enumerate()
            .filter_map(|(i, plan)| survivors.contains(&i).then_some(plan))
            .collect();

        match mode {
            EvictionMode::Prune => {
                report.kept = survivors
                    .iter()
                    .filter_map(|p| p.label_name().map(String::from))
                    .collect();
                inner.entries = survivors;
            }
            EvictionMode::Promote => {
                for mut plan in survivors {
                    let Some(label) = plan.label_name().map(String::from) else {
                        continue;
                    };
                    if let Some(l) = plan.label.as_mut() {
                        l.remove_annotation(EPHEMERAL_ANNOTATION);
                    }
                    let usage = inner.usage.remove(&label).unwrap_or(0);
                    match mind.install_plan(plan.clone()) {
                        Ok(()) => report.promoted.push(label),
                        Err(e) => {
                            warn!("Failed to promote plan {}: {}", label, e);
                            // Still ephemeral in the mind; keep tracking it.
                            inner.usage.insert(label.clone(), usage);
                            if let Some(l) = plan.label.as_mut() {
                                l.annotate(EPHEMERAL_ANNOTATION);
                            }
                            inner.entries.push(plan);
                            report.kept.push(label);
                        }
                    }
                }
            }
        }

        if !report.pruned.is_empty() || !report.promoted.is_empty() {
            info!(
                "Removed {} ephemeral plans. Kept top {}, promoted {}",
                report.pruned.len(),
                keep.min(report.kept.len() + report.promoted.len()),
                report.promoted.len()
            );
        }
        report
    }
}
