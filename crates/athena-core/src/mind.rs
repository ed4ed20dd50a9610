//! The agent mind seam
//!
//! The cognition layer reads beliefs, raises events and edits the plan
//! library only through [`AgentMind`]. Any agent runtime can implement it;
//! [`InMemoryMind`] is the reference implementation used by the binary and
//! the tests.

use crate::error::{Error, Result};
use crate::syntax::{Literal, PlanRule, Trigger};
use parking_lot::{Mutex, RwLock};
use std::path::PathBuf;

pub trait AgentMind: Send + Sync {
    fn name(&self) -> &str;

    /// Snapshot of the belief base.
    fn beliefs(&self) -> Vec<Literal>;

    /// Whether some belief satisfies `condition` (variables match anything).
    fn holds(&self, condition: &Literal) -> bool {
        self.beliefs().iter().any(|b| condition.matches(b))
    }

    fn add_belief(&self, belief: Literal) -> Result<()>;

    /// Returns whether a belief was actually removed.
    fn remove_belief(&self, belief: &Literal) -> Result<bool>;

    /// Queue a one-shot event for the agent's next reasoning cycle.
    fn raise_event(&self, event: Trigger) -> Result<()>;

    /// Install a plan, replacing any plan with the same label.
    fn install_plan(&self, plan: PlanRule) -> Result<()>;

    fn uninstall_plan(&self, label: &str) -> Result<Option<PlanRule>>;

    fn plans(&self) -> Vec<PlanRule>;

    /// File the agent's behavior was loaded from, if any.
    fn behavior_source(&self) -> Option<PathBuf> {
        None
    }
}

/// Belief base, plan library and event queue kept in memory.
pub struct InMemoryMind {
    name: String,
    beliefs: RwLock<Vec<Literal>>,
    plans: RwLock<Vec<PlanRule>>,
    events: Mutex<Vec<Trigger>>,
    source: Option<PathBuf>,
}

impl InMemoryMind {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            beliefs: RwLock::new(Vec::new()),
            plans: RwLock::new(Vec::new()),
            events: Mutex::new(Vec::new()),
            source: None,
        }
    }

    pub fn with_belief(self, belief: Literal) -> Self {
        self.beliefs.write().push(belief);
        self
    }

    pub fn with_plan(self, plan: PlanRule) -> Self {
        self.plans.write().push(plan);
        self
    }

    pub fn with_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.source = Some(path.into());
        self
    }

    /// Take every queued event, oldest first.
    pub fn drain_events(&self) -> Vec<Trigger> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn pending_events(&self) -> usize {
        self.events.lock().len()
    }

    pub fn plan(&self, label: &str) -> Option<PlanRule> {
        self.plans
            .read()
            .iter()
            .find(|p| p.label_name() == Some(label))
            .cloned()
    }
}

impl AgentMind for InMemoryMind {
    fn name(&self) -> &str {
        &self.name
    }

    fn beliefs(&self) -> Vec<Literal> {
        self.beliefs.read().clone()
    }

    fn holds(&self, condition: &Literal) -> bool {
        self.beliefs.read().iter().any(|b| condition.matches(b))
    }

    fn add_belief(&self, belief: Literal) -> Result<()> {
        let mut beliefs = self.beliefs.write();
        if !beliefs.contains(&belief) {
            beliefs.push(belief);
        }
        Ok(())
    }

    fn remove_belief(&self, belief: &Literal) -> Result<bool> {
        let mut beliefs = self.beliefs.write();
        let before = beliefs.len();
        beliefs.retain(|b| !belief.matches(b));
        Ok(beliefs.len() != before)
    }

    fn raise_event(&self, event: Trigger) -> Result<()> {
        self.events.lock().push(event);
        Ok(())
    }

    fn install_plan(&self, plan: PlanRule) -> Result<()> {
        let mut plans = self.plans.write();
        match plan.label_name() {
            Some(label) => {
                let label = label.to_string();
                match plans.iter_mut().find(|p| p.label_name() == Some(&label)) {
                    Some(existing) => *existing = plan,
                    None => plans.push(plan),
                }
            }
            None => {
                return Err(Error::mind(format!("plan without a label: {}", plan)));
            }
        }
        Ok(())
    }

    fn uninstall_plan(&self, label: &str) -> Result<Option<PlanRule>> {
        let mut plans = self.plans.write();
        Ok(plans
            .iter()
            .position(|p| p.label_name() == Some(label))
            .map(|idx| plans.remove(idx)))
    }

    fn plans(&self) -> Vec<PlanRule> {
        self.plans.read().clone()
    }

    fn behavior_source(&self) -> Option<PathBuf> {
        self.source.clone()
    }
}
