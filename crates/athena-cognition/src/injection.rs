//! Injector: turns model output into mind changes and manages the
//! lifetime of the plans it creates.
//!
//! Every line of a batch is classified and applied on its own. A line that
//! fails is logged and reported; the rest of the batch still goes in.

use crate::ephemeral::{Admission, EphemeralStore, EvictionMode, EvictionReport};
use crate::policy::{spawn_periodic, ActivePolicy, CollectorPolicy, InjectorSettings, NapPolicy};
use crate::pressure::{MemorySampler, PressureOutcome, ProcMeminfo};
use athena_core::{classify, AgentMind, Directive, Literal, Result, Trigger};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Outcome of one [`Injector::inject`] batch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InjectionReport {
    /// Labels of newly installed ephemeral plans.
    pub plans_added: Vec<String>,
    /// Labels of ephemeral plans whose usage was bumped.
    pub plans_reinforced: Vec<String>,
    pub events: usize,
    pub beliefs: usize,
    /// `(line, reason)` for every line that could not be applied.
    pub skipped: Vec<(String, String)>,
}

impl InjectionReport {
    pub fn applied(&self) -> usize {
        self.plans_added.len() + self.plans_reinforced.len() + self.events + self.beliefs
    }
}

/// Names of the processes the kill switch terminated.
pub type KillNotice = Vec<String>;

pub struct Injector {
    mind: Arc<dyn AgentMind>,
    store: EphemeralStore,
    sampler: Arc<dyn MemorySampler>,
    settings: InjectorSettings,
    nap: Mutex<Option<ActivePolicy<NapPolicy>>>,
    collector: Mutex<Option<ActivePolicy<CollectorPolicy>>>,
    kill_notice: Option<mpsc::UnboundedSender<KillNotice>>,
}

impl Injector {
    pub fn new(mind: Arc<dyn AgentMind>, settings: InjectorSettings) -> Self {
        Self {
            mind,
            store: EphemeralStore::new(),
            sampler: Arc::new(ProcMeminfo::default()),
            settings,
            nap: Mutex::new(None),
            collector: Mutex::new(None),
            kill_notice: None,
        }
    }

    pub fn with_sampler(mut self, sampler: Arc<dyn MemorySampler>) -> Self {
        self.sampler = sampler;
        self
    }

    /// Channel told when the kill switch fires, so the owner can end its
    /// cognitive session.
    pub fn with_kill_notice(mut self, notice: mpsc::UnboundedSender<KillNotice>) -> Self {
        self.kill_notice = Some(notice);
        self
    }

    pub fn store(&self) -> &EphemeralStore {
        &self.store
    }

    pub fn mind(&self) -> &Arc<dyn AgentMind> {
        &self.mind
    }

    /// Apply every non-empty line of `text` to the mind.
    pub fn inject(&self, text: &str) -> InjectionReport {
        let mut report = InjectionReport::default();
        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if let Err(e) = self.apply(line, &mut report) {
                error!("Failed to process line '{}': {}", line, e);
                report.skipped.push((line.to_string(), e.to_string()));
            }
        }
        if !report.skipped.is_empty() {
            warn!(
                "Injected {} of {} lines",
                report.applied(),
                report.applied() + report.skipped.len()
            );
        }
        report
    }

    fn apply(&self, line: &str, report: &mut InjectionReport) -> Result<()> {
        match classify(line) {
            Directive::PlanRule(plan) => match self.store.admit(self.mind.as_ref(), plan)? {
                Admission::Added { label } => {
                    info!("[{}] New ephemeral plan @{}", self.mind.name(), label);
                    report.plans_added.push(label);
                }
                Admission::Reinforced { label, .. } => report.plans_reinforced.push(label),
            },
            Directive::Event(trigger) => {
                debug!("[{}] Event {}", self.mind.name(), trigger);
                self.mind.raise_event(trigger)?;
                report.events += 1;
            }
            Directive::BareBelief { literal } => {
                let mut belief = Literal::parse(&literal)?;
                belief.annotate_provenance();
                debug!("[{}] Belief {}", self.mind.name(), belief);
                self.mind.raise_event(Trigger::add_belief(belief))?;
                report.beliefs += 1;
            }
        }
        Ok(())
    }

    // ============================================================
    // Memory policies
    // ============================================================

    pub fn nap_policy(&self) -> Option<NapPolicy> {
        self.nap.lock().as_ref().map(|active| active.policy.clone())
    }

    pub fn collector_policy(&self) -> Option<CollectorPolicy> {
        self.collector.lock().as_ref().map(|active| active.policy.clone())
    }

    /// Check host RAM every few seconds and consolidate when usage exceeds
    /// `ram_threshold_percent`. Replaces any previous Nap policy.
    pub fn configure_nap(
        self: &Arc<Self>,
        keep_count: usize,
        ram_threshold_percent: f64,
    ) -> Result<()> {
        self.install_nap(NapPolicy::from_percent(keep_count, ram_threshold_percent))
    }

    /// Install `policy` and its periodic RAM check. An invalid policy leaves
    /// the current one in place.
    pub fn install_nap(self: &Arc<Self>, policy: NapPolicy) -> Result<()> {
        policy.validate()?;
        let cancel = CancellationToken::new();
        let weak: Weak<Self> = Arc::downgrade(self);
        spawn_periodic(self.settings.nap_check_interval, cancel.clone(), move || {
            weak.upgrade().map(|injector| async move {
                injector.check_pressure().await;
            })
        })?;
        info!(
            "[{}] Nap enabled: keep {} plans above {:.0}% RAM",
            self.mind.name(),
            policy.keep_count,
            policy.ram_threshold_fraction * 100.0
        );
        *self.nap.lock() = Some(ActivePolicy::new(policy, cancel));
        Ok(())
    }

    /// Prune ephemeral plans down to `keep_count` every `period_minutes`.
    /// Replaces any previous Collector policy.
    pub fn configure_collector(
        self: &Arc<Self>,
        keep_count: usize,
        period_minutes: u64,
    ) -> Result<()> {
        self.install_collector(CollectorPolicy::from_minutes(keep_count, period_minutes))
    }

    pub fn install_collector(self: &Arc<Self>, policy: CollectorPolicy) -> Result<()> {
        let cancel = CancellationToken::new();
        let weak: Weak<Self> = Arc::downgrade(self);
        spawn_periodic(policy.period, cancel.clone(), move || {
            weak.upgrade().map(|injector| async move {
                injector.collect();
            })
        })?;
        info!(
            "[{}] Collector enabled: keep {} plans every {:?}",
            self.mind.name(),
            policy.keep_count,
            policy.period
        );
        *self.collector.lock() = Some(ActivePolicy::new(policy, cancel));
        Ok(())
    }

    pub fn disable_nap(&self) {
        self.nap.lock().take();
    }

    pub fn disable_collector(&self) {
        self.collector.lock().take();
    }

    /// One Collector pass. No-op without a Collector policy.
    pub fn collect(&self) -> EvictionReport {
        let Some(policy) = self.collector_policy() else {
            return EvictionReport::default();
        };
        debug!("[{}] Collector pass", self.mind.name());
        self.store
            .evict(self.mind.as_ref(), policy.keep_count, EvictionMode::Prune)
    }

    /// One Nap check: sample RAM, consolidate above the threshold and engage
    /// the kill switch if usage stays above the panic threshold.
    pub async fn check_pressure(&self) -> PressureOutcome {
        let Some(policy) = self.nap_policy() else {
            return PressureOutcome::Disabled;
        };
        let usage = match self.sampler.usage() {
            Ok(usage) => usage,
            Err(e) => {
                warn!("Failed to sample host RAM: {}", e);
                return PressureOutcome::Unavailable(e.to_string());
            }
        };
        if usage <= policy.ram_threshold_fraction {
            return PressureOutcome::Normal { usage };
        }

        warn!(
            "[{}] RAM usage critical ({:.1}%), consolidating ephemeral plans",
            self.mind.name(),
            usage * 100.0
        );
        let report = self
            .store
            .evict(self.mind.as_ref(), policy.keep_count, EvictionMode::Promote);

        let usage = self.sampler.usage().unwrap_or(usage);
        if usage <= self.settings.panic_threshold {
            return PressureOutcome::Relieved { usage, report };
        }

        error!(
            "[{}] RAM exhausted ({:.1}%) after consolidation, engaging kill switch",
            self.mind.name(),
            usage * 100.0
        );
        let killed = if self.settings.kill_switch.is_enabled() {
            self.settings.kill_switch.engage().await
        } else {
            error!("Kill switch disabled, no process terminated");
            Vec::new()
        };
        if let Some(notice) = &self.kill_notice {
            let _ = notice.send(killed.clone());
        }
        PressureOutcome::Exhausted {
            usage,
            report,
            killed,
        }
    }
}
