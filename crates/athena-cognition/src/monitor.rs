//! Activity/trigger monitor
//!
//! Polls the agent on a fixed rate and wakes cognition when the agent has
//! been idle too long or a trigger condition holds in its beliefs. Critical
//! triggers preempt whatever the coordinator is doing.

use crate::context::CognitiveContext;
use crate::injection::Injector;
use athena_agent::{CognitiveCoordinator, CognitiveRequest};
use athena_core::{goal_command, AgentMind, Error, Literal, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Clone, Debug)]
pub struct MonitorSettings {
    /// Inactivity after which the agent counts as idle.
    pub timeout: Duration,
    pub poll_interval: Duration,
    pub initial_delay: Duration,
    pub triggers: Vec<String>,
    pub critical_triggers: Vec<String>,
    /// Goals adopted after every successful background thought.
    pub post_plans: Vec<String>,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

impl MonitorSettings {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            poll_interval: Duration::from_millis(500),
            initial_delay: Duration::from_millis(1000),
            triggers: Vec::new(),
            critical_triggers: Vec::new(),
            post_plans: Vec::new(),
        }
    }

    pub fn with_triggers(mut self, triggers: Vec<String>) -> Self {
        self.triggers = triggers;
        self
    }

    pub fn with_critical_triggers(mut self, triggers: Vec<String>) -> Self {
        self.critical_triggers = triggers;
        self
    }

    pub fn with_post_plans(mut self, post_plans: Vec<String>) -> Self {
        self.post_plans = post_plans;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration, initial_delay: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.initial_delay = initial_delay;
        self
    }
}

/// Ordered trigger conditions, parsed once. Conditions that do not parse
/// are reported when the set is built and never fire.
#[derive(Clone, Debug, Default)]
pub struct TriggerSet {
    conditions: Vec<(String, Literal)>,
}

impl TriggerSet {
    pub fn parse(triggers: &[String]) -> Self {
        let conditions = triggers
            .iter()
            .filter_map(|raw| match Literal::parse(raw) {
                Ok(literal) => Some((raw.clone(), literal)),
                Err(e) => {
                    let e = Error::invalid_trigger(raw.as_str(), e.to_string());
                    warn!("Ignoring trigger: {}", e);
                    None
                }
            })
            .collect();
        Self { conditions }
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// First condition that holds in the mind, as configured.
    pub fn first_fired(&self, mind: &dyn AgentMind) -> Option<&str> {
        self.conditions
            .iter()
            .find(|(_, condition)| mind.holds(condition))
            .map(|(raw, _)| raw.as_str())
    }
}

/// What one monitor tick did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// The agent is not thinking.
    Dormant,
    /// Not idle and no trigger fired.
    Quiet,
    /// The coordinator is busy and nothing critical fired.
    Busy,
    /// A background thought was started.
    Dispatched { reason: String, preempted: bool },
    /// The coordinator refused the job.
    Refused { reason: String },
}

struct MonitorInner {
    timeout: Duration,
    triggers: TriggerSet,
    critical: TriggerSet,
    post_plans: Vec<String>,
    last_activity: Mutex<Instant>,
    mind: Arc<dyn AgentMind>,
    coordinator: Arc<CognitiveCoordinator>,
    injector: Arc<Injector>,
    context: Arc<CognitiveContext>,
}

pub struct ActivityMonitor {
    inner: Arc<MonitorInner>,
    poll_interval: Duration,
    initial_delay: Duration,
    shutdown: CancellationToken,
}

impl ActivityMonitor {
    /// Build a monitor without starting its loop; see [`ActivityMonitor::start`].
    pub fn new(
        settings: MonitorSettings,
        mind: Arc<dyn AgentMind>,
        coordinator: Arc<CognitiveCoordinator>,
        injector: Arc<Injector>,
        context: Arc<CognitiveContext>,
    ) -> Self {
        let inner = MonitorInner {
            timeout: settings.timeout,
            triggers: TriggerSet::parse(&settings.triggers),
            critical: TriggerSet::parse(&settings.critical_triggers),
            post_plans: settings.post_plans.iter().map(|g| goal_command(g)).collect(),
            last_activity: Mutex::new(Instant::now()),
            mind,
            coordinator,
            injector,
            context,
        };
        Self {
            inner: Arc::new(inner),
            poll_interval: settings.poll_interval,
            initial_delay: settings.initial_delay,
            shutdown: CancellationToken::new(),
        }
    }

    /// Spawn the polling loop. Must be called from within a Tokio runtime.
    /// A zero poll interval is rejected.
    pub fn start(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(Error::Config("monitor poll interval must be positive".into()));
        }
        let inner = self.inner.clone();
        let stop = self.shutdown.clone();
        let mut ticker = interval_at(Instant::now() + self.initial_delay, self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(
            "[{}] Activity monitor started ({} triggers, {} critical)",
            inner.mind.name(),
            inner.triggers.len(),
            inner.critical.len()
        );
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = ticker.tick() => {
                        inner.tick();
                    }
                }
            }
            debug!("[{}] Activity monitor stopped", inner.mind.name());
        });
        Ok(())
    }

    /// Evaluate idleness and triggers once and act on the result.
    pub fn tick(&self) -> TickOutcome {
        self.inner.tick()
    }

    /// Reset the idle clock.
    pub fn notify_activity(&self) {
        self.inner.notify_activity();
    }

    pub fn idle_for(&self) -> Duration {
        self.inner.last_activity.lock().elapsed()
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_running(&self) -> bool {
        !self.shutdown.is_cancelled()
    }
}

impl Drop for ActivityMonitor {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl MonitorInner {
    fn notify_activity(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    fn tick(&self) -> TickOutcome {
        if !self.context.is_thinking() {
            return TickOutcome::Dormant;
        }

        let idle = self.last_activity.lock().elapsed() > self.timeout;
        let fired = self.triggers.first_fired(self.mind.as_ref());
        let critical = self.critical.first_fired(self.mind.as_ref());

        let mut preempted = false;
        if self.coordinator.is_busy() {
            if critical.is_none() {
                return TickOutcome::Busy;
            }
            warn!(
                "[{}] Critical trigger while thinking, interrupting",
                self.mind.name()
            );
            preempted = self.coordinator.cancel();
        }

        let reason = match (critical, fired) {
            (Some(t), _) => format!("CRITICAL TRIGGER: {}", t),
            (None, Some(t)) => format!("Trigger: {}", t),
            (None, None) if idle => "Agent is idle.".to_string(),
            (None, None) => return TickOutcome::Quiet,
        };

        self.notify_activity();
        info!("[{}] Athena activating: {}", self.mind.name(), reason);

        let request = CognitiveRequest::new(format!("System Alert: {} What should I do?", reason))
            .with_persona(self.context.persona())
            .with_plans(self.context.mas());
        let handle = match self.coordinator.dispatch(request) {
            Ok(handle) => handle,
            Err(e) => {
                debug!("[{}] Background thought refused: {}", self.mind.name(), e);
                return TickOutcome::Refused { reason };
            }
        };

        let injector = self.injector.clone();
        let post_plans = self.post_plans.clone();
        tokio::spawn(async move {
            match handle.wait().await {
                Ok(result) => {
                    injector.inject(&result);
                    for goal in &post_plans {
                        injector.inject(goal);
                    }
                }
                Err(e) => debug!("Background thought produced nothing: {}", e),
            }
        });

        TickOutcome::Dispatched { reason, preempted }
    }
}
