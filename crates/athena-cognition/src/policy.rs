//! Memory policies and the periodic tasks that enforce them

use crate::pressure::KillSwitch;
use athena_core::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Consolidate under RAM pressure: keep the most used ephemeral plans as
/// permanent ones, forget the rest.
#[derive(Clone, Debug, PartialEq)]
pub struct NapPolicy {
    pub keep_count: usize,
    pub ram_threshold_fraction: f64,
}

impl NapPolicy {
    pub fn from_percent(keep_count: usize, ram_threshold_percent: f64) -> Self {
        Self {
            keep_count,
            ram_threshold_fraction: ram_threshold_percent / 100.0,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.ram_threshold_fraction > 0.0 && self.ram_threshold_fraction <= 1.0) {
            return Err(Error::Config(format!(
                "Nap RAM threshold must be in (0, 100]%, got {}%",
                self.ram_threshold_fraction * 100.0
            )));
        }
        Ok(())
    }
}

/// Periodic prune of ephemeral plans. Never promotes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CollectorPolicy {
    pub keep_count: usize,
    pub period: Duration,
}

impl CollectorPolicy {
    pub fn from_minutes(keep_count: usize, period_minutes: u64) -> Self {
        Self {
            keep_count,
            period: Duration::from_secs(period_minutes * 60),
        }
    }
}

/// Fixed parts of the injector's memory management.
#[derive(Clone, Debug)]
pub struct InjectorSettings {
    /// How often the Nap policy samples host RAM.
    pub nap_check_interval: Duration,
    /// RAM usage still above this after consolidation engages the kill switch.
    pub panic_threshold: f64,
    pub kill_switch: KillSwitch,
}

impl Default for InjectorSettings {
    fn default() -> Self {
        Self {
            nap_check_interval: Duration::from_secs(10),
            panic_threshold: 0.95,
            kill_switch: KillSwitch::new(vec!["ollama".into()]),
        }
    }
}

/// A configured policy together with the task enforcing it. Dropping it
/// stops the task.
pub(crate) struct ActivePolicy<P> {
    pub(crate) policy: P,
    cancel: CancellationToken,
}

impl<P> ActivePolicy<P> {
    pub(crate) fn new(policy: P, cancel: CancellationToken) -> Self {
        Self { policy, cancel }
    }
}

impl<P> Drop for ActivePolicy<P> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Run `tick` every `period`, first after one full period, until `cancel`
/// fires or `tick` returns `None`. A zero period is rejected.
pub(crate) fn spawn_periodic<F, Fut>(
    period: Duration,
    cancel: CancellationToken,
    mut tick: F,
) -> Result<()>
where
    F: FnMut() -> Option<Fut> + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    if period.is_zero() {
        return Err(Error::Config("periodic task needs a non-zero period".into()));
    }
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => match tick() {
                    Some(run) => run.await,
                    None => break,
                },
            }
        }
    });
    Ok(())
}
