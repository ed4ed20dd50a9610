//! Athena configuration
//!
//! Every tunable of the cognitive layer in one place. Loaded from TOML at
//! startup, falls back to defaults if no config file exists.

use crate::monitor::MonitorSettings;
use crate::policy::InjectorSettings;
use crate::pressure::KillSwitch;
use athena_agent::{CoordinatorConfig, PromptTemplates};
use athena_core::{Error, Result};
use athena_llm::ollama::{DEFAULT_MODEL, DEFAULT_OLLAMA_URL};
use athena_llm::{OllamaProvider, DEFAULT_KEEP_ALIVE, DEFAULT_NUM_CTX};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level Athena configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AthenaConfig {
    /// The agent this layer is attached to.
    pub agent: AgentSection,
    /// Inference endpoint and session tuning.
    pub inference: InferenceConfig,
    /// Cognitive task coordinator.
    pub coordinator: CoordinatorSection,
    /// Background activity/trigger monitor.
    pub monitor: MonitorConfig,
    /// RAM-pressure consolidation.
    pub nap: NapConfig,
    /// Periodic pruning of ephemeral plans.
    pub collector: CollectorConfig,
    /// Last-resort termination of the inference process.
    pub kill_switch: KillSwitchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    /// Agent name; also the inference session key.
    pub name: String,
    /// Persona text or path to a persona file.
    pub persona: Option<String>,
    /// Plan library loaded into the mind at startup.
    pub behavior: Option<PathBuf>,
    /// Other agents known to the router.
    pub known_agents: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Generate endpoint.
    pub url: String,
    /// Default model.
    pub model: String,
    /// Context window requested per call.
    pub num_ctx: u32,
    /// How long the server keeps the model loaded.
    pub keep_alive: String,
    /// HTTP timeout for one generate call.
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorSection {
    /// Watchdog for one cognitive task.
    pub watchdog_secs: u64,
    /// Replacement translation template file.
    pub translation_template: Option<PathBuf>,
    /// Replacement delegation template file.
    pub delegation_template: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub enabled: bool,
    /// Inactivity after which the agent counts as idle.
    pub timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub initial_delay_ms: u64,
    /// Belief conditions that wake cognition when the coordinator is idle.
    pub triggers: Vec<String>,
    /// Belief conditions that preempt in-flight cognition.
    pub critical_triggers: Vec<String>,
    /// Goals adopted after each successful background thought.
    pub post_plans: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NapConfig {
    pub enabled: bool,
    /// Ephemeral plans promoted when RAM runs high.
    pub keep_count: usize,
    /// Host RAM usage (0.0 - 1.0) that triggers consolidation.
    pub ram_threshold_fraction: f64,
    pub check_interval_secs: u64,
    /// Usage still above this after consolidation engages the kill switch.
    pub panic_threshold_fraction: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    pub enabled: bool,
    /// Ephemeral plans kept per collection.
    pub keep_count: usize,
    pub period_minutes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KillSwitchConfig {
    pub enabled: bool,
    /// Exact process names terminated under RAM exhaustion.
    pub process_names: Vec<String>,
}

// ============================================================
// Defaults
// ============================================================

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            name: "athena".into(),
            persona: None,
            behavior: None,
            known_agents: Vec::new(),
        }
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_OLLAMA_URL.into(),
            model: DEFAULT_MODEL.into(),
            num_ctx: DEFAULT_NUM_CTX,
            keep_alive: DEFAULT_KEEP_ALIVE.into(),
            request_timeout_secs: 20 * 60,
        }
    }
}

impl Default for CoordinatorSection {
    fn default() -> Self {
        Self {
            watchdog_secs: 30,
            translation_template: None,
            delegation_template: None,
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            timeout_ms: 60_000,
            poll_interval_ms: 500,
            initial_delay_ms: 1_000,
            triggers: Vec::new(),
            critical_triggers: Vec::new(),
            post_plans: Vec::new(),
        }
    }
}

impl Default for NapConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            keep_count: 10,
            ram_threshold_fraction: 0.85,
            check_interval_secs: 10,
            panic_threshold_fraction: 0.95,
        }
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self { enabled: false, keep_count: 10, period_minutes: 10 }
    }
}

impl Default for KillSwitchConfig {
    fn default() -> Self {
        Self { enabled: true, process_names: vec!["ollama".into()] }
    }
}

// ============================================================
// Loading
// ============================================================

impl AthenaConfig {
    /// Load config from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}, using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!("No config at {}, using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Apply `OLLAMA_URL` and `ATHENA_MODEL` from the environment.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("OLLAMA_URL") {
            self.inference.url = url;
        }
        if let Ok(model) = std::env::var("ATHENA_MODEL") {
            self.inference.model = model;
        }
        self
    }

    /// Reject values the runtime cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.agent.name.trim().is_empty() {
            return Err(Error::Config("agent.name must not be empty".into()));
        }
        for (key, value) in [
            ("nap.ram_threshold_fraction", self.nap.ram_threshold_fraction),
            ("nap.panic_threshold_fraction", self.nap.panic_threshold_fraction),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(Error::Config(format!("{} must be in (0, 1], got {}", key, value)));
            }
        }
        if self.monitor.poll_interval_ms == 0 {
            return Err(Error::Config("monitor.poll_interval_ms must be positive".into()));
        }
        if self.nap.check_interval_secs == 0 {
            return Err(Error::Config("nap.check_interval_secs must be positive".into()));
        }
        if self.collector.period_minutes == 0 {
            return Err(Error::Config("collector.period_minutes must be positive".into()));
        }
        if self.coordinator.watchdog_secs == 0 {
            return Err(Error::Config("coordinator.watchdog_secs must be positive".into()));
        }
        Ok(())
    }

    /// Write the current config as TOML (for generating a default config file).
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    pub fn provider(&self) -> OllamaProvider {
        OllamaProvider::new(&self.inference.url, &self.inference.model)
            .with_num_ctx(self.inference.num_ctx)
            .with_keep_alive(&self.inference.keep_alive)
            .with_request_timeout(Duration::from_secs(self.inference.request_timeout_secs))
    }

    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            watchdog: Duration::from_secs(self.coordinator.watchdog_secs),
            templates: PromptTemplates::load(
                self.coordinator.translation_template.as_deref(),
                self.coordinator.delegation_template.as_deref(),
            ),
        }
    }

    pub fn monitor_settings(&self) -> MonitorSettings {
        MonitorSettings {
            timeout: Duration::from_millis(self.monitor.timeout_ms),
            poll_interval: Duration::from_millis(self.monitor.poll_interval_ms),
            initial_delay: Duration::from_millis(self.monitor.initial_delay_ms),
            triggers: self.monitor.triggers.clone(),
            critical_triggers: self.monitor.critical_triggers.clone(),
            post_plans: self.monitor.post_plans.clone(),
        }
    }

    pub fn injector_settings(&self) -> InjectorSettings {
        let kill_switch = if self.kill_switch.enabled {
            KillSwitch::new(self.kill_switch.process_names.clone())
        } else {
            KillSwitch::disabled()
        };
        InjectorSettings {
            nap_check_interval: Duration::from_secs(self.nap.check_interval_secs),
            panic_threshold: self.nap.panic_threshold_fraction,
            kill_switch,
        }
    }
}
