//! Athena Cognition - the cognitive layer attached to a BDI agent
//!
//! - Injector: classifies model output and applies it to the mind; new plans
//!   start ephemeral and are pruned or promoted by the Nap/Collector policies
//! - Activity monitor: wakes cognition on idleness or belief triggers
//! - `Athena`: the facade a host agent drives

pub mod athena;
pub mod config;
pub mod context;
pub mod ephemeral;
pub mod injection;
pub mod monitor;
pub mod policy;
pub mod pressure;

pub use athena::Athena;
pub use config::AthenaConfig;
pub use context::{resolve_content, CognitiveContext};
pub use ephemeral::{Admission, EphemeralStore, EvictionMode, EvictionReport};
pub use injection::{InjectionReport, Injector, KillNotice};
pub use monitor::{ActivityMonitor, MonitorSettings, TickOutcome, TriggerSet};
pub use policy::{CollectorPolicy, InjectorSettings, NapPolicy};
pub use pressure::{parse_meminfo, KillSwitch, MemorySampler, PressureOutcome, ProcMeminfo};
