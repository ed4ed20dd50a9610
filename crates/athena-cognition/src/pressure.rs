//! Host memory sampling and the kill switch

use std::io;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{debug, error};

use crate::ephemeral::EvictionReport;

/// Source of host RAM usage as a fraction in `[0.0, 1.0]`.
pub trait MemorySampler: Send + Sync {
    fn usage(&self) -> io::Result<f64>;
}

/// Reads host totals from a meminfo file (`/proc/meminfo` by default).
#[derive(Clone, Debug)]
pub struct ProcMeminfo {
    path: PathBuf,
}

impl Default for ProcMeminfo {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/proc/meminfo"),
        }
    }
}

impl ProcMeminfo {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl MemorySampler for ProcMeminfo {
    fn usage(&self) -> io::Result<f64> {
        let content = std::fs::read_to_string(&self.path)?;
        parse_meminfo(&content).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("MemTotal/MemAvailable missing from {}", self.path.display()),
            )
        })
    }
}

/// `1 - MemAvailable / MemTotal`, or 0 when the total is zero.
pub fn parse_meminfo(content: &str) -> Option<f64> {
    let mut total = None;
    let mut available = None;
    for line in content.lines() {
        if line.starts_with("MemTotal:") {
            total = kilobytes(line);
        } else if line.starts_with("MemAvailable:") {
            available = kilobytes(line);
        }
    }
    let (total, available) = (total?, available?);
    if total == 0 {
        return Some(0.0);
    }
    Some(1.0 - available as f64 / total as f64)
}

fn kilobytes(line: &str) -> Option<u64> {
    let digits: String = line.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Terminates the inference server when consolidation did not free enough
/// memory. Only exact process names from the allow-list are targeted.
#[derive(Clone, Debug, Default)]
pub struct KillSwitch {
    process_names: Vec<String>,
}

impl KillSwitch {
    pub fn new(process_names: Vec<String>) -> Self {
        Self { process_names }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        !self.process_names.is_empty()
    }

    pub fn process_names(&self) -> &[String] {
        &self.process_names
    }

    /// Signal every allow-listed process. Returns the names that matched a
    /// running process.
    pub async fn engage(&self) -> Vec<String> {
        let mut killed = Vec::new();
        for name in &self.process_names {
            match Command::new("pkill").arg("-x").arg(name).output().await {
                Ok(output) if output.status.success() => {
                    error!("Kill switch terminated process '{}'", name);
                    killed.push(name.clone());
                }
                Ok(_) => debug!("Kill switch: no process named '{}'", name),
                Err(e) => error!("Failed to execute kill switch for '{}': {}", name, e),
            }
        }
        killed
    }
}

/// Result of one Nap check.
#[derive(Clone, Debug, PartialEq)]
pub enum PressureOutcome {
    /// No Nap policy is configured.
    Disabled,
    /// RAM could not be measured.
    Unavailable(String),
    /// Usage at or below the threshold.
    Normal { usage: f64 },
    /// Consolidation ran and usage fell below the panic threshold.
    Relieved { usage: f64, report: EvictionReport },
    /// Consolidation was not enough; the kill switch was engaged.
    Exhausted {
        usage: f64,
        report: EvictionReport,
        killed: Vec<String>,
    },
}
