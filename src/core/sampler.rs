//! Process and host gauges.
//!
//! # Responsibilities
//! - Provide the memory baseline used for per-request memory deltas
//! - Sample CPU/memory gauges for the metrics report
//!
//! # Design Decisions
//! - Pull-based: gauges are read at call time, never cached between requests
//! - Injected into `MonitorCore` so tests can use a fixed sampler
//! - The per-request baseline reads memory from its own `System`; the CPU
//!   figure only moves between metrics samples

use std::sync::Mutex;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use sysinfo::{Pid, ProcessRefreshKind, System};

/// Host-level gauges.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OsGauges {
    /// Process CPU usage, percent, capped at 100.
    pub cpu: f64,
    /// Host memory in use, percent.
    pub memory: f64,
    /// Resident set size of this process in bytes.
    pub rss: u64,
    /// Virtual memory of this process in bytes.
    pub virtual_memory: u64,
}

/// Process-level gauges.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessGauges {
    /// Seconds since the sampler was created.
    pub uptime: f64,
}

/// Source of process gauges for the monitor.
pub trait SystemSampler: Send + Sync {
    /// Current memory footprint in bytes, used as the per-request baseline.
    fn memory_used(&self) -> u64;

    fn sample(&self) -> (OsGauges, ProcessGauges);
}

/// Sampler backed by `sysinfo` for the current process.
pub struct ProcessSampler {
    system: Mutex<System>,
    baseline: Mutex<System>,
    pid: Option<Pid>,
    started: Instant,
}

impl ProcessSampler {
    pub fn new() -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                tracing::warn!(error = %e, "Process gauges unavailable on this platform");
                None
            }
        };
        Self {
            system: Mutex::new(System::new()),
            baseline: Mutex::new(System::new()),
            pid,
            started: Instant::now(),
        }
    }
}

impl Default for ProcessSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemSampler for ProcessSampler {
    fn memory_used(&self) -> u64 {
        let Some(pid) = self.pid else { return 0 };
        let mut system = self.baseline.lock().unwrap_or_else(|e| e.into_inner());
        if !system.refresh_process_specifics(pid, ProcessRefreshKind::new().with_memory()) {
            return 0;
        }
        system.process(pid).map(|p| p.memory()).unwrap_or(0)
    }

    fn sample(&self) -> (OsGauges, ProcessGauges) {
        let mut system = self.system.lock().unwrap_or_else(|e| e.into_inner());
        system.refresh_memory();

        let total = system.total_memory();
        let memory = if total > 0 {
            (total.saturating_sub(system.available_memory())) as f64 / total as f64 * 100.0
        } else {
            0.0
        };

        let mut os = OsGauges {
            memory,
            ..Default::default()
        };
        if let Some(pid) = self.pid {
            if system.refresh_process(pid) {
                if let Some(process) = system.process(pid) {
                    os.cpu = (process.cpu_usage() as f64).min(100.0);
                    os.rss = process.memory();
                    os.virtual_memory = process.virtual_memory();
                }
            }
        }

        let process = ProcessGauges {
            uptime: self.started.elapsed().as_secs_f64(),
        };
        (os, process)
    }
}

/// Sampler returning constant values, for hosts that do not want gauges.
#[derive(Debug, Clone, Default)]
pub struct FixedSampler {
    pub memory: u64,
    pub os: OsGauges,
    pub process: ProcessGauges,
}

impl SystemSampler for FixedSampler {
    fn memory_used(&self) -> u64 {
        self.memory
    }

    fn sample(&self) -> (OsGauges, ProcessGauges) {
        (self.os.clone(), self.process.clone())
    }
}
