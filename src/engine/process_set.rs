//! Tracking of monitored processes by name.
//!
//! Each configured name gets one [`ProcessHandle`] holding the instances
//! found when the name was attached. Instances are bound once: processes
//! that start later are invisible until [`ProcessMetricSet::refresh`] is
//! called, and instances that exit keep their slot and contribute zero.

use crate::collector::procfs::process::{CLK_TCK, PAGE_SIZE, ProcessProbe};
use crate::collector::traits::FileSystem;
use tracing::{debug, warn};

const BYTES_PER_MB: f64 = 1_048_576.0;

/// One bound instance of a monitored process.
#[derive(Debug)]
struct Instance {
    pid: u32,
    /// utime + stime at the last successful read, in clock ticks.
    last_ticks: u64,
}

/// All instances of one monitored process name.
#[derive(Debug)]
pub struct ProcessHandle {
    name: String,
    instances: Vec<Instance>,
}

impl ProcessHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }
}

/// Summed readings for one process name in one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessAggregates {
    pub name: String,
    /// Sum of per-instance CPU%, each rounded to one decimal before summing.
    /// Not divided by core count, so the sum can exceed 100 on multicore.
    pub cpu_percent: f64,
    /// Sum of per-instance resident memory in MB.
    pub mem_mb: f64,
}

/// Registry of monitored process names and their bound instances.
pub struct ProcessMetricSet<F: FileSystem> {
    probe: ProcessProbe<F>,
    handles: Vec<ProcessHandle>,
}

impl<F: FileSystem> ProcessMetricSet<F> {
    pub fn new(fs: F, proc_path: impl Into<String>) -> Self {
        Self {
            probe: ProcessProbe::new(fs, proc_path),
            handles: Vec::new(),
        }
    }

    /// Binds all currently running instances of `name`.
    ///
    /// Zero matches is a valid handle that aggregates to zero. Instances
    /// whose baseline read fails (exit race, permissions) are skipped.
    pub fn attach(&mut self, name: &str) {
        let pids = match self.probe.pids_by_name(name) {
            Ok(pids) => pids,
            Err(e) => {
                warn!("cannot enumerate instances of {name}: {e}");
                Vec::new()
            }
        };

        let mut instances = Vec::new();
        for pid in pids {
            match self.probe.read_stat(pid) {
                Ok(stat) => instances.push(Instance {
                    pid,
                    last_ticks: stat.utime + stat.stime,
                }),
                Err(e) => warn!("skipping instance {pid} of {name}: {e}"),
            }
        }

        debug!("attached {name}: {} instances", instances.len());
        self.handles.push(ProcessHandle {
            name: name.to_string(),
            instances,
        });
    }

    /// Re-enumerates every handle: newly started instances are bound and
    /// gone ones dropped. Surviving instances keep their tick baseline.
    pub fn refresh(&mut self) {
        for handle in &mut self.handles {
            let pids = match self.probe.pids_by_name(&handle.name) {
                Ok(pids) => pids,
                Err(e) => {
                    warn!("cannot re-enumerate {}: {e}", handle.name);
                    continue;
                }
            };

            handle.instances.retain(|i| pids.contains(&i.pid));
            for pid in pids {
                if handle.instances.iter().any(|i| i.pid == pid) {
                    continue;
                }
                match self.probe.read_stat(pid) {
                    Ok(stat) => handle.instances.push(Instance {
                        pid,
                        last_ticks: stat.utime + stat.stime,
                    }),
                    Err(e) => warn!("skipping instance {pid} of {}: {e}", handle.name),
                }
            }
        }
    }

    /// Attached handles in configured order.
    pub fn handles(&self) -> &[ProcessHandle] {
        &self.handles
    }

    /// Reads every bound instance and returns one aggregate per handle, in
    /// configured order.
    ///
    /// An instance whose read fails (usually: it exited) contributes zero
    /// for this cycle but keeps its slot; failures in one handle never
    /// affect another.
    pub fn sample(&mut self, elapsed_secs: f64) -> Vec<ProcessAggregates> {
        let mut aggregates = Vec::with_capacity(self.handles.len());

        for handle in &mut self.handles {
            let mut cpu_sum = 0.0;
            let mut mem_sum = 0.0;

            for instance in &mut handle.instances {
                let stat = match self.probe.read_stat(instance.pid) {
                    Ok(stat) => stat,
                    Err(e) => {
                        debug!(
                            "instance {} of {} unreadable, counting zero: {e}",
                            instance.pid, handle.name
                        );
                        continue;
                    }
                };

                let ticks = stat.utime + stat.stime;
                let d_ticks = ticks.saturating_sub(instance.last_ticks);
                instance.last_ticks = ticks;

                let cpu = if elapsed_secs > 0.0 {
                    100.0 * d_ticks as f64 / CLK_TCK as f64 / elapsed_secs
                } else {
                    0.0
                };
                // Round each instance to one decimal before summing.
                cpu_sum += (cpu * 10.0).round() / 10.0;
                mem_sum += stat.rss.max(0) as f64 * PAGE_SIZE as f64 / BYTES_PER_MB;
            }

            aggregates.push(ProcessAggregates {
                name: handle.name.clone(),
                cpu_percent: cpu_sum,
                mem_mb: mem_sum,
            });
        }

        aggregates
    }
}
