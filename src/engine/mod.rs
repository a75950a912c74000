//! Sampling engine: one ordered pass over the enabled catalogue per cycle.

pub mod process_set;
pub mod readings;
pub mod sources;

use crate::catalog::{self, MetricKey, Source, Value, descriptor, format_value};
use crate::collector::procfs::system::SystemReader;
use crate::collector::traits::FileSystem;
use crate::engine::process_set::ProcessMetricSet;
use crate::engine::readings::{
    CounterTracker, CpuTracker, CycleReadings, DiskTracker, NetTracker,
};
use chrono::{DateTime, Local};
use std::collections::HashSet;
use std::time::Instant;
use tracing::{debug, warn};

/// Host identity resolved once at startup and repeated in every record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostIdentity {
    pub node_name: String,
    pub ip: String,
}

impl HostIdentity {
    /// Reads the hostname through the filesystem seam and resolves the
    /// primary local IPv4 via a route probe. Neither lookup is fatal.
    pub fn detect<F: FileSystem>(fs: F, proc_path: &str) -> Self {
        let reader = SystemReader::new(fs, proc_path);
        let node_name = match reader.read_hostname() {
            Ok(name) => name,
            Err(e) => {
                warn!("hostname unavailable: {e}");
                "unknown".to_string()
            }
        };
        let ip = local_ipv4().unwrap_or_else(|| {
            warn!("local IP unavailable");
            "0.0.0.0".to_string()
        });
        Self { node_name, ip }
    }
}

/// Address of the interface the default route would use. The UDP connect
/// performs only a route lookup; no packet is sent.
fn local_ipv4() -> Option<String> {
    let socket = std::net::UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    Some(socket.local_addr().ok()?.ip().to_string())
}

/// One record column: the metric key plus the header title. Process columns
/// carry the process name in the title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub key: MetricKey,
    pub title: String,
}

/// One ordered snapshot of all enabled metric values.
///
/// Built fresh each cycle and consumed once by the writer. Field order
/// matches [`SamplingEngine::columns`]; a failed source contributes an
/// empty-string sentinel so column alignment is preserved.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub taken_at: DateTime<Local>,
    pub fields: Vec<(MetricKey, String)>,
}

impl Sample {
    /// The formatted values in record order.
    pub fn values(&self) -> Vec<String> {
        self.fields.iter().map(|(_, v)| v.clone()).collect()
    }
}

/// Owns the per-cycle read pass, the delta-rate state and the process
/// registry; produces one [`Sample`] per cycle with per-source isolation.
pub struct SamplingEngine<F: FileSystem + Clone> {
    reader: SystemReader<F>,
    identity: HostIdentity,
    /// Enabled keys, normalized to catalogue order at construction.
    enabled_system: Vec<MetricKey>,
    enabled_process: Vec<MetricKey>,
    processes: ProcessMetricSet<F>,
    cpu: CpuTracker,
    disk: DiskTracker,
    net: NetTracker,
    ctxt: CounterTracker,
    intr: CounterTracker,
    last_cycle: Option<Instant>,
}

impl<F: FileSystem + Clone> SamplingEngine<F> {
    /// Builds an engine for the given enabled keys and attaches every
    /// monitored process name in configured order.
    pub fn new(
        fs: F,
        proc_path: &str,
        identity: HostIdentity,
        enabled_system: &[MetricKey],
        enabled_process: &[MetricKey],
        process_names: &[String],
    ) -> Self {
        // Record column order must be catalogue order regardless of how the
        // caller assembled the key lists.
        let system_set: HashSet<MetricKey> = enabled_system.iter().copied().collect();
        let process_set: HashSet<MetricKey> = enabled_process.iter().copied().collect();
        let enabled_system = catalog::system_keys()
            .filter(|k| system_set.contains(k))
            .collect();
        let enabled_process = catalog::process_keys()
            .filter(|k| process_set.contains(k))
            .collect();

        let mut processes = ProcessMetricSet::new(fs.clone(), proc_path);
        for name in process_names {
            processes.attach(name);
        }

        Self {
            reader: SystemReader::new(fs, proc_path),
            identity,
            enabled_system,
            enabled_process,
            processes,
            cpu: CpuTracker::default(),
            disk: DiskTracker::default(),
            net: NetTracker::default(),
            ctxt: CounterTracker::default(),
            intr: CounterTracker::default(),
            last_cycle: None,
        }
    }

    /// The ordered column list for the currently enabled set. The writer's
    /// header is derived from this, so it always matches record order.
    pub fn columns(&self) -> Vec<Column> {
        let mut columns: Vec<Column> = self
            .enabled_system
            .iter()
            .map(|&key| Column {
                key,
                title: key.label().to_string(),
            })
            .collect();

        for handle in self.processes.handles() {
            for &key in &self.enabled_process {
                columns.push(Column {
                    key,
                    title: format!("{}|{}", handle.name(), key.label()),
                });
            }
        }

        columns
    }

    /// Runs one sampling pass against the real clock.
    pub fn sample(&mut self) -> Sample {
        let now = Instant::now();
        let elapsed_secs = self
            .last_cycle
            .map(|t| now.duration_since(t).as_secs_f64())
            .unwrap_or(0.0);
        self.last_cycle = Some(now);
        self.sample_at(Local::now(), elapsed_secs)
    }

    /// Deterministic sampling pass with an explicit wall clock and elapsed
    /// window.
    pub fn sample_at(&mut self, wall: DateTime<Local>, elapsed_secs: f64) -> Sample {
        let raw = self.reader.snapshot();

        let cpu = raw.stat.as_ref().map(|s| self.cpu.update(&s.cpu));
        let ctxt_per_sec = raw
            .stat
            .as_ref()
            .map(|s| self.ctxt.update(s.ctxt, elapsed_secs));
        let intr_per_sec = raw
            .stat
            .as_ref()
            .map(|s| self.intr.update(s.intr_total, elapsed_secs));
        let disk = match (&raw.diskstats, &raw.mounted_devices) {
            (Some(disks), Some(mounted)) => Some(self.disk.update(disks, mounted, elapsed_secs)),
            _ => None,
        };
        let net = raw
            .net_dev
            .as_ref()
            .map(|devs| self.net.update(devs, elapsed_secs));

        let readings = CycleReadings {
            wall,
            node_name: self.identity.node_name.clone(),
            ip: self.identity.ip.clone(),
            raw,
            cpu,
            disk,
            net,
            ctxt_per_sec,
            intr_per_sec,
        };

        let mut fields = Vec::new();

        for &key in &self.enabled_system {
            let desc = descriptor(key);
            let Source::System(source) = desc.source else {
                continue;
            };
            match source(&readings) {
                Ok(value) => fields.push((key, format_value(desc.format, &value))),
                Err(e) => {
                    warn!("{key} failed this cycle: {e}");
                    fields.push((key, String::new()));
                }
            }
        }

        if !self.enabled_process.is_empty() {
            let aggregates = self.processes.sample(elapsed_secs);
            for agg in &aggregates {
                for &key in &self.enabled_process {
                    let desc = descriptor(key);
                    let value = match desc.source {
                        Source::ProcessCpu => agg.cpu_percent,
                        Source::ProcessMem => agg.mem_mb,
                        Source::System(_) => continue,
                    };
                    fields.push((key, format_value(desc.format, &Value::F64(value))));
                }
            }
        }

        debug!("sampled {} fields", fields.len());
        Sample {
            taken_at: wall,
            fields,
        }
    }

    /// Re-enumerates monitored process instances. Not called by the daemon
    /// loop; attach-once is the default behavior.
    pub fn refresh_processes(&mut self) {
        self.processes.refresh();
    }
}
