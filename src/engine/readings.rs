//! Per-cycle readings and delta-rate state.
//!
//! Rate metrics (CPU %, disk and network throughput, context switches) are
//! computed from deltas between consecutive cycles. The trackers here own
//! the previous-cycle counters; they read 0 on the first cycle after startup
//! and on counter regression (reboot or wrap).

use crate::collector::procfs::parser::{CpuTimes, DiskStats, NetDevStats};
use crate::collector::procfs::system::RawSnapshot;
use chrono::{DateTime, Local};
use std::collections::{HashMap, HashSet};

/// One source failed to produce a value this cycle.
///
/// Local to a single metric: the sampling pass records a sentinel for the
/// affected column and moves on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    pub what: &'static str,
}

impl SourceError {
    pub fn new(what: &'static str) -> Self {
        Self { what }
    }
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "source unavailable: {}", self.what)
    }
}

impl std::error::Error for SourceError {}

// ---------------------------------------------------------------------------
// Delta helpers
// ---------------------------------------------------------------------------

/// Compute u64 delta, returning `None` on counter regression.
pub fn du64(curr: u64, prev: u64) -> Option<u64> {
    (curr >= prev).then(|| curr - prev)
}

// ---------------------------------------------------------------------------
// CPU
// ---------------------------------------------------------------------------

/// CPU utilization percentages derived from two `/proc/stat` readings.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CpuPercents {
    /// Share of time not spent idle or waiting for I/O.
    pub busy: f64,
    /// Kernel-mode share (system + irq + softirq).
    pub privileged: f64,
    /// Hard interrupt share.
    pub interrupt: f64,
    /// Soft interrupt share.
    pub deferred: f64,
}

/// Rate tracking state for the aggregate cpu line.
#[derive(Debug, Default)]
pub struct CpuTracker {
    prev: Option<CpuTimes>,
}

impl CpuTracker {
    /// Folds in this cycle's counters and returns the percentages over the
    /// elapsed window. Zeros on the first call and on regression.
    pub fn update(&mut self, curr: &CpuTimes) -> CpuPercents {
        let prev = self.prev.replace(*curr);
        let Some(prev) = prev else {
            return CpuPercents::default();
        };

        let Some(d_total) = du64(curr.total(), prev.total()) else {
            return CpuPercents::default();
        };
        if d_total == 0 {
            return CpuPercents::default();
        }

        let d_idle = du64(curr.idle_all(), prev.idle_all()).unwrap_or(0);
        let d_system = du64(curr.system, prev.system).unwrap_or(0);
        let d_irq = du64(curr.irq, prev.irq).unwrap_or(0);
        let d_softirq = du64(curr.softirq, prev.softirq).unwrap_or(0);

        let total = d_total as f64;
        CpuPercents {
            busy: 100.0 * (1.0 - d_idle as f64 / total),
            privileged: 100.0 * (d_system + d_irq + d_softirq) as f64 / total,
            interrupt: 100.0 * d_irq as f64 / total,
            deferred: 100.0 * d_softirq as f64 / total,
        }
    }
}

// ---------------------------------------------------------------------------
// Monotonic counters (ctxt, intr)
// ---------------------------------------------------------------------------

/// Per-second rate for one monotonic counter.
#[derive(Debug, Default)]
pub struct CounterTracker {
    prev: Option<u64>,
}

impl CounterTracker {
    /// Folds in this cycle's counter value and returns the rate per second.
    pub fn update(&mut self, curr: u64, elapsed_secs: f64) -> f64 {
        let prev = self.prev.replace(curr);
        let Some(prev) = prev else {
            return 0.0;
        };
        if elapsed_secs <= 0.0 {
            return 0.0;
        }
        du64(curr, prev).unwrap_or(0) as f64 / elapsed_secs
    }
}

// ---------------------------------------------------------------------------
// Disk
// ---------------------------------------------------------------------------

/// Disk throughput and latency over one cycle, aggregated across the block
/// devices that back a mount.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DiskRates {
    pub read_kb_per_sec: f64,
    pub write_kb_per_sec: f64,
    pub ms_per_read: f64,
    pub ms_per_write: f64,
    /// Share of wall time with I/O in flight.
    pub busy_percent: f64,
    /// Average request queue depth (weighted io time over wall time).
    pub queue_length: f64,
}

/// Rate tracking state for `/proc/diskstats`.
#[derive(Debug, Default)]
pub struct DiskTracker {
    prev: Option<HashMap<(u32, u32), DiskStats>>,
}

impl DiskTracker {
    /// Folds in this cycle's per-device counters, keeping only devices in
    /// `mounted` so a partition and its parent disk are not counted twice.
    pub fn update(
        &mut self,
        disks: &[DiskStats],
        mounted: &HashSet<(u32, u32)>,
        elapsed_secs: f64,
    ) -> DiskRates {
        let curr: HashMap<(u32, u32), DiskStats> = disks
            .iter()
            .filter(|d| mounted.contains(&(d.major, d.minor)))
            .map(|d| ((d.major, d.minor), d.clone()))
            .collect();

        let prev = self.prev.take();
        let (Some(prev), true) = (prev, elapsed_secs > 0.0) else {
            self.prev = Some(curr);
            return DiskRates::default();
        };

        let mut d_reads = 0u64;
        let mut d_read_sectors = 0u64;
        let mut d_read_time = 0u64;
        let mut d_writes = 0u64;
        let mut d_write_sectors = 0u64;
        let mut d_write_time = 0u64;
        let mut d_io_time = 0u64;
        let mut d_io_weighted = 0u64;

        for (id, c) in &curr {
            let Some(p) = prev.get(id) else {
                continue;
            };
            d_reads += du64(c.reads, p.reads).unwrap_or(0);
            d_read_sectors += du64(c.read_sectors, p.read_sectors).unwrap_or(0);
            d_read_time += du64(c.read_time, p.read_time).unwrap_or(0);
            d_writes += du64(c.writes, p.writes).unwrap_or(0);
            d_write_sectors += du64(c.write_sectors, p.write_sectors).unwrap_or(0);
            d_write_time += du64(c.write_time, p.write_time).unwrap_or(0);
            d_io_time += du64(c.io_time, p.io_time).unwrap_or(0);
            d_io_weighted += du64(c.io_weighted_time, p.io_weighted_time).unwrap_or(0);
        }

        self.prev = Some(curr);

        let elapsed_ms = elapsed_secs * 1000.0;
        DiskRates {
            // diskstats sectors are 512 bytes regardless of hardware.
            read_kb_per_sec: d_read_sectors as f64 * 512.0 / 1024.0 / elapsed_secs,
            write_kb_per_sec: d_write_sectors as f64 * 512.0 / 1024.0 / elapsed_secs,
            ms_per_read: if d_reads == 0 {
                0.0
            } else {
                d_read_time as f64 / d_reads as f64
            },
            ms_per_write: if d_writes == 0 {
                0.0
            } else {
                d_write_time as f64 / d_writes as f64
            },
            busy_percent: 100.0 * d_io_time as f64 / elapsed_ms,
            queue_length: d_io_weighted as f64 / elapsed_ms,
        }
    }
}

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

/// Network throughput over one cycle, all interfaces except loopback.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NetRates {
    pub send_kbps: f64,
    pub receive_kbps: f64,
}

/// Rate tracking state for `/proc/net/dev`.
#[derive(Debug, Default)]
pub struct NetTracker {
    prev: Option<HashMap<String, (u64, u64)>>,
}

impl NetTracker {
    /// Folds in this cycle's per-interface byte counters.
    pub fn update(&mut self, devs: &[NetDevStats], elapsed_secs: f64) -> NetRates {
        let curr: HashMap<String, (u64, u64)> = devs
            .iter()
            .filter(|d| d.interface != "lo")
            .map(|d| (d.interface.clone(), (d.rx_bytes, d.tx_bytes)))
            .collect();

        let prev = self.prev.take();
        let (Some(prev), true) = (prev, elapsed_secs > 0.0) else {
            self.prev = Some(curr);
            return NetRates::default();
        };

        let mut d_rx = 0u64;
        let mut d_tx = 0u64;
        for (name, (rx, tx)) in &curr {
            let Some((prx, ptx)) = prev.get(name) else {
                continue;
            };
            d_rx += du64(*rx, *prx).unwrap_or(0);
            d_tx += du64(*tx, *ptx).unwrap_or(0);
        }

        self.prev = Some(curr);

        // bytes/sec -> kilobits/sec
        NetRates {
            send_kbps: d_tx as f64 * 8.0 / 1024.0 / elapsed_secs,
            receive_kbps: d_rx as f64 * 8.0 / 1024.0 / elapsed_secs,
        }
    }
}

// ---------------------------------------------------------------------------
// Cycle view
// ---------------------------------------------------------------------------

/// The parsed-and-rated view of one raw read pass.
///
/// Source functions extract their values from this; a `None` section means
/// the backing file was unreadable this cycle and the sources depending on
/// it report [`SourceError`].
#[derive(Debug)]
pub struct CycleReadings {
    /// Wall-clock timestamp of the pass.
    pub wall: DateTime<Local>,
    /// Host name, resolved once at startup.
    pub node_name: String,
    /// Primary local IPv4, resolved once at startup.
    pub ip: String,
    pub raw: RawSnapshot,
    pub cpu: Option<CpuPercents>,
    pub disk: Option<DiskRates>,
    pub net: Option<NetRates>,
    pub ctxt_per_sec: Option<f64>,
    pub intr_per_sec: Option<f64>,
}
