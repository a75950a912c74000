//! Source functions for the system partition of the catalogue.
//!
//! One pure function per system key, extracting and converting a value from
//! the cycle's [`CycleReadings`]. The unit conversions here are part of each
//! catalogue entry's contract: meminfo kB to MB, sector counts to KB/s,
//! byte counters to kbps.

use crate::catalog::Value;
use crate::collector::procfs::parser::{GlobalStat, MemInfo};
use crate::engine::readings::{CpuPercents, CycleReadings, DiskRates, NetRates, SourceError};

/// Timestamp layout for the `SamplingTime` column.
pub const SAMPLING_TIME_FORMAT: &str = "%Y-%m-%d-%H.%M.%S";

const KB_PER_MB: f64 = 1024.0;

fn stat(r: &CycleReadings) -> Result<&GlobalStat, SourceError> {
    r.raw.stat.as_ref().ok_or(SourceError::new("/proc/stat"))
}

fn meminfo(r: &CycleReadings) -> Result<&MemInfo, SourceError> {
    r.raw
        .meminfo
        .as_ref()
        .ok_or(SourceError::new("/proc/meminfo"))
}

fn cpu(r: &CycleReadings) -> Result<&CpuPercents, SourceError> {
    r.cpu.as_ref().ok_or(SourceError::new("cpu counters"))
}

fn disk(r: &CycleReadings) -> Result<&DiskRates, SourceError> {
    r.disk.as_ref().ok_or(SourceError::new("disk counters"))
}

fn net(r: &CycleReadings) -> Result<&NetRates, SourceError> {
    r.net.as_ref().ok_or(SourceError::new("network counters"))
}

// ---------------------------------------------------------------------------
// Identity and time
// ---------------------------------------------------------------------------

pub fn node_name(r: &CycleReadings) -> Result<Value, SourceError> {
    Ok(Value::Text(r.node_name.clone()))
}

pub fn ip_number(r: &CycleReadings) -> Result<Value, SourceError> {
    Ok(Value::Text(r.ip.clone()))
}

pub fn sampling_time(r: &CycleReadings) -> Result<Value, SourceError> {
    Ok(Value::Text(r.wall.format(SAMPLING_TIME_FORMAT).to_string()))
}

// ---------------------------------------------------------------------------
// CPU
// ---------------------------------------------------------------------------

pub fn cpu_processor_time(r: &CycleReadings) -> Result<Value, SourceError> {
    Ok(Value::F64(cpu(r)?.busy))
}

pub fn cpu_privileged_time(r: &CycleReadings) -> Result<Value, SourceError> {
    Ok(Value::F64(cpu(r)?.privileged))
}

pub fn cpu_interrupt_time(r: &CycleReadings) -> Result<Value, SourceError> {
    Ok(Value::F64(cpu(r)?.interrupt))
}

pub fn cpu_dpc_time(r: &CycleReadings) -> Result<Value, SourceError> {
    Ok(Value::F64(cpu(r)?.deferred))
}

// ---------------------------------------------------------------------------
// Memory
// ---------------------------------------------------------------------------

pub fn mem_available(r: &CycleReadings) -> Result<Value, SourceError> {
    Ok(Value::F64(meminfo(r)?.mem_available as f64 / KB_PER_MB))
}

pub fn mem_committed(r: &CycleReadings) -> Result<Value, SourceError> {
    Ok(Value::F64(meminfo(r)?.committed_as as f64 / KB_PER_MB))
}

pub fn mem_commit_limit(r: &CycleReadings) -> Result<Value, SourceError> {
    Ok(Value::F64(meminfo(r)?.commit_limit as f64 / KB_PER_MB))
}

pub fn mem_committed_perc(r: &CycleReadings) -> Result<Value, SourceError> {
    let mem = meminfo(r)?;
    let perc = if mem.commit_limit == 0 {
        0.0
    } else {
        100.0 * mem.committed_as as f64 / mem.commit_limit as f64
    };
    Ok(Value::F64(perc))
}

pub fn mem_pool_paged(r: &CycleReadings) -> Result<Value, SourceError> {
    Ok(Value::F64(meminfo(r)?.s_reclaimable as f64 / KB_PER_MB))
}

pub fn mem_pool_non_paged(r: &CycleReadings) -> Result<Value, SourceError> {
    Ok(Value::F64(meminfo(r)?.s_unreclaim as f64 / KB_PER_MB))
}

pub fn mem_cached(r: &CycleReadings) -> Result<Value, SourceError> {
    Ok(Value::F64(meminfo(r)?.cached as f64 / KB_PER_MB))
}

pub fn page_file(r: &CycleReadings) -> Result<Value, SourceError> {
    let mem = meminfo(r)?;
    let perc = if mem.swap_total == 0 {
        0.0
    } else {
        100.0 * (mem.swap_total - mem.swap_free) as f64 / mem.swap_total as f64
    };
    Ok(Value::F64(perc))
}

// ---------------------------------------------------------------------------
// Scheduler and kernel counters
// ---------------------------------------------------------------------------

pub fn processor_queue_length(r: &CycleReadings) -> Result<Value, SourceError> {
    Ok(Value::I64(stat(r)?.procs_running as i64))
}

pub fn handle_count(r: &CycleReadings) -> Result<Value, SourceError> {
    let nr = r
        .raw
        .file_nr
        .as_ref()
        .ok_or(SourceError::new("/proc/sys/fs/file-nr"))?;
    Ok(Value::I64(nr.allocated as i64))
}

pub fn thread_count(r: &CycleReadings) -> Result<Value, SourceError> {
    let load = r
        .raw
        .loadavg
        .as_ref()
        .ok_or(SourceError::new("/proc/loadavg"))?;
    Ok(Value::I64(load.total as i64))
}

pub fn context_switches(r: &CycleReadings) -> Result<Value, SourceError> {
    let rate = r
        .ctxt_per_sec
        .ok_or(SourceError::new("context switch counter"))?;
    Ok(Value::I64(rate.ceil() as i64))
}

/// Linux has no system-wide syscall counter in standard procfs; the total
/// interrupt rate is the designated stand-in.
pub fn system_calls(r: &CycleReadings) -> Result<Value, SourceError> {
    let rate = r
        .intr_per_sec
        .ok_or(SourceError::new("interrupt counter"))?;
    Ok(Value::I64(rate.ceil() as i64))
}

pub fn num_process(r: &CycleReadings) -> Result<Value, SourceError> {
    let count = r
        .raw
        .num_processes
        .ok_or(SourceError::new("process count"))?;
    Ok(Value::I64(count as i64))
}

// ---------------------------------------------------------------------------
// Disk
// ---------------------------------------------------------------------------

pub fn disk_queue_length(r: &CycleReadings) -> Result<Value, SourceError> {
    Ok(Value::F64(disk(r)?.queue_length))
}

pub fn disk_read(r: &CycleReadings) -> Result<Value, SourceError> {
    Ok(Value::F64(disk(r)?.read_kb_per_sec))
}

pub fn disk_write(r: &CycleReadings) -> Result<Value, SourceError> {
    Ok(Value::F64(disk(r)?.write_kb_per_sec))
}

pub fn disk_average_time_read(r: &CycleReadings) -> Result<Value, SourceError> {
    Ok(Value::F64(disk(r)?.ms_per_read))
}

pub fn disk_average_time_write(r: &CycleReadings) -> Result<Value, SourceError> {
    Ok(Value::F64(disk(r)?.ms_per_write))
}

pub fn disk_time(r: &CycleReadings) -> Result<Value, SourceError> {
    Ok(Value::F64(disk(r)?.busy_percent))
}

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

pub fn net_traffic_send(r: &CycleReadings) -> Result<Value, SourceError> {
    Ok(Value::F64(net(r)?.send_kbps))
}

pub fn net_traffic_receive(r: &CycleReadings) -> Result<Value, SourceError> {
    Ok(Value::F64(net(r)?.receive_kbps))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::procfs::parser::{FileNr, LoadAvg};
    use crate::collector::procfs::system::RawSnapshot;
    use chrono::{Local, TimeZone};

    fn readings() -> CycleReadings {
        let raw = RawSnapshot {
            stat: Some(GlobalStat {
                procs_running: 3,
                ..Default::default()
            }),
            meminfo: Some(MemInfo {
                mem_available: 2_048_000,
                committed_as: 1_024_000,
                commit_limit: 4_096_000,
                s_reclaimable: 512_000,
                s_unreclaim: 256_000,
                cached: 102_400,
                swap_total: 4_194_304,
                swap_free: 3_145_728,
                ..Default::default()
            }),
            loadavg: Some(LoadAvg {
                total: 1234,
                ..Default::default()
            }),
            file_nr: Some(FileNr {
                allocated: 10_240,
                free: 0,
                max: 1_000_000,
            }),
            num_processes: Some(321),
            ..Default::default()
        };

        CycleReadings {
            wall: Local.with_ymd_and_hms(2024, 3, 7, 14, 5, 9).unwrap(),
            node_name: "node-1".to_string(),
            ip: "10.0.0.7".to_string(),
            raw,
            cpu: Some(CpuPercents {
                busy: 42.5,
                privileged: 10.0,
                interrupt: 1.0,
                deferred: 2.0,
            }),
            disk: Some(DiskRates {
                read_kb_per_sec: 512.0,
                ..Default::default()
            }),
            net: Some(NetRates {
                send_kbps: 1000.0,
                receive_kbps: 2000.0,
            }),
            ctxt_per_sec: Some(123.4),
            intr_per_sec: Some(0.2),
        }
    }

    #[test]
    fn test_identity_and_time() {
        let r = readings();
        assert_eq!(node_name(&r).unwrap(), Value::Text("node-1".into()));
        assert_eq!(ip_number(&r).unwrap(), Value::Text("10.0.0.7".into()));
        assert_eq!(
            sampling_time(&r).unwrap(),
            Value::Text("2024-03-07-14.05.09".into())
        );
    }

    #[test]
    fn test_memory_conversions_kb_to_mb() {
        let r = readings();
        assert_eq!(mem_available(&r).unwrap(), Value::F64(2000.0));
        assert_eq!(mem_committed(&r).unwrap(), Value::F64(1000.0));
        assert_eq!(mem_commit_limit(&r).unwrap(), Value::F64(4000.0));
        assert_eq!(mem_committed_perc(&r).unwrap(), Value::F64(25.0));
        assert_eq!(mem_pool_paged(&r).unwrap(), Value::F64(500.0));
        assert_eq!(mem_pool_non_paged(&r).unwrap(), Value::F64(250.0));
        assert_eq!(mem_cached(&r).unwrap(), Value::F64(100.0));
        assert_eq!(page_file(&r).unwrap(), Value::F64(25.0));
    }

    #[test]
    fn test_zero_limits_yield_zero_percentages() {
        let mut r = readings();
        {
            let mem = r.raw.meminfo.as_mut().unwrap();
            mem.commit_limit = 0;
            mem.swap_total = 0;
        }
        assert_eq!(mem_committed_perc(&r).unwrap(), Value::F64(0.0));
        assert_eq!(page_file(&r).unwrap(), Value::F64(0.0));
    }

    #[test]
    fn test_counter_rates_are_ceiled() {
        let r = readings();
        assert_eq!(context_switches(&r).unwrap(), Value::I64(124));
        assert_eq!(system_calls(&r).unwrap(), Value::I64(1));
    }

    #[test]
    fn test_kernel_counts() {
        let r = readings();
        assert_eq!(processor_queue_length(&r).unwrap(), Value::I64(3));
        assert_eq!(handle_count(&r).unwrap(), Value::I64(10240));
        assert_eq!(thread_count(&r).unwrap(), Value::I64(1234));
        assert_eq!(num_process(&r).unwrap(), Value::I64(321));
    }

    #[test]
    fn test_missing_sections_fail_per_source() {
        let mut r = readings();
        r.raw.meminfo = None;
        r.cpu = None;

        assert!(mem_available(&r).is_err());
        assert!(cpu_processor_time(&r).is_err());
        // Sources on other sections are unaffected.
        assert!(thread_count(&r).is_ok());
        assert!(net_traffic_send(&r).is_ok());
    }

    #[test]
    fn test_rate_passthroughs() {
        let r = readings();
        assert_eq!(cpu_processor_time(&r).unwrap(), Value::F64(42.5));
        assert_eq!(disk_read(&r).unwrap(), Value::F64(512.0));
        assert_eq!(net_traffic_send(&r).unwrap(), Value::F64(1000.0));
        assert_eq!(net_traffic_receive(&r).unwrap(), Value::F64(2000.0));
    }
}
