//! Parsers for `/proc` filesystem files.
//!
//! Pure functions from file content to structured data, one per file format,
//! so every format quirk is testable with string fixtures. Only the fields
//! the metric catalogue consumes are parsed.

use std::collections::HashSet;

/// Error type for parsing failures.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Parse error: {}", self.message)
    }
}

impl std::error::Error for ParseError {}

// ---------------------------------------------------------------------------
// /proc/[pid]/stat
// ---------------------------------------------------------------------------

/// Accounting fields from `/proc/[pid]/stat`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcStat {
    pub pid: u32,
    /// Executable name, truncated by the kernel to 15 bytes.
    pub comm: String,
    pub state: char,
    /// User-mode CPU time in clock ticks.
    pub utime: u64,
    /// Kernel-mode CPU time in clock ticks.
    pub stime: u64,
    pub num_threads: i32,
    /// Resident set size in pages.
    pub rss: i64,
}

/// Parses `/proc/[pid]/stat` content.
///
/// The comm field can contain spaces and parentheses, so fields are split
/// only after the last `)`.
pub fn parse_proc_stat(content: &str) -> Result<ProcStat, ParseError> {
    let content = content.trim();

    let open_paren = content
        .find('(')
        .ok_or_else(|| ParseError::new("missing '(' in stat"))?;
    let close_paren = content
        .rfind(')')
        .ok_or_else(|| ParseError::new("missing ')' in stat"))?;

    if close_paren <= open_paren {
        return Err(ParseError::new("invalid parentheses in stat"));
    }

    let pid: u32 = content[..open_paren]
        .trim()
        .parse()
        .map_err(|_| ParseError::new("invalid pid"))?;

    let comm = content[open_paren + 1..close_paren].to_string();

    let remaining = &content[close_paren + 1..];
    let fields: Vec<&str> = remaining.split_whitespace().collect();

    // Fields are indexed after the comm: state is 0, utime 11, stime 12,
    // num_threads 17, rss 21.
    if fields.len() < 22 {
        return Err(ParseError::new(format!(
            "not enough fields in stat: expected 22+, got {}",
            fields.len()
        )));
    }

    let parse_u64 = |idx: usize, name: &str| -> Result<u64, ParseError> {
        fields[idx]
            .parse()
            .map_err(|_| ParseError::new(format!("invalid {}", name)))
    };

    Ok(ProcStat {
        pid,
        comm,
        state: fields[0].chars().next().unwrap_or('?'),
        utime: parse_u64(11, "utime")?,
        stime: parse_u64(12, "stime")?,
        num_threads: fields[17]
            .parse()
            .map_err(|_| ParseError::new("invalid num_threads"))?,
        rss: fields[21]
            .parse()
            .map_err(|_| ParseError::new("invalid rss"))?,
    })
}

// ---------------------------------------------------------------------------
// /proc/meminfo
// ---------------------------------------------------------------------------

/// Fields from `/proc/meminfo`, all in kB.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemInfo {
    pub mem_total: u64,
    pub mem_free: u64,
    pub mem_available: u64,
    pub cached: u64,
    pub swap_total: u64,
    pub swap_free: u64,
    pub committed_as: u64,
    pub commit_limit: u64,
    pub s_reclaimable: u64,
    pub s_unreclaim: u64,
}

/// Parses `/proc/meminfo` content.
pub fn parse_meminfo(content: &str) -> Result<MemInfo, ParseError> {
    let mut info = MemInfo::default();

    let parse_kb = |line: &str| -> u64 {
        line.split_whitespace()
            .nth(1)
            .and_then(|s| s.parse().ok())
            .unwrap_or(0)
    };

    for line in content.lines() {
        if line.starts_with("MemTotal:") {
            info.mem_total = parse_kb(line);
        } else if line.starts_with("MemFree:") {
            info.mem_free = parse_kb(line);
        } else if line.starts_with("MemAvailable:") {
            info.mem_available = parse_kb(line);
        } else if line.starts_with("Cached:") {
            info.cached = parse_kb(line);
        } else if line.starts_with("SwapTotal:") {
            info.swap_total = parse_kb(line);
        } else if line.starts_with("SwapFree:") {
            info.swap_free = parse_kb(line);
        } else if line.starts_with("Committed_AS:") {
            info.committed_as = parse_kb(line);
        } else if line.starts_with("CommitLimit:") {
            info.commit_limit = parse_kb(line);
        } else if line.starts_with("SReclaimable:") {
            info.s_reclaimable = parse_kb(line);
        } else if line.starts_with("SUnreclaim:") {
            info.s_unreclaim = parse_kb(line);
        }
    }

    Ok(info)
}

// ---------------------------------------------------------------------------
// /proc/stat
// ---------------------------------------------------------------------------

/// Aggregate CPU time counters from the `cpu` line of `/proc/stat`, in
/// clock ticks.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CpuTimes {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
}

impl CpuTimes {
    /// Sum of all accounted time.
    pub fn total(&self) -> u64 {
        self.user
            + self.nice
            + self.system
            + self.idle
            + self.iowait
            + self.irq
            + self.softirq
            + self.steal
    }

    /// Time the CPU spent doing nothing useful.
    pub fn idle_all(&self) -> u64 {
        self.idle + self.iowait
    }
}

/// System-wide counters from `/proc/stat`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlobalStat {
    /// The aggregate `cpu` line.
    pub cpu: CpuTimes,
    /// Total context switches since boot.
    pub ctxt: u64,
    /// Total interrupts serviced since boot (first value of the `intr` line).
    pub intr_total: u64,
    /// Forks since boot.
    pub processes: u64,
    /// Runnable tasks right now.
    pub procs_running: u32,
}

/// Parses `/proc/stat` content.
pub fn parse_global_stat(content: &str) -> Result<GlobalStat, ParseError> {
    let mut stat = GlobalStat::default();
    let mut saw_cpu = false;

    for line in content.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.is_empty() {
            continue;
        }

        let get_val =
            |idx: usize| -> u64 { parts.get(idx).and_then(|s| s.parse().ok()).unwrap_or(0) };

        if parts[0] == "cpu" {
            stat.cpu = CpuTimes {
                user: get_val(1),
                nice: get_val(2),
                system: get_val(3),
                idle: get_val(4),
                iowait: get_val(5),
                irq: get_val(6),
                softirq: get_val(7),
                steal: get_val(8),
            };
            saw_cpu = true;
        } else if parts[0] == "intr" {
            stat.intr_total = get_val(1);
        } else if parts[0] == "ctxt" {
            stat.ctxt = get_val(1);
        } else if parts[0] == "processes" {
            stat.processes = get_val(1);
        } else if parts[0] == "procs_running" {
            stat.procs_running = get_val(1) as u32;
        }
    }

    if !saw_cpu {
        return Err(ParseError::new("missing aggregate cpu line in stat"));
    }

    Ok(stat)
}

// ---------------------------------------------------------------------------
// /proc/loadavg
// ---------------------------------------------------------------------------

/// Parsed data from `/proc/loadavg`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadAvg {
    pub load1: f64,
    pub load5: f64,
    pub load15: f64,
    /// Currently runnable scheduling entities.
    pub running: u32,
    /// Total scheduling entities (threads) on the system.
    pub total: u32,
    pub last_pid: u32,
}

/// Parses `/proc/loadavg` content.
pub fn parse_loadavg(content: &str) -> Result<LoadAvg, ParseError> {
    let parts: Vec<&str> = content.split_whitespace().collect();
    if parts.len() < 5 {
        return Err(ParseError::new("invalid loadavg format"));
    }

    let load1 = parts[0]
        .parse()
        .map_err(|_| ParseError::new("invalid load1"))?;
    let load5 = parts[1]
        .parse()
        .map_err(|_| ParseError::new("invalid load5"))?;
    let load15 = parts[2]
        .parse()
        .map_err(|_| ParseError::new("invalid load15"))?;

    // Format: running/total
    let (running, total) = if let Some((r, t)) = parts[3].split_once('/') {
        (r.parse().unwrap_or(0), t.parse().unwrap_or(0))
    } else {
        (0, 0)
    };

    let last_pid = parts[4].parse().unwrap_or(0);

    Ok(LoadAvg {
        load1,
        load5,
        load15,
        running,
        total,
        last_pid,
    })
}

// ---------------------------------------------------------------------------
// /proc/diskstats
// ---------------------------------------------------------------------------

/// Per-device counters from `/proc/diskstats`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiskStats {
    pub major: u32,
    pub minor: u32,
    /// Device name (sda, nvme0n1p1, dm-0, ...).
    pub device: String,
    /// Reads completed.
    pub reads: u64,
    /// Sectors read (sectors are 512 bytes here regardless of hardware).
    pub read_sectors: u64,
    /// Time spent reading (ms).
    pub read_time: u64,
    /// Writes completed.
    pub writes: u64,
    /// Sectors written.
    pub write_sectors: u64,
    /// Time spent writing (ms).
    pub write_time: u64,
    /// Time with I/O in flight (ms).
    pub io_time: u64,
    /// Weighted time with I/O in flight (ms).
    pub io_weighted_time: u64,
}

/// Parses `/proc/diskstats` content. Malformed lines are skipped.
///
/// Format: major minor name reads r_merged r_sectors r_time writes w_merged
/// w_sectors w_time io_pending io_time w_io_time [discards ...]
pub fn parse_diskstats(content: &str) -> Result<Vec<DiskStats>, ParseError> {
    let mut disks = Vec::new();

    for line in content.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 14 {
            continue;
        }

        let get_val =
            |idx: usize| -> u64 { parts.get(idx).and_then(|s| s.parse().ok()).unwrap_or(0) };

        disks.push(DiskStats {
            major: get_val(0) as u32,
            minor: get_val(1) as u32,
            device: parts[2].to_string(),
            reads: get_val(3),
            read_sectors: get_val(5),
            read_time: get_val(6),
            writes: get_val(7),
            write_sectors: get_val(9),
            write_time: get_val(10),
            io_time: get_val(12),
            io_weighted_time: get_val(13),
        });
    }

    Ok(disks)
}

// ---------------------------------------------------------------------------
// /proc/self/mountinfo
// ---------------------------------------------------------------------------

/// Extracts the set of mounted block device IDs (major, minor) from
/// `/proc/self/mountinfo`.
///
/// Disk totals only aggregate devices that actually back a mount; this
/// avoids counting a partition and its parent disk twice and skips loop
/// and pseudo devices.
///
/// Format (man 5 proc):
/// `mount_id parent_id major:minor root mount_point options ...`
pub fn parse_mountinfo_device_ids(content: &str) -> HashSet<(u32, u32)> {
    let mut devices = HashSet::new();

    for line in content.lines() {
        let Some(dev) = line.split_whitespace().nth(2) else {
            continue;
        };
        let Some((major_s, minor_s)) = dev.split_once(':') else {
            continue;
        };
        let (Ok(major), Ok(minor)) = (major_s.parse::<u32>(), minor_s.parse::<u32>()) else {
            continue;
        };

        // Pseudo filesystems (tmpfs, overlay, proc) report major 0.
        if major == 0 {
            continue;
        }

        devices.insert((major, minor));
    }

    devices
}

// ---------------------------------------------------------------------------
// /proc/net/dev
// ---------------------------------------------------------------------------

/// Per-interface byte counters from `/proc/net/dev`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetDevStats {
    /// Interface name (eth0, lo, ...).
    pub interface: String,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

/// Parses `/proc/net/dev` content.
///
/// Format:
/// Inter-|   Receive                                                |  Transmit
///  face |bytes    packets errs drop fifo frame compressed multicast|bytes ...
///    lo: 1234567     1234    0    0    0     0          0         0  1234567 ...
pub fn parse_net_dev(content: &str) -> Result<Vec<NetDevStats>, ParseError> {
    let mut devices = Vec::new();

    for line in content.lines() {
        // Skip header lines
        if line.contains('|') || line.trim().is_empty() {
            continue;
        }

        let parts: Vec<&str> = line.split(':').collect();
        if parts.len() != 2 {
            continue;
        }

        let interface = parts[0].trim().to_string();
        let values: Vec<&str> = parts[1].split_whitespace().collect();
        if values.len() < 16 {
            continue;
        }

        let get_val =
            |idx: usize| -> u64 { values.get(idx).and_then(|s| s.parse().ok()).unwrap_or(0) };

        devices.push(NetDevStats {
            interface,
            rx_bytes: get_val(0),
            tx_bytes: get_val(8),
        });
    }

    Ok(devices)
}

// ---------------------------------------------------------------------------
// /proc/sys/fs/file-nr
// ---------------------------------------------------------------------------

/// Open file handle counts from `/proc/sys/fs/file-nr`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FileNr {
    /// Allocated file handles.
    pub allocated: u64,
    /// Allocated but unused handles.
    pub free: u64,
    /// System-wide maximum.
    pub max: u64,
}

/// Parses `/proc/sys/fs/file-nr` content: three whitespace-separated counts.
pub fn parse_file_nr(content: &str) -> Result<FileNr, ParseError> {
    let parts: Vec<&str> = content.split_whitespace().collect();
    if parts.len() < 3 {
        return Err(ParseError::new("invalid file-nr format"));
    }

    let parse = |idx: usize, name: &str| -> Result<u64, ParseError> {
        parts[idx]
            .parse()
            .map_err(|_| ParseError::new(format!("invalid {}", name)))
    };

    Ok(FileNr {
        allocated: parse(0, "allocated")?,
        free: parse(1, "free")?,
        max: parse(2, "max")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_proc_stat_basic() {
        let content = "1234 (bash) S 1233 1234 1234 0 -1 4194304 100 0 0 0 10 5 0 0 20 0 2 0 12345 12345678 350 18446744073709551615 0 0 0 0 0 0 0 0 0 0 0 0 17 0 0 0 0 0 0 0 0 0 0 0 0 0 0";
        let stat = parse_proc_stat(content).unwrap();

        assert_eq!(stat.pid, 1234);
        assert_eq!(stat.comm, "bash");
        assert_eq!(stat.state, 'S');
        assert_eq!(stat.utime, 10);
        assert_eq!(stat.stime, 5);
        assert_eq!(stat.num_threads, 2);
        assert_eq!(stat.rss, 350);
    }

    #[test]
    fn test_parse_proc_stat_comm_with_spaces_and_parens() {
        let content = "42 (tmux: server (1)) S 1 42 42 0 -1 4194304 100 0 0 0 7 3 0 0 20 0 1 0 999 1000 50 18446744073709551615 0 0 0 0 0 0 0 0 0 0 0 0 17 0 0 0 0 0";
        let stat = parse_proc_stat(content).unwrap();

        assert_eq!(stat.pid, 42);
        assert_eq!(stat.comm, "tmux: server (1)");
        assert_eq!(stat.utime, 7);
        assert_eq!(stat.stime, 3);
    }

    #[test]
    fn test_parse_proc_stat_errors() {
        assert!(parse_proc_stat("").is_err());
        assert!(parse_proc_stat("1234 bash S 1 2 3").is_err());
        assert!(parse_proc_stat("1234 (bash) S 1 2").is_err());
        assert!(parse_proc_stat("abc (bash) S 1 2 3 4 5 6 7 8 9 10 11 12 13 14 15 16 17 18 19 20 21 22").is_err());
    }

    #[test]
    fn test_parse_meminfo_basic() {
        let content = "\
MemTotal:       16384000 kB
MemFree:         8192000 kB
MemAvailable:   12288000 kB
Buffers:          512000 kB
Cached:          2048000 kB
SwapCached:            0 kB
SwapTotal:       4194304 kB
SwapFree:        4194304 kB
CommitLimit:    12386304 kB
Committed_AS:    5120000 kB
SReclaimable:     256000 kB
SUnreclaim:       128000 kB
";
        let info = parse_meminfo(content).unwrap();

        assert_eq!(info.mem_total, 16384000);
        assert_eq!(info.mem_available, 12288000);
        assert_eq!(info.cached, 2048000);
        assert_eq!(info.swap_total, 4194304);
        assert_eq!(info.swap_free, 4194304);
        assert_eq!(info.committed_as, 5120000);
        assert_eq!(info.commit_limit, 12386304);
        assert_eq!(info.s_reclaimable, 256000);
        assert_eq!(info.s_unreclaim, 128000);
    }

    #[test]
    fn test_parse_meminfo_swap_cached_not_confused_with_cached() {
        // "SwapCached:" must not overwrite "Cached:".
        let content = "SwapCached: 777 kB\nCached: 100 kB\n";
        let info = parse_meminfo(content).unwrap();
        assert_eq!(info.cached, 100);
    }

    #[test]
    fn test_parse_meminfo_missing_fields_default_to_zero() {
        let info = parse_meminfo("MemTotal: 1000 kB\n").unwrap();
        assert_eq!(info.mem_total, 1000);
        assert_eq!(info.swap_total, 0);
        assert_eq!(info.commit_limit, 0);
    }

    #[test]
    fn test_parse_global_stat_basic() {
        let content = "\
cpu  10000 500 3000 80000 1200 100 200 50 0 0
cpu0 5000 250 1500 40000 600 50 100 25 0 0
intr 987654 123 456
ctxt 13579246
btime 1700000000
processes 24680
procs_running 3
procs_blocked 1
";
        let stat = parse_global_stat(content).unwrap();

        assert_eq!(stat.cpu.user, 10000);
        assert_eq!(stat.cpu.system, 3000);
        assert_eq!(stat.cpu.idle, 80000);
        assert_eq!(stat.cpu.iowait, 1200);
        assert_eq!(stat.cpu.irq, 100);
        assert_eq!(stat.cpu.softirq, 200);
        assert_eq!(stat.cpu.steal, 50);
        assert_eq!(stat.intr_total, 987654);
        assert_eq!(stat.ctxt, 13579246);
        assert_eq!(stat.processes, 24680);
        assert_eq!(stat.procs_running, 3);
    }

    #[test]
    fn test_parse_global_stat_requires_cpu_line() {
        assert!(parse_global_stat("ctxt 123\n").is_err());
    }

    #[test]
    fn test_cpu_times_totals() {
        let cpu = CpuTimes {
            user: 100,
            nice: 10,
            system: 50,
            idle: 800,
            iowait: 20,
            irq: 5,
            softirq: 10,
            steal: 5,
        };
        assert_eq!(cpu.total(), 1000);
        assert_eq!(cpu.idle_all(), 820);
    }

    #[test]
    fn test_parse_loadavg_basic() {
        let content = "0.52 0.58 0.59 2/1234 56789\n";
        let load = parse_loadavg(content).unwrap();

        assert_eq!(load.load1, 0.52);
        assert_eq!(load.load5, 0.58);
        assert_eq!(load.load15, 0.59);
        assert_eq!(load.running, 2);
        assert_eq!(load.total, 1234);
        assert_eq!(load.last_pid, 56789);
    }

    #[test]
    fn test_parse_loadavg_invalid() {
        assert!(parse_loadavg("0.1 0.2").is_err());
        assert!(parse_loadavg("").is_err());
    }

    #[test]
    fn test_parse_diskstats_basic() {
        let content = "\
   8       0 sda 126000 5000 3210000 45000 89000 12000 2150000 38000 0 52000 83000
   8       1 sda1 125000 5000 3200000 44000 88000 12000 2140000 37000 0 51000 81000
 259       0 nvme0n1 500 0 24000 120 300 0 16000 90 0 200 210
";
        let disks = parse_diskstats(content).unwrap();

        assert_eq!(disks.len(), 3);
        assert_eq!(disks[0].device, "sda");
        assert_eq!(disks[0].major, 8);
        assert_eq!(disks[0].minor, 0);
        assert_eq!(disks[0].reads, 126000);
        assert_eq!(disks[0].read_sectors, 3210000);
        assert_eq!(disks[0].read_time, 45000);
        assert_eq!(disks[0].writes, 89000);
        assert_eq!(disks[0].write_sectors, 2150000);
        assert_eq!(disks[0].write_time, 38000);
        assert_eq!(disks[0].io_time, 52000);
        assert_eq!(disks[0].io_weighted_time, 83000);
        assert_eq!(disks[2].device, "nvme0n1");
    }

    #[test]
    fn test_parse_diskstats_skips_malformed_lines() {
        let content = "8 0 sda 1 2 3\nnot a diskstats line\n";
        let disks = parse_diskstats(content).unwrap();
        assert!(disks.is_empty());
    }

    #[test]
    fn test_parse_mountinfo_device_ids() {
        let content = "\
21 26 0:19 / /proc rw,nosuid - proc proc rw
26 1 8:1 / / rw,relatime - ext4 /dev/sda1 rw
92 26 8:16 / /data rw,relatime - ext4 /dev/sdb rw
95 26 0:45 / /tmp rw - tmpfs tmpfs rw
";
        let devices = parse_mountinfo_device_ids(content);

        assert_eq!(devices.len(), 2);
        assert!(devices.contains(&(8, 1)));
        assert!(devices.contains(&(8, 16)));
        // major 0 pseudo devices are ignored
        assert!(!devices.contains(&(0, 19)));
        assert!(!devices.contains(&(0, 45)));
    }

    #[test]
    fn test_parse_net_dev_basic() {
        let content = "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
    lo: 1000000    1000    0    0    0     0          0         0  1000000    1000    0    0    0     0       0          0
  eth0: 5000000    4000    0    0    0     0          0         0  2500000    2000    0    0    0     0       0          0
";
        let devices = parse_net_dev(content).unwrap();

        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].interface, "lo");
        assert_eq!(devices[0].rx_bytes, 1000000);
        assert_eq!(devices[0].tx_bytes, 1000000);
        assert_eq!(devices[1].interface, "eth0");
        assert_eq!(devices[1].rx_bytes, 5000000);
        assert_eq!(devices[1].tx_bytes, 2500000);
    }

    #[test]
    fn test_parse_net_dev_empty() {
        let devices = parse_net_dev("").unwrap();
        assert!(devices.is_empty());
    }

    #[test]
    fn test_parse_file_nr() {
        let nr = parse_file_nr("10240\t0\t9223372036854775807\n").unwrap();
        assert_eq!(nr.allocated, 10240);
        assert_eq!(nr.free, 0);
        assert_eq!(nr.max, 9223372036854775807);

        assert!(parse_file_nr("10240").is_err());
        assert!(parse_file_nr("a b c").is_err());
    }
}
