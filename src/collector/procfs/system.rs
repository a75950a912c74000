//! System-wide read pass over `/proc`.
//!
//! [`SystemReader`] reads each file the catalogue needs exactly once per
//! cycle and assembles a [`RawSnapshot`]. Every section is read in
//! isolation: one unreadable file leaves its section `None` and the rest of
//! the snapshot intact.

use crate::collector::procfs::parser::{
    DiskStats, FileNr, GlobalStat, LoadAvg, MemInfo, NetDevStats, parse_diskstats, parse_file_nr,
    parse_global_stat, parse_loadavg, parse_meminfo, parse_mountinfo_device_ids, parse_net_dev,
};
use crate::collector::procfs::process::CollectError;
use crate::collector::traits::FileSystem;
use std::collections::HashSet;
use std::path::Path;
use tracing::warn;

/// One cycle's parsed `/proc` state.
#[derive(Debug, Default)]
pub struct RawSnapshot {
    pub stat: Option<GlobalStat>,
    pub meminfo: Option<MemInfo>,
    pub loadavg: Option<LoadAvg>,
    pub file_nr: Option<FileNr>,
    pub diskstats: Option<Vec<DiskStats>>,
    /// Block devices backing a mount; used to filter disk totals.
    pub mounted_devices: Option<HashSet<(u32, u32)>>,
    pub net_dev: Option<Vec<NetDevStats>>,
    /// Count of numeric `/proc` entries at read time.
    pub num_processes: Option<usize>,
}

/// Reads system-wide files through a [`FileSystem`].
pub struct SystemReader<F: FileSystem> {
    fs: F,
    proc_path: String,
}

impl<F: FileSystem> SystemReader<F> {
    /// Creates a reader rooted at `proc_path` (usually "/proc").
    pub fn new(fs: F, proc_path: impl Into<String>) -> Self {
        Self {
            fs,
            proc_path: proc_path.into(),
        }
    }

    fn read(&self, rel: &str) -> Result<String, CollectError> {
        let path = format!("{}/{}", self.proc_path, rel);
        Ok(self.fs.read_to_string(Path::new(&path))?)
    }

    /// Reads `/proc/stat`.
    pub fn read_stat(&self) -> Result<GlobalStat, CollectError> {
        let content = self.read("stat")?;
        parse_global_stat(&content).map_err(|e| CollectError::Parse(e.message))
    }

    /// Reads `/proc/meminfo`.
    pub fn read_meminfo(&self) -> Result<MemInfo, CollectError> {
        let content = self.read("meminfo")?;
        parse_meminfo(&content).map_err(|e| CollectError::Parse(e.message))
    }

    /// Reads `/proc/loadavg`.
    pub fn read_loadavg(&self) -> Result<LoadAvg, CollectError> {
        let content = self.read("loadavg")?;
        parse_loadavg(&content).map_err(|e| CollectError::Parse(e.message))
    }

    /// Reads `/proc/sys/fs/file-nr`.
    pub fn read_file_nr(&self) -> Result<FileNr, CollectError> {
        let content = self.read("sys/fs/file-nr")?;
        parse_file_nr(&content).map_err(|e| CollectError::Parse(e.message))
    }

    /// Reads `/proc/diskstats`.
    pub fn read_diskstats(&self) -> Result<Vec<DiskStats>, CollectError> {
        let content = self.read("diskstats")?;
        parse_diskstats(&content).map_err(|e| CollectError::Parse(e.message))
    }

    /// Reads mounted block device IDs from `/proc/self/mountinfo`.
    pub fn read_mounted_devices(&self) -> Result<HashSet<(u32, u32)>, CollectError> {
        let content = self.read("self/mountinfo")?;
        Ok(parse_mountinfo_device_ids(&content))
    }

    /// Reads `/proc/net/dev`.
    pub fn read_net_dev(&self) -> Result<Vec<NetDevStats>, CollectError> {
        let content = self.read("net/dev")?;
        parse_net_dev(&content).map_err(|e| CollectError::Parse(e.message))
    }

    /// Reads the host name from `/proc/sys/kernel/hostname`.
    pub fn read_hostname(&self) -> Result<String, CollectError> {
        Ok(self.read("sys/kernel/hostname")?.trim().to_string())
    }

    /// Counts numeric entries under the proc root.
    pub fn count_processes(&self) -> Result<usize, CollectError> {
        let entries = self.fs.read_dir(Path::new(&self.proc_path))?;
        Ok(entries
            .iter()
            .filter_map(|p| p.file_name())
            .filter_map(|n| n.to_str())
            .filter(|n| n.chars().all(|c| c.is_ascii_digit()) && !n.is_empty())
            .count())
    }

    /// Reads every section, isolating failures per file.
    pub fn snapshot(&self) -> RawSnapshot {
        let mut snap = RawSnapshot::default();

        match self.read_stat() {
            Ok(v) => snap.stat = Some(v),
            Err(e) => warn!("stat unavailable: {e}"),
        }
        match self.read_meminfo() {
            Ok(v) => snap.meminfo = Some(v),
            Err(e) => warn!("meminfo unavailable: {e}"),
        }
        match self.read_loadavg() {
            Ok(v) => snap.loadavg = Some(v),
            Err(e) => warn!("loadavg unavailable: {e}"),
        }
        match self.read_file_nr() {
            Ok(v) => snap.file_nr = Some(v),
            Err(e) => warn!("file-nr unavailable: {e}"),
        }
        match self.read_diskstats() {
            Ok(v) => snap.diskstats = Some(v),
            Err(e) => warn!("diskstats unavailable: {e}"),
        }
        match self.read_mounted_devices() {
            Ok(v) => snap.mounted_devices = Some(v),
            Err(e) => warn!("mountinfo unavailable: {e}"),
        }
        match self.read_net_dev() {
            Ok(v) => snap.net_dev = Some(v),
            Err(e) => warn!("net/dev unavailable: {e}"),
        }
        match self.count_processes() {
            Ok(v) => snap.num_processes = Some(v),
            Err(e) => warn!("process count unavailable: {e}"),
        }

        snap
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::MockFs;

    pub(crate) fn full_proc_fixture() -> MockFs {
        let fs = MockFs::new();
        fs.add_file(
            "/proc/stat",
            "cpu  10000 500 3000 80000 1200 100 200 50 0 0\nintr 987654 1 2\nctxt 13579246\nbtime 1700000000\nprocesses 24680\nprocs_running 3\nprocs_blocked 1\n",
        );
        fs.add_file(
            "/proc/meminfo",
            "MemTotal: 16384000 kB\nMemFree: 8192000 kB\nMemAvailable: 12288000 kB\nCached: 2048000 kB\nSwapTotal: 4194304 kB\nSwapFree: 3145728 kB\nCommitLimit: 12386304 kB\nCommitted_AS: 5120000 kB\nSReclaimable: 256000 kB\nSUnreclaim: 128000 kB\n",
        );
        fs.add_file("/proc/loadavg", "0.52 0.58 0.59 2/1234 56789\n");
        fs.add_file("/proc/sys/fs/file-nr", "10240 0 9223372036854775807\n");
        fs.add_file(
            "/proc/diskstats",
            "   8       0 sda 126000 5000 3210000 45000 89000 12000 2150000 38000 0 52000 83000\n",
        );
        fs.add_file(
            "/proc/self/mountinfo",
            "26 1 8:0 / / rw,relatime - ext4 /dev/sda rw\n",
        );
        fs.add_file(
            "/proc/net/dev",
            "Inter-|   Receive                                                |  Transmit\n face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed\n    lo: 1000000 1000 0 0 0 0 0 0 1000000 1000 0 0 0 0 0 0\n  eth0: 5000000 4000 0 0 0 0 0 0 2500000 2000 0 0 0 0 0 0\n",
        );
        fs.add_file("/proc/sys/kernel/hostname", "testhost\n");
        fs.add_process(100, "chrome", 50, 20, 2000);
        fs.add_process(200, "firefox", 80, 40, 3000);
        fs
    }

    #[test]
    fn test_snapshot_reads_all_sections() {
        let reader = SystemReader::new(full_proc_fixture(), "/proc");
        let snap = reader.snapshot();

        assert!(snap.stat.is_some());
        assert!(snap.meminfo.is_some());
        assert!(snap.loadavg.is_some());
        assert!(snap.file_nr.is_some());
        assert!(snap.diskstats.is_some());
        assert!(snap.mounted_devices.is_some());
        assert!(snap.net_dev.is_some());
        assert_eq!(snap.num_processes, Some(2));
    }

    #[test]
    fn test_snapshot_isolates_missing_files() {
        let fs = full_proc_fixture();
        fs.remove_file("/proc/meminfo");
        let reader = SystemReader::new(fs, "/proc");
        let snap = reader.snapshot();

        assert!(snap.meminfo.is_none());
        assert!(snap.stat.is_some());
        assert!(snap.net_dev.is_some());
    }

    #[test]
    fn test_read_hostname_trims() {
        let reader = SystemReader::new(full_proc_fixture(), "/proc");
        assert_eq!(reader.read_hostname().unwrap(), "testhost");
    }

    #[test]
    fn test_count_processes_only_numeric() {
        let reader = SystemReader::new(full_proc_fixture(), "/proc");
        // /proc also holds meminfo, stat, sys/, net/ etc.
        assert_eq!(reader.count_processes().unwrap(), 2);
    }
}
