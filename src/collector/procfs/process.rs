//! Per-process reads from `/proc/[pid]/`.

use crate::collector::procfs::parser::{ProcStat, parse_proc_stat};
use crate::collector::traits::FileSystem;
use std::io;
use std::path::Path;

/// Clock ticks per second. Fixed at 100 on every mainstream Linux kernel.
pub const CLK_TCK: u64 = 100;

/// Memory page size in bytes.
pub const PAGE_SIZE: u64 = 4096;

/// Error type for collection failures.
#[derive(Debug)]
pub enum CollectError {
    /// Process exited while reading its files.
    ProcessGone(u32),
    /// I/O error reading a file.
    Io(io::Error),
    /// Parse error in file content.
    Parse(String),
}

impl std::fmt::Display for CollectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectError::ProcessGone(pid) => write!(f, "process {} is gone", pid),
            CollectError::Io(e) => write!(f, "I/O error: {}", e),
            CollectError::Parse(msg) => write!(f, "parse error: {}", msg),
        }
    }
}

impl std::error::Error for CollectError {}

impl From<io::Error> for CollectError {
    fn from(e: io::Error) -> Self {
        CollectError::Io(e)
    }
}

/// Reads process accounting data through a [`FileSystem`].
pub struct ProcessProbe<F: FileSystem> {
    fs: F,
    proc_path: String,
}

impl<F: FileSystem> ProcessProbe<F> {
    /// Creates a probe rooted at `proc_path` (usually "/proc").
    pub fn new(fs: F, proc_path: impl Into<String>) -> Self {
        Self {
            fs,
            proc_path: proc_path.into(),
        }
    }

    /// Reads and parses `/proc/[pid]/stat`.
    ///
    /// A vanished directory maps to [`CollectError::ProcessGone`] so callers
    /// can distinguish exit races from real I/O trouble.
    pub fn read_stat(&self, pid: u32) -> Result<ProcStat, CollectError> {
        let path = format!("{}/{}/stat", self.proc_path, pid);
        let content = self.fs.read_to_string(Path::new(&path)).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                CollectError::ProcessGone(pid)
            } else {
                CollectError::Io(e)
            }
        })?;
        parse_proc_stat(&content).map_err(|e| CollectError::Parse(e.message))
    }

    /// All numeric entries under the proc root, i.e. the live pids.
    pub fn all_pids(&self) -> Result<Vec<u32>, CollectError> {
        let entries = self.fs.read_dir(Path::new(&self.proc_path))?;
        let mut pids: Vec<u32> = entries
            .iter()
            .filter_map(|p| p.file_name())
            .filter_map(|n| n.to_str())
            .filter_map(|n| n.parse().ok())
            .collect();
        pids.sort_unstable();
        Ok(pids)
    }

    /// Pids whose `comm` equals `name`.
    ///
    /// The kernel truncates `comm` to 15 bytes, so long process names must
    /// be configured in truncated form. Processes that vanish mid-scan are
    /// skipped.
    pub fn pids_by_name(&self, name: &str) -> Result<Vec<u32>, CollectError> {
        let mut matched = Vec::new();
        for pid in self.all_pids()? {
            if let Ok(stat) = self.read_stat(pid)
                && stat.comm == name
            {
                matched.push(pid);
            }
        }
        Ok(matched)
    }
}
