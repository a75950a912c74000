//! In-memory mock filesystem.
//!
//! `MockFs` simulates a filesystem in memory so samplers can be tested with
//! fixture content instead of a live `/proc`. State lives behind an
//! `Arc<Mutex>`: clones share it, which lets a test hold one handle, hand a
//! clone to an engine, and rewrite counter files between sampling cycles.

use crate::collector::traits::FileSystem;
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct MockState {
    /// Map from path to file contents.
    files: HashMap<PathBuf, String>,
    /// Set of directories (for read_dir support).
    directories: HashSet<PathBuf>,
}

/// Shared in-memory filesystem for tests.
#[derive(Debug, Clone, Default)]
pub struct MockFs {
    inner: Arc<Mutex<MockState>>,
}

impl MockFs {
    /// Creates a new empty mock filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Adds a file with the given content, replacing any previous content.
    ///
    /// Parent directories are created automatically.
    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<String>) {
        let path = path.as_ref().to_path_buf();
        let mut state = self.state();

        let mut parent = path.parent();
        while let Some(p) = parent {
            if !p.as_os_str().is_empty() {
                state.directories.insert(p.to_path_buf());
            }
            parent = p.parent();
        }

        state.files.insert(path, content.into());
    }

    /// Adds an empty directory.
    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        let mut state = self.state();
        state.directories.insert(path.clone());

        let mut parent = path.parent();
        while let Some(p) = parent {
            if !p.as_os_str().is_empty() {
                state.directories.insert(p.to_path_buf());
            }
            parent = p.parent();
        }
    }

    /// Removes a file if present.
    pub fn remove_file(&self, path: impl AsRef<Path>) {
        self.state().files.remove(path.as_ref());
    }

    /// Adds `/proc/[pid]/stat` for a process with the given accounting
    /// fields. `rss` is in pages, `utime`/`stime` in clock ticks.
    pub fn add_process(&self, pid: u32, comm: &str, utime: u64, stime: u64, rss: i64) {
        let base = PathBuf::from(format!("/proc/{pid}"));
        self.add_dir(&base);
        self.add_file(base.join("stat"), stat_line(pid, comm, utime, stime, rss));
    }

    /// Removes a process directory and its files, simulating process exit.
    pub fn remove_process(&self, pid: u32) {
        let base = PathBuf::from(format!("/proc/{pid}"));
        let mut state = self.state();
        state.files.retain(|p, _| !p.starts_with(&base));
        state.directories.retain(|p| !p.starts_with(&base));
    }
}

/// Builds a `/proc/[pid]/stat` line with enough trailing fields to satisfy
/// the parser.
fn stat_line(pid: u32, comm: &str, utime: u64, stime: u64, rss: i64) -> String {
    format!(
        "{pid} ({comm}) S 1 {pid} {pid} 0 -1 4194304 100 0 0 0 {utime} {stime} 0 0 20 0 1 0 \
         1000 10000000 {rss} 18446744073709551615 0 0 0 0 0 0 0 0 0 0 0 0 17 0 0 0 0 0 0 0 0 0 0 0 0 0 0"
    )
}

impl FileSystem for MockFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.state().files.get(path).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("file not found: {:?}", path),
            )
        })
    }

    fn exists(&self, path: &Path) -> bool {
        let state = self.state();
        state.files.contains_key(path) || state.directories.contains(path)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let state = self.state();
        if !state.directories.contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("directory not found: {:?}", path),
            ));
        }

        let mut entries = HashSet::new();

        for file_path in state.files.keys() {
            if file_path.parent().is_some_and(|parent| parent == path) {
                entries.insert(file_path.clone());
            }
        }

        for dir_path in &state.directories {
            if dir_path.parent().is_some_and(|parent| parent == path) && dir_path != path {
                entries.insert(dir_path.clone());
            }
        }

        Ok(entries.into_iter().collect())
    }
}
