//! Rotating tab-delimited log writer.
//!
//! Two states: `NeedsHeader` and `Writing`. A new file starts whenever the
//! header is owed or the record count reaches the limit; the header row is
//! always written first, then up to `max_records` data rows follow before
//! the next rotation. Rotation is count-based only.

use chrono::{DateTime, Local};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Field separator for header and data rows.
pub const FIELD_SEPARATOR: &str = "\t";

/// Timestamp layout in rotated file names.
const FILE_NAME_TIME_FORMAT: &str = "%Y-%m-%d-%H.%M.%S";

/// A log file could not be created or appended.
///
/// Returned to the caller; the sampling loop logs it and carries on. The
/// failed row is dropped, there is no retry queue.
#[derive(Debug)]
pub struct WriteError {
    pub path: PathBuf,
    pub source: io::Error,
}

impl std::fmt::Display for WriteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cannot write {}: {}", self.path.display(), self.source)
    }
}

impl std::error::Error for WriteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    NeedsHeader,
    Writing,
}

/// Appends samples as tab-delimited rows across a rotating set of files.
pub struct RotatingLogWriter {
    folder: PathBuf,
    base_name: String,
    max_records: u32,
    /// Column titles, fixed at construction from the enabled set.
    header: Vec<String>,
    state: WriterState,
    current_path: Option<PathBuf>,
    records_in_file: u32,
}

impl RotatingLogWriter {
    pub fn new(
        folder: impl Into<PathBuf>,
        base_name: impl Into<String>,
        max_records: u32,
        column_titles: Vec<String>,
    ) -> Self {
        Self {
            folder: folder.into(),
            base_name: base_name.into(),
            max_records: max_records.max(1),
            header: column_titles,
            state: WriterState::NeedsHeader,
            current_path: None,
            records_in_file: 0,
        }
    }

    /// Appends one data row, rotating first when a header is owed or the
    /// current file is full.
    pub fn append(&mut self, values: &[String]) -> Result<(), WriteError> {
        self.append_at(values, Local::now())
    }

    /// [`RotatingLogWriter::append`] with an explicit timestamp for the
    /// file name on rotation.
    pub fn append_at(&mut self, values: &[String], at: DateTime<Local>) -> Result<(), WriteError> {
        if self.state == WriterState::NeedsHeader || self.records_in_file >= self.max_records {
            self.rotate(at)?;
        }

        let path = self
            .current_path
            .clone()
            .unwrap_or_else(|| self.folder.join(&self.base_name));
        write_line(&path, &values.join(FIELD_SEPARATOR))?;
        self.records_in_file += 1;
        Ok(())
    }

    /// Starts a new file: creates the directory if absent and writes the
    /// header row. The state only advances once the header is on disk, so
    /// a failed rotation is retried on the next append.
    fn rotate(&mut self, at: DateTime<Local>) -> Result<(), WriteError> {
        fs::create_dir_all(&self.folder).map_err(|source| WriteError {
            path: self.folder.clone(),
            source,
        })?;

        let name = format!("{}_{}", at.format(FILE_NAME_TIME_FORMAT), self.base_name);
        let path = self.folder.join(name);
        write_line(&path, &self.header.join(FIELD_SEPARATOR))?;

        info!("started log file {}", path.display());
        self.current_path = Some(path);
        self.records_in_file = 0;
        self.state = WriterState::Writing;
        Ok(())
    }

    /// Path of the file currently being written, if any file was started.
    pub fn current_path(&self) -> Option<&Path> {
        self.current_path.as_deref()
    }

    /// Data rows written to the current file.
    pub fn records_in_file(&self) -> u32 {
        self.records_in_file
    }
}

/// Opens in append mode, writes one line, closes. No handle is held across
/// cycles, so a failed write this cycle does not poison the next.
fn write_line(path: &Path, line: &str) -> Result<(), WriteError> {
    let result = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .and_then(|mut file| writeln!(file, "{line}"));
    result.map_err(|source| WriteError {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn at(sec: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 7, 14, 0, sec).unwrap()
    }

    fn titles(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("Col {i}")).collect()
    }

    fn row(tag: &str, n: usize) -> Vec<String> {
        (0..n).map(|i| format!("{tag}-{i}")).collect()
    }

    fn sorted_files(dir: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        files.sort();
        files
    }

    fn lines(path: &Path) -> Vec<String> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_rotation_boundary_three_three_one() {
        let dir = tempdir().unwrap();
        let mut writer = RotatingLogWriter::new(dir.path(), "Log.txt", 3, titles(2));

        for i in 0..7 {
            writer.append_at(&row(&format!("r{i}"), 2), at(i)).unwrap();
        }

        let files = sorted_files(dir.path());
        assert_eq!(files.len(), 3);

        let counts: Vec<usize> = files.iter().map(|f| lines(f).len() - 1).collect();
        assert_eq!(counts, vec![3, 3, 1]);

        // Exactly one header per file, always the first line.
        let header = titles(2).join("\t");
        for file in &files {
            let lines = lines(file);
            assert_eq!(lines[0], header);
            assert_eq!(lines.iter().filter(|l| **l == header).count(), 1);
        }
    }

    #[test]
    fn test_scenario_two_files_after_three_cycles() {
        // Enabled [CPUProcessorTime, MEMAvailable, SamplingTime],
        // max_records 2, three cycles.
        let dir = tempdir().unwrap();
        let columns = vec![
            "CPU time %".to_string(),
            "Mem Avaialable %".to_string(),
            "Sampling Time".to_string(),
        ];
        let mut writer = RotatingLogWriter::new(dir.path(), "Log.txt", 2, columns.clone());

        for i in 0..3 {
            writer.append_at(&row(&format!("c{i}"), 3), at(i * 10)).unwrap();
        }

        let files = sorted_files(dir.path());
        assert_eq!(files.len(), 2);

        let first = lines(&files[0]);
        let second = lines(&files[1]);
        assert_eq!(first.len(), 3); // header + 2 data rows
        assert_eq!(second.len(), 2); // header + 1 data row

        for line in first.iter().chain(second.iter()) {
            assert_eq!(line.split('\t').count(), 3);
        }
        assert_eq!(first[0], columns.join("\t"));
    }

    #[test]
    fn test_file_name_is_timestamp_then_base_name() {
        let dir = tempdir().unwrap();
        let mut writer = RotatingLogWriter::new(dir.path(), "Log.txt", 5, titles(1));
        writer.append_at(&row("a", 1), at(9)).unwrap();

        let path = writer.current_path().unwrap();
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "2024-03-07-14.00.09_Log.txt"
        );
    }

    #[test]
    fn test_creates_missing_directory() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("log/deep");
        let mut writer = RotatingLogWriter::new(&nested, "Log.txt", 5, titles(1));

        writer.append_at(&row("a", 1), at(0)).unwrap();
        assert!(nested.exists());
        assert_eq!(sorted_files(&nested).len(), 1);
    }

    #[test]
    fn test_rows_are_tab_joined_without_trailing_separator() {
        let dir = tempdir().unwrap();
        let mut writer = RotatingLogWriter::new(dir.path(), "Log.txt", 5, titles(3));
        writer
            .append_at(&["1".into(), "".into(), "3".into()], at(0))
            .unwrap();

        let lines = lines(writer.current_path().unwrap());
        assert_eq!(lines[1], "1\t\t3");
        assert!(!lines[1].ends_with('\t'));
    }

    #[test]
    fn test_failed_rotation_is_retried_next_append() {
        let dir = tempdir().unwrap();
        let blocked = dir.path().join("blocked");
        // A file where the directory should be makes create_dir_all fail.
        fs::write(&blocked, "in the way").unwrap();
        let mut writer = RotatingLogWriter::new(&blocked, "Log.txt", 5, titles(1));

        assert!(writer.append_at(&row("a", 1), at(0)).is_err());

        // Unblock; the next append writes the header and the row.
        fs::remove_file(&blocked).unwrap();
        writer.append_at(&row("b", 1), at(1)).unwrap();

        let files = sorted_files(&blocked);
        assert_eq!(files.len(), 1);
        let lines = lines(&files[0]);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], "b-0");
    }

    #[test]
    fn test_max_records_zero_is_clamped() {
        let dir = tempdir().unwrap();
        let mut writer = RotatingLogWriter::new(dir.path(), "Log.txt", 0, titles(1));
        writer.append_at(&row("a", 1), at(0)).unwrap();
        writer.append_at(&row("b", 1), at(1)).unwrap();
        // One data row per file instead of an infinite rotation loop.
        assert_eq!(sorted_files(dir.path()).len(), 2);
    }
}
