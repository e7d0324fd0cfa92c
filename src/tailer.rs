//! Incremental log file reading with per-path byte offsets.
//!
//! The tailer remembers how far into each file it has read and returns only
//! the lines appended since the previous call. It is owned by the monitor
//! loop and must not be shared across tasks; the offset table is unlocked.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Tracks the last read byte offset per log file.
#[derive(Debug, Default)]
pub struct Tailer {
    offsets: HashMap<PathBuf, u64>,
}

impl Tailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return only the new lines appended to the file since the last call.
    ///
    /// On first observation of a path the historical content is skipped: the
    /// current size is recorded as the offset and no lines are returned. If
    /// the file shrank below the recorded offset it is treated as rotated or
    /// truncated and reading restarts from the beginning.
    pub fn read_new_lines(&mut self, path: &Path) -> Result<Vec<String>> {
        let mut file =
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        let size = file
            .metadata()
            .with_context(|| format!("Failed to stat {}", path.display()))?
            .len();

        let offset = match self.offsets.get(path) {
            None => {
                self.offsets.insert(path.to_path_buf(), size);
                return Ok(Vec::new());
            }
            // Rotation/truncation: restart from the beginning.
            Some(&recorded) if size < recorded => 0,
            Some(&recorded) => recorded,
        };

        if size == offset {
            return Ok(Vec::new());
        }

        file.seek(SeekFrom::Start(offset))
            .with_context(|| format!("Failed to seek in {}", path.display()))?;

        let mut buf = Vec::with_capacity((size - offset) as usize);
        let n = file
            .by_ref()
            .take(size - offset)
            .read_to_end(&mut buf)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        if n == 0 {
            self.offsets.insert(path.to_path_buf(), size);
            return Ok(Vec::new());
        }

        self.offsets.insert(path.to_path_buf(), offset + n as u64);

        let data = String::from_utf8_lossy(&buf[..n]);
        Ok(data.split('\n').map(str::to_owned).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::OpenOptions;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn append(path: &Path, data: &str) {
        let mut f = OpenOptions::new().append(true).open(path).unwrap();
        f.write_all(data.as_bytes()).unwrap();
    }

    #[test]
    fn test_first_observation_skips_history() {
        let file = NamedTempFile::new().unwrap();
        append(file.path(), "old line 1\nold line 2\n");

        let mut tailer = Tailer::new();
        let lines = tailer.read_new_lines(file.path()).unwrap();
        assert!(lines.is_empty());
    }

    #[test]
    fn test_appended_lines_are_returned() {
        let file = NamedTempFile::new().unwrap();
        let mut tailer = Tailer::new();
        tailer.read_new_lines(file.path()).unwrap();

        append(file.path(), "alpha\nbeta\n");
        let lines = tailer.read_new_lines(file.path()).unwrap();
        assert_eq!(lines, vec!["alpha", "beta", ""]);
    }

    #[test]
    fn test_unchanged_file_returns_empty() {
        let file = NamedTempFile::new().unwrap();
        let mut tailer = Tailer::new();
        tailer.read_new_lines(file.path()).unwrap();

        append(file.path(), "one\n");
        tailer.read_new_lines(file.path()).unwrap();
        let lines = tailer.read_new_lines(file.path()).unwrap();
        assert!(lines.is_empty());
    }

    #[test]
    fn test_truncation_restarts_from_zero() {
        let file = NamedTempFile::new().unwrap();
        let mut tailer = Tailer::new();
        tailer.read_new_lines(file.path()).unwrap();

        append(file.path(), "before rotation\n");
        tailer.read_new_lines(file.path()).unwrap();

        // Truncate and write fresh content, shorter than the old offset.
        std::fs::write(file.path(), "fresh\n").unwrap();
        let lines = tailer.read_new_lines(file.path()).unwrap();
        assert_eq!(lines, vec!["fresh", ""]);
    }

    #[test]
    fn test_concatenation_matches_appended_bytes() {
        let file = NamedTempFile::new().unwrap();
        let mut tailer = Tailer::new();
        tailer.read_new_lines(file.path()).unwrap();

        let mut collected = Vec::new();
        for chunk in ["a\nb\n", "c\n", "d\ne\n"] {
            append(file.path(), chunk);
            collected.extend(tailer.read_new_lines(file.path()).unwrap());
        }

        // Rejoining the returned fragments reproduces the appended bytes.
        let rejoined = collected.join("\n");
        assert_eq!(rejoined.replace("\n\n", "\n"), "a\nb\nc\nd\ne\n");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let mut tailer = Tailer::new();
        assert!(tailer
            .read_new_lines(Path::new("/nonexistent/securemonitor.log"))
            .is_err());
    }
}
