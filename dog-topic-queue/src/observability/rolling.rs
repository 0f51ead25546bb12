use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;

/// Size-capped log file writer
///
/// Once a write would push `path` past `max_size` bytes the file is rotated:
/// `path.{n-1}` moves to `path.{n}` (the oldest beyond `max_files` is
/// dropped) and `path` moves to `path.1`.
pub struct RollingFileWriter {
    path: PathBuf,
    max_size: u64,
    max_files: usize,
    file: File,
    written: u64,
}

impl RollingFileWriter {
    pub fn open(path: impl Into<PathBuf>, max_size: u64, max_files: usize) -> io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let written = file.metadata()?.len();

        Ok(Self {
            path,
            max_size,
            max_files,
            file,
            written,
        })
    }

    fn rotated(&self, index: usize) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(format!(".{}", index));
        PathBuf::from(name)
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;

        if self.max_files == 0 {
            self.file = OpenOptions::new().create(true).write(true).truncate(true).open(&self.path)?;
            self.written = 0;
            return Ok(());
        }

        let oldest = self.rotated(self.max_files);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }
        for index in (1..self.max_files).rev() {
            let from = self.rotated(index);
            if from.exists() {
                fs::rename(&from, self.rotated(index + 1))?;
            }
        }
        fs::rename(&self.path, self.rotated(1))?;

        self.file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        self.written = 0;
        Ok(())
    }
}

impl Write for RollingFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // An oversized single entry still lands in a fresh file
        if self.written > 0 && self.written + buf.len() as u64 > self.max_size {
            self.rotate()?;
        }
        let n = self.file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotates_when_size_exceeded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("combined.log");
        let mut writer = RollingFileWriter::open(&path, 10, 2).unwrap();

        writer.write_all(b"aaaaaaaa\n").unwrap();
        writer.write_all(b"bbbbbbbb\n").unwrap();
        writer.write_all(b"cccccccc\n").unwrap();
        writer.write_all(b"dddddddd\n").unwrap();
        writer.flush().unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "dddddddd\n");
        assert_eq!(fs::read_to_string(dir.path().join("combined.log.1")).unwrap(), "cccccccc\n");
        assert_eq!(fs::read_to_string(dir.path().join("combined.log.2")).unwrap(), "bbbbbbbb\n");
        assert!(!dir.path().join("combined.log.3").exists());
    }

    #[test]
    fn test_reopen_appends_and_counts_existing_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("queue.log");

        {
            let mut writer = RollingFileWriter::open(&path, 100, 1).unwrap();
            writer.write_all(b"first\n").unwrap();
        }
        let mut writer = RollingFileWriter::open(&path, 100, 1).unwrap();
        assert_eq!(writer.written, 6);
        writer.write_all(b"second\n").unwrap();
        writer.flush().unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "first\nsecond\n");
    }

    #[test]
    fn test_zero_max_files_truncates_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.log");
        let mut writer = RollingFileWriter::open(&path, 4, 0).unwrap();

        writer.write_all(b"abc\n").unwrap();
        writer.write_all(b"xyz\n").unwrap();
        writer.flush().unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "xyz\n");
        assert!(!dir.path().join("queue.log.1").exists());
    }
}
