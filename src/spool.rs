//! Spool-directory chunk intake.
//!
//! A thin stand-in for the buffering framework: each file in the spool
//! directory is one chunk, named `<tag>.<anything>`, and is removed once the
//! sink reports it processed or skipped. Files left in place (after a fatal
//! delivery error) are picked up again on the next poll.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::chunk::Chunk;

/// A directory of pending chunk files.
#[derive(Debug, Clone)]
pub struct Spool {
    dir: PathBuf,
}

impl Spool {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Pending chunk files, oldest first. A missing spool directory is
    /// treated as empty.
    pub fn poll(&self) -> io::Result<Vec<PathBuf>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err),
        };

        let mut files: Vec<(SystemTime, PathBuf)> = Vec::new();
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if !entry.file_type()?.is_file() || is_hidden(&path) {
                continue;
            }
            let modified = entry.metadata()?.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            files.push((modified, path));
        }

        files.sort();
        Ok(files.into_iter().map(|(_, path)| path).collect())
    }

    /// Read one chunk file; the file name up to the first `.` is the tag.
    pub fn load(&self, path: &Path) -> io::Result<Chunk> {
        let payload = fs::read(path)?;
        Ok(Chunk::new(tag_for(path), payload))
    }

    pub fn remove(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('.'))
}

fn tag_for(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    match name.split('.').next() {
        Some(tag) if !tag.is_empty() => tag.to_string(),
        _ => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_tag_from_file_name() {
        assert_eq!(tag_for(Path::new("/spool/web.b2a7.chunk")), "web");
        assert_eq!(tag_for(Path::new("/spool/events")), "events");
    }

    #[test]
    fn test_poll_skips_directories_and_hidden_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("web.chunk"), b"{}\n").unwrap();
        fs::write(dir.path().join(".partial"), b"x").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();

        let spool = Spool::new(dir.path());
        let files = spool.poll().unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("web.chunk"));
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let spool = Spool::new("/nonexistent/drift-spool");
        assert!(spool.poll().unwrap().is_empty());
    }

    #[test]
    fn test_load_and_remove() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("web.access.chunk");
        fs::write(&path, b"{\"a\":1}\n").unwrap();

        let spool = Spool::new(dir.path());
        let chunk = spool.load(&path).unwrap();
        assert_eq!(chunk.tag(), "web");
        assert_eq!(chunk.payload().as_ref(), b"{\"a\":1}\n");

        spool.remove(&path).unwrap();
        assert!(spool.poll().unwrap().is_empty());
    }
}
