//! The shared log file.
//!
//! Every access goes through one mutex: audit appends from uploads,
//! whole-file reads for log requests, and overwrites from log changes
//! all exclude each other across handler tasks. The lock is never held
//! across an await.

use crate::error::ServerResult;
use chrono::Utc;
use parking_lot::Mutex;
use std::fs::OpenOptions;
use std::io::Write;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Mutex-guarded access to the shared log file.
#[derive(Debug)]
pub struct LogStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl LogStore {
    /// Creates a store for the log at `path`. The file itself is
    /// created lazily on first append.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one audit line recording a received file.
    pub fn append_audit(
        &self,
        client_id: &str,
        remote_addr: SocketAddr,
        file_name: &str,
        size: usize,
    ) -> ServerResult<()> {
        let line = format!(
            "[{}]\t\t{}\t\t{}\t\t{}\t\t{} bytes\n",
            Utc::now().format("%Y-%m-%d %H:%M:%S"),
            client_id,
            remote_addr,
            file_name,
            size
        );

        let _guard = self.lock.lock();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    /// Reads the entire log. A log that does not exist yet reads as
    /// empty.
    pub fn read(&self) -> ServerResult<Vec<u8>> {
        let _guard = self.lock.lock();
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Replaces the log contents.
    pub fn overwrite(&self, contents: &[u8]) -> ServerResult<()> {
        let _guard = self.lock.lock();
        std::fs::write(&self.path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_log_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = LogStore::new(dir.path().join("log.txt"));
        assert!(store.read().unwrap().is_empty());
    }

    #[test]
    fn audit_appends_a_line() {
        let dir = tempfile::tempdir().unwrap();
        let store = LogStore::new(dir.path().join("log.txt"));
        let addr: SocketAddr = "127.0.0.1:4444".parse().unwrap();

        store.append_audit("alice", addr, "report.txt", 42).unwrap();
        store.append_audit("bob", addr, "data.bin", 7).unwrap();

        let contents = String::from_utf8(store.read().unwrap()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("alice"));
        assert!(lines[0].contains("report.txt"));
        assert!(lines[0].contains("42 bytes"));
        assert!(lines[1].contains("bob"));
    }

    #[test]
    fn overwrite_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let store = LogStore::new(dir.path().join("log.txt"));
        let addr: SocketAddr = "127.0.0.1:4444".parse().unwrap();

        store.append_audit("alice", addr, "a.txt", 1).unwrap();
        store.overwrite(b"rewritten\n").unwrap();
        assert_eq!(store.read().unwrap(), b"rewritten\n");
    }
}
