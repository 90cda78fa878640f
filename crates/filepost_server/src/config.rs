//! Server configuration.

use std::net::SocketAddr;
use std::path::PathBuf;

/// Configuration for the filepost server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Running server version (1 = text uploads, 2 = binary uploads).
    pub version: u8,
    /// Maximum simultaneously authenticated sessions.
    pub max_connections: usize,
    /// Extra accept slots for connections still in the auth handshake.
    pub handshake_slack: usize,
    /// Path of the shared log file.
    pub log_file: PathBuf,
    /// Directory uploaded files are written into.
    pub upload_dir: PathBuf,
}

impl ServerConfig {
    /// Creates a configuration for the given address and version.
    pub fn new(bind_addr: SocketAddr, version: u8) -> Self {
        Self {
            bind_addr,
            version,
            max_connections: 3,
            handshake_slack: 8,
            log_file: PathBuf::from("log.txt"),
            upload_dir: PathBuf::from("."),
        }
    }

    /// Sets the maximum simultaneously authenticated sessions.
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the shared log file path.
    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = path.into();
        self
    }

    /// Sets the upload directory.
    pub fn with_upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.upload_dir = dir.into();
        self
    }

    /// Sets the handshake slack.
    pub fn with_handshake_slack(mut self, slack: usize) -> Self {
        self.handshake_slack = slack;
        self
    }

    /// Total accept-side permit count.
    pub fn accept_permits(&self) -> usize {
        self.max_connections + self.handshake_slack
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([127, 0, 0, 1], 8080)), 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.max_connections, 3);
        assert_eq!(config.version, 1);
        assert_eq!(config.log_file, PathBuf::from("log.txt"));
    }

    #[test]
    fn config_builder() {
        let config = ServerConfig::new("0.0.0.0:9000".parse().unwrap(), 2)
            .with_max_connections(5)
            .with_log_file("/tmp/journal.txt")
            .with_handshake_slack(2);

        assert_eq!(config.version, 2);
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.accept_permits(), 7);
    }
}
