//! Configuration types.

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::error::ConfigError;

/// Well-known log directory inside the service container.
pub const DEFAULT_LOG_DIR: &str = "/app/pgcopydb_files/logs";

/// Log directory used when the well-known one does not exist.
pub const DEFAULT_FALLBACK_LOG_DIR: &str = "/tmp/logs";

/// Service configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Interface the HTTP server binds to.
    pub host: String,
    /// Port the HTTP server listens on.
    pub port: u16,
    /// Preferred log directory, used only if it already exists.
    pub log_dir: PathBuf,
    /// Log directory created on demand when `log_dir` is missing.
    pub fallback_log_dir: PathBuf,
    /// pgcopydb executable name or path.
    pub pgcopydb_bin: String,
    /// Name reported by health and info endpoints.
    pub pod_name: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            fallback_log_dir: PathBuf::from(DEFAULT_FALLBACK_LOG_DIR),
            pgcopydb_bin: "pgcopydb".to_string(),
            pod_name: "unknown".to_string(),
        }
    }
}

impl ServiceConfig {
    /// Build configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let host = std::env::var("PGCOPYDB_API_HOST").unwrap_or(defaults.host);

        let port: u16 = std::env::var("PGCOPYDB_API_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.port);

        let log_dir = std::env::var("PGCOPYDB_LOG_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.log_dir);

        let fallback_log_dir = std::env::var("PGCOPYDB_FALLBACK_LOG_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.fallback_log_dir);

        let pgcopydb_bin = std::env::var("PGCOPYDB_BIN")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.pgcopydb_bin);

        let pod_name = std::env::var("POD_NAME")
            .or_else(|_| std::env::var("HOSTNAME"))
            .unwrap_or(defaults.pod_name);

        Self {
            host,
            port,
            log_dir,
            fallback_log_dir,
            pgcopydb_bin,
            pod_name,
        }
    }

    /// Socket address for the HTTP listener.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::InvalidValue {
                key: "PGCOPYDB_API_HOST".to_string(),
                message: e.to_string(),
            })
    }
}
