//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// Filesystem path of the SQLite database.
    /// Env: `DB_PATH`
    /// Default: the platform data directory (see `Database::new`).
    pub db_path: Option<PathBuf>,

    /// Human-readable name for this server instance.
    /// Env: `INSTANCE_NAME`
    /// Default: `"Marginalia"`
    pub instance_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], 8080).into(),
            db_path: None,
            instance_name: "Marginalia".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(
                    value = %addr,
                    "Invalid HTTP_ADDR, using default"
                );
            }
        }

        if let Ok(path) = std::env::var("DB_PATH") {
            if !path.is_empty() {
                config.db_path = Some(PathBuf::from(path));
            }
        }

        if let Ok(name) = std::env::var("INSTANCE_NAME") {
            config.instance_name = name;
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 8080).into());
        assert!(config.db_path.is_none());
        assert_eq!(config.instance_name, "Marginalia");
    }
}
