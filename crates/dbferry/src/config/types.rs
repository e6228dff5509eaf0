//! Configuration type definitions.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Driver types with a shipped implementation.
pub const SUPPORTED_DB_TYPES: &[&str] = &["postgres", "postgresql", "pgx", "mysql", "sqlite"];

/// Driver types recognised for placeholder purposes only.
pub const DIALECT_ONLY_DB_TYPES: &[&str] = &["oracle", "godror"];

/// Root configuration structure: the connection registry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Connection name -> connection settings.
    #[serde(default)]
    pub connections: BTreeMap<String, ConnectionConfig>,
}

/// One named database connection.
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Driver type: postgres | pgx | mysql | sqlite (oracle | godror are
    /// recognised but have no driver).
    pub db_type: String,

    /// Driver-specific datasource string (libpq key/values or URL for
    /// PostgreSQL, URL for MySQL, URL or path for SQLite).
    pub datasource: String,

    /// PostgreSQL TLS mode (disable, require, verify-ca, verify-full).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_mode: Option<String>,

    /// Pool size (default: 4).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<usize>,
}

impl ConnectionConfig {
    /// Effective pool size.
    pub fn pool_size(&self) -> usize {
        self.max_connections.unwrap_or(4)
    }

    /// Effective TLS mode string.
    pub fn ssl_mode(&self) -> &str {
        self.ssl_mode.as_deref().unwrap_or("disable")
    }
}

// Datasource strings embed credentials.
impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("db_type", &self.db_type)
            .field("datasource", &"[REDACTED]")
            .field("ssl_mode", &self.ssl_mode)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}
