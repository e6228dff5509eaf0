//! Named connection registry.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::core::traits::Connection;
use crate::drivers;
use crate::error::{FerryError, Result};

/// Connections addressed by their configured name.
#[derive(Default)]
pub struct Registry {
    connections: HashMap<String, Arc<dyn Connection>>,
}

impl Registry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a connection for every configured entry.
    ///
    /// Must be called from within a tokio runtime; pools are created but not
    /// dialed.
    pub fn connect(config: &Config) -> Result<Self> {
        let mut registry = Self::new();
        for (name, entry) in &config.connections {
            debug!("Registering connection '{}' ({})", name, entry.db_type);
            registry.insert(name.clone(), drivers::connect(name, entry)?);
        }
        info!("Registered {} connection(s)", registry.connections.len());
        Ok(registry)
    }

    /// Register or replace a connection.
    pub fn insert(&mut self, name: impl Into<String>, conn: Arc<dyn Connection>) {
        self.connections.insert(name.into(), conn);
    }

    /// Look up a connection by name.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Connection>> {
        self.connections
            .get(name)
            .cloned()
            .ok_or_else(|| FerryError::NotFound(name.to_string()))
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.connections.keys().cloned().collect();
        names.sort();
        names
    }

    /// Ping every connection, returning each name with its outcome.
    pub async fn health_check(&self) -> Vec<(String, Result<()>)> {
        let mut results = Vec::with_capacity(self.connections.len());
        for name in self.names() {
            let outcome = match self.resolve(&name) {
                Ok(conn) => conn
                    .ping()
                    .await
                    .map_err(|e| FerryError::pool(e, format!("pinging '{}'", name))),
                Err(e) => Err(e),
            };
            if let Err(e) = &outcome {
                warn!("Connection '{}' is unhealthy: {}", name, e);
            }
            results.push((name, outcome));
        }
        results
    }

    /// Close every pool.
    pub async fn close(&self) {
        for (name, conn) in &self.connections {
            debug!("Closing connection '{}'", name);
            conn.close().await;
        }
    }
}
