//! Configuration and transfer-request validation.

use super::{Config, DIALECT_ONLY_DB_TYPES, SUPPORTED_DB_TYPES};
use crate::core::identifier::validate_table;
use crate::error::{FerryError, Result};
use crate::transfer::TransferRequest;
use crate::typemap::SemanticType;

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    if config.connections.is_empty() {
        return Err(FerryError::Config(
            "at least one connection must be configured".into(),
        ));
    }

    for (name, conn) in &config.connections {
        if name.trim().is_empty() {
            return Err(FerryError::Config("connection names cannot be empty".into()));
        }
        let db_type = conn.db_type.to_lowercase();
        if !SUPPORTED_DB_TYPES.contains(&db_type.as_str())
            && !DIALECT_ONLY_DB_TYPES.contains(&db_type.as_str())
        {
            return Err(FerryError::Config(format!(
                "connections.{}.db_type '{}' is not supported (expected one of: {})",
                name,
                conn.db_type,
                SUPPORTED_DB_TYPES.join(", ")
            )));
        }
        if conn.datasource.trim().is_empty() {
            return Err(FerryError::Config(format!(
                "connections.{}.datasource is required",
                name
            )));
        }
        if let Some(0) = conn.max_connections {
            return Err(FerryError::Config(format!(
                "connections.{}.max_connections must be at least 1",
                name
            )));
        }
    }

    Ok(())
}

/// Validate a transfer request before any connection is touched.
pub(crate) fn validate_request(request: &TransferRequest) -> Result<()> {
    if request.source.connection.is_empty() {
        return Err(FerryError::BadRequest("source.connection is required".into()));
    }
    if request.source.statement.trim().is_empty() {
        return Err(FerryError::BadRequest("source.statement is required".into()));
    }
    if request.destination.connection.is_empty() {
        return Err(FerryError::BadRequest(
            "destination.connection is required".into(),
        ));
    }
    validate_table(&request.destination.table)?;

    if request.type_map.enabled {
        for (field, rule) in &request.type_map.destination {
            if rule.kind == SemanticType::Bool {
                return Err(FerryError::BadRequest(format!(
                    "type_map.destination.{}: type must be string, number or date",
                    field
                )));
            }
        }
    }

    Ok(())
}
