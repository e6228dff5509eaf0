//! Error types for the transfer library.

use thiserror::Error;

/// Boxed error produced by a database driver.
///
/// Drivers report failures in their own vocabulary; the engine only needs the
/// message text (skip-policy matching) and the source chain (diagnostics).
pub type DriverError = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for transfer operations.
#[derive(Error, Debug)]
pub enum FerryError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Named connection is not registered
    #[error("Connection '{0}' not found")]
    NotFound(String),

    /// Request is malformed (missing statement, bad limit, etc.)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Destination table identifier failed validation
    #[error("Invalid table name {0:?}: must be non-empty without whitespace or NUL")]
    InvalidTable(String),

    /// Template render failed for a destination field
    #[error("Template render failed for field '{field}': {message}")]
    RenderFailed { field: String, message: String },

    /// Value could not be parsed into the declared destination type
    #[error("Cannot parse field '{field}' value {value:?} as {expected}: {message}")]
    ParseFailed {
        field: String,
        value: String,
        expected: &'static str,
        message: String,
    },

    /// Text encoding is unknown or conversion failed
    #[error("Encoding failed for field '{field}': {message}")]
    EncodingFailed { field: String, message: String },

    /// Begin, commit, rollback or savepoint handling failed
    #[error("Transaction {action} failed on '{conn}': {source}")]
    TransactionFailed {
        conn: String,
        action: &'static str,
        #[source]
        source: DriverError,
    },

    /// Statement execution failed
    #[error("Write to '{target}' failed: {source}")]
    WriteFailed {
        target: String,
        #[source]
        source: DriverError,
    },

    /// Opening, reading or decoding the source stream failed
    #[error("Stream from '{conn}' failed: {source}")]
    StreamFailed {
        conn: String,
        #[source]
        source: DriverError,
    },

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Operation was cancelled (SIGINT, caller token, etc.)
    #[error("Operation cancelled")]
    Cancelled,
}

impl FerryError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl ToString, context: impl Into<String>) -> Self {
        FerryError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a WriteFailed error
    pub fn write(target: impl Into<String>, source: impl Into<DriverError>) -> Self {
        FerryError::WriteFailed {
            target: target.into(),
            source: source.into(),
        }
    }

    /// Create a TransactionFailed error
    pub fn transaction(
        conn: impl Into<String>,
        action: &'static str,
        source: impl Into<DriverError>,
    ) -> Self {
        FerryError::TransactionFailed {
            conn: conn.into(),
            action,
            source: source.into(),
        }
    }

    /// Create a StreamFailed error
    pub fn stream(conn: impl Into<String>, source: impl Into<DriverError>) -> Self {
        FerryError::StreamFailed {
            conn: conn.into(),
            source: source.into(),
        }
    }

    /// Process exit code for this error when surfaced by the CLI.
    pub fn exit_code(&self) -> u8 {
        match self {
            FerryError::Config(_)
            | FerryError::BadRequest(_)
            | FerryError::InvalidTable(_)
            | FerryError::Yaml(_) => 2,
            FerryError::NotFound(_) => 3,
            FerryError::Cancelled => 130,
            _ => 1,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for transfer operations.
pub type Result<T> = std::result::Result<T, FerryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(FerryError::Config("x".into()).exit_code(), 2);
        assert_eq!(FerryError::InvalidTable("a b".into()).exit_code(), 2);
        assert_eq!(FerryError::NotFound("src".into()).exit_code(), 3);
        assert_eq!(FerryError::Cancelled.exit_code(), 130);
        assert_eq!(FerryError::write("t", "boom").exit_code(), 1);
    }

    #[test]
    fn test_format_detailed_walks_chain() {
        let err = FerryError::write("users", "duplicate key");
        let detailed = err.format_detailed();
        assert!(detailed.starts_with("Error: Write to 'users' failed: duplicate key"));
        assert!(detailed.contains("Caused by:\n  1: duplicate key"));
    }
}
