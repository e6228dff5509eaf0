//! Destination identifier validation.
//!
//! SQL identifiers cannot be bound as parameters, so the destination table is
//! spliced into statement text. Names are otherwise trusted; this check only
//! rejects shapes that can never be a single bare identifier.

use crate::error::{FerryError, Result};

/// Validate a destination table name.
///
/// Rejects:
/// - Empty names
/// - Names containing any whitespace (spaces, tabs, newlines)
/// - Names containing null bytes
///
/// # Errors
///
/// Returns `FerryError::InvalidTable` naming the offending identifier.
pub fn validate_table(name: &str) -> Result<()> {
    if name.is_empty() || name.contains('\0') || name.chars().any(char::is_whitespace) {
        return Err(FerryError::InvalidTable(name.to_string()));
    }
    Ok(())
}
