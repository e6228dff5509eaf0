//! Utilities shared across database drivers.
//!
//! - [`tls`]: TLS configuration for PostgreSQL connections
//! - [`decode`]: text-to-value decoding for drivers that hand back raw text

pub mod decode;
pub mod tls;

pub use decode::decode_text;
pub use tls::{SslMode, TlsBuilder};
