//! Byte encodings for binary source text.

use super::sanitize::sanitize;

/// Text encoding of binary source data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// ISO 8859-1 (Latin-1): every byte maps to the code point of its value.
    Iso88591,
}

impl Encoding {
    /// Look up an encoding by name.
    ///
    /// Accepts "ISO 8859-1" and its common spellings ("ISO-8859-1",
    /// "iso8859-1", "latin1"), case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized: String = name
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_'))
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "iso88591" | "latin1" | "l1" => Some(Encoding::Iso88591),
            _ => None,
        }
    }

    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            Encoding::Iso88591 => bytes.iter().map(|&b| b as char).collect(),
        }
    }
}

/// Decode bytes with `encoding`, or as sanitized UTF-8 when none is set.
pub fn decode_bytes(encoding: Option<Encoding>, bytes: &[u8]) -> String {
    match encoding {
        Some(e) => e.decode(bytes),
        None => sanitize(bytes),
    }
}
