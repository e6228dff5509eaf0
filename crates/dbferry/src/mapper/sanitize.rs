//! Invalid UTF-8 replacement at the decode boundary.

/// Decode `bytes` as UTF-8, replacing each invalid byte with U+FFFD.
///
/// Unlike [`String::from_utf8_lossy`], which emits one replacement per
/// maximal invalid subsequence, this emits exactly one per offending byte.
pub fn sanitize(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        out.push_str(chunk.valid());
        for _ in chunk.invalid() {
            out.push(char::REPLACEMENT_CHARACTER);
        }
    }
    out
}

/// Take ownership of `bytes` as text, copying only when they are not valid
/// UTF-8.
pub fn sanitize_owned(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => sanitize(e.as_bytes()),
    }
}
