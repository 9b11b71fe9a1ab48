//! Deterministic identifiers for embedded records
//!
//! Batches are delivered at least once, so a worker may embed the same dataset line
//! twice. The vector store upsert stays idempotent because the point id is derived from
//! the record itself: SHA-256 over a canonical JSON rendering, truncated to the first
//! 8 bytes read big-endian.
//!
//! The canonical rendering is compact JSON with object keys sorted and everything
//! outside printable ASCII escaped as `\uXXXX`. Collections populated by earlier
//! ingestion runs used exactly this form, so ids stay stable across implementations.

use crate::error::Result;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{ser::Formatter, Value};
use sha2::{Digest, Sha256};
use std::io;

/// Payload `type` written for records that do not say otherwise
pub const DEFAULT_SOURCE_TYPE: &str = "arXiv";

/// Payload stored next to each vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordPayload {
    #[serde(rename = "type")]
    pub source_type: String,
    pub original_json: Value,
}

impl RecordPayload {
    pub fn new(source_type: impl Into<String>, original_json: Value) -> Self {
        Self {
            source_type: source_type.into(),
            original_json,
        }
    }

    /// Store identifier, derived from `original_json` only
    pub fn id(&self) -> Result<u64> {
        record_id(&self.original_json)
    }
}

/// Render `value` in canonical form
pub fn canonical_json(value: &Value) -> Result<String> {
    let mut buf = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, AsciiFormatter);
    Canonical(value).serialize(&mut serializer)?;
    // AsciiFormatter only ever emits ASCII
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// 64-bit identifier of a record: first 8 bytes (big-endian) of SHA-256 over its canonical form
pub fn record_id(value: &Value) -> Result<u64> {
    let canonical = canonical_json(value)?;
    let digest = Sha256::digest(canonical.as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    Ok(u64::from_be_bytes(head))
}

/// Serializes objects with their keys in code point order, independent of map ordering
struct Canonical<'a>(&'a Value);

impl Serialize for Canonical<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.0 {
            Value::Array(items) => serializer.collect_seq(items.iter().map(Canonical)),
            Value::Object(map) => {
                let mut entries: Vec<(&String, &Value)> = map.iter().collect();
                entries.sort_by(|a, b| a.0.cmp(b.0));
                serializer.collect_map(entries.into_iter().map(|(k, v)| (k, Canonical(v))))
            },
            scalar => scalar.serialize(serializer),
        }
    }
}

/// Compact formatter that escapes every character outside `' '..='~'`
struct AsciiFormatter;

impl Formatter for AsciiFormatter {
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let mut units = [0u16; 2];
        for ch in fragment.chars() {
            if (' '..='~').contains(&ch) {
                let mut byte = [0u8; 4];
                writer.write_all(ch.encode_utf8(&mut byte).as_bytes())?;
            } else {
                for unit in ch.encode_utf16(&mut units) {
                    write!(writer, "\\u{:04x}", unit)?;
                }
            }
        }
        Ok(())
    }
}
