//! Immutable document records and their revision strings.

use std::hash::Hasher;

use ahash::AHasher;
use serde_json::Value;

use crate::error::{AvanceError, Result};
use crate::value::ScriptValue;

/// A document revision, `N-hhhh...` where `N` is the 1-based revision number
/// and the suffix is a 32-character hex digest of the body.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Revision {
    pub num: u64,
    digest: String,
}

impl Revision {
    pub fn new(num: u64, body: &ScriptValue) -> Self {
        Revision {
            num,
            digest: digest_hex(body),
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        let (num_str, digest) = s
            .split_once('-')
            .ok_or_else(|| AvanceError::InvalidArgument(format!("malformed rev: {s}")))?;
        let num = num_str
            .parse::<u64>()
            .map_err(|_| AvanceError::InvalidArgument(format!("malformed rev: {s}")))?;
        if digest.len() != 32 || !digest.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(AvanceError::InvalidArgument(format!("malformed rev: {s}")));
        }
        Ok(Revision {
            num,
            digest: digest.to_string(),
        })
    }
}

impl std::fmt::Display for Revision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.num, self.digest)
    }
}

/// Deterministic (not cryptographic) 128-bit digest of a document body,
/// rendered as 32 lowercase hex characters. Two independently-seeded
/// `AHasher`s stand in for a single 128-bit digest; uniqueness across
/// revisions, not collision resistance, is what the rest of the system
/// relies on.
fn digest_hex(body: &ScriptValue) -> String {
    let bytes = serde_json::to_vec(body).unwrap_or_default();

    let mut h1 = AHasher::default();
    h1.write(&bytes);
    h1.write_u8(0);
    let lo = h1.finish();

    let mut h2 = AHasher::default();
    h2.write(&bytes);
    h2.write_u8(1);
    let hi = h2.finish();

    format!("{hi:016x}{lo:016x}")
}

/// An immutable record: `(id, rev, sequence, deleted?, body)`.
#[derive(Debug, Clone)]
pub struct Document {
    id: String,
    rev: Revision,
    sequence: u64,
    deleted: bool,
    body: ScriptValue,
}

impl Document {
    pub fn new_live(id: String, rev: Revision, sequence: u64, body: ScriptValue) -> Self {
        Document {
            id,
            rev,
            sequence,
            deleted: false,
            body,
        }
    }

    pub fn new_tombstone(id: String, rev: Revision, sequence: u64) -> Self {
        Document {
            id,
            rev,
            sequence,
            deleted: true,
            body: Value::Null,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn rev(&self) -> &Revision {
        &self.rev
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn deleted(&self) -> bool {
        self.deleted
    }

    pub fn body(&self) -> &ScriptValue {
        &self.body
    }

    /// The value a map function sees: the body with `_id`/`_rev` merged in,
    /// the way CouchDB exposes `doc._id`/`doc._rev` inside map source. Only
    /// allocates when the body is an object (the common case); a
    /// non-object body is returned unchanged since there is nowhere to
    /// merge the fields into.
    pub fn script_value(&self) -> ScriptValue {
        match &self.body {
            Value::Object(map) => {
                let mut merged = map.clone();
                merged.insert("_id".to_string(), Value::String(self.id.clone()));
                merged.insert("_rev".to_string(), Value::String(self.rev.to_string()));
                Value::Object(merged)
            }
            other => other.clone(),
        }
    }
}

/// Documents are ordered and deduplicated on `id` alone (lexicographic over
/// raw bytes) — the Lazy Flat Set's notion of equality/order.
impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for Document {}

impl PartialOrd for Document {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Document {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.as_bytes().cmp(other.id.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn revision_round_trips_through_display_and_parse() {
        let rev = Revision::new(3, &json!({"a": 1}));
        let s = rev.to_string();
        let parsed = Revision::parse(&s).unwrap();
        assert_eq!(parsed, rev);
        assert_eq!(s.len(), 34);
    }

    #[test]
    fn same_body_same_digest() {
        let a = Revision::new(1, &json!({"x": 1, "y": 2}));
        let b = Revision::new(1, &json!({"x": 1, "y": 2}));
        assert_eq!(a, b);
    }

    #[test]
    fn documents_order_by_id_only() {
        let a = Document::new_live("a".into(), Revision::new(1, &json!(null)), 1, json!(null));
        let b = Document::new_live("b".into(), Revision::new(1, &json!({"z": 1})), 2, json!({"z": 1}));
        assert!(a < b);

        let a2 = Document::new_live("a".into(), Revision::new(2, &json!({"w": 1})), 3, json!({"w": 1}));
        assert_eq!(a, a2); // equal on id alone, regardless of rev/body
    }

    #[test]
    fn parse_rejects_malformed_revisions() {
        assert!(Revision::parse("not-a-rev").is_err());
        assert!(Revision::parse("1-tooshort").is_err());
        assert!(Revision::parse("x-00000000000000000000000000000000").is_err());
    }
}
