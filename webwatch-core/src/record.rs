//! Canonical record model shared by every source type.
//!
//! A [`CanonicalRecord`] is a flat mapping from field names to scalar or
//! list-of-string values; nesting never goes deeper than that, so comparison
//! stays cheap and schema-driven. A [`PersistedRecord`] is the same thing
//! with the opaque identifier the store assigned on creation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single field value: scalar text or a list of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    TextList(Vec<String>),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Text(value.into())
    }

    pub fn list<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldValue::TextList(values.into_iter().map(Into::into).collect())
    }

    pub fn empty_text() -> Self {
        FieldValue::Text(String::new())
    }

    pub fn empty_list() -> Self {
        FieldValue::TextList(Vec::new())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::TextList(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            FieldValue::TextList(items) => Some(items),
            FieldValue::Text(_) => None,
        }
    }

    /// Comparison policy between an old and a new value of the same field.
    ///
    /// Scalars compare with strict inequality. Lists compare with a symmetric
    /// set-difference test plus a length check: reordering is not a change,
    /// but a length difference is, even when set membership matches.
    /// Duplicate-count differences at equal length go undetected.
    pub fn differs_from(&self, old: &FieldValue) -> bool {
        match (self, old) {
            (FieldValue::Text(new), FieldValue::Text(old)) => new != old,
            (FieldValue::TextList(new), FieldValue::TextList(old)) => {
                old.len() != new.len()
                    || old.iter().any(|v| !new.contains(v))
                    || new.iter().any(|v| !old.contains(v))
            }
            // Mixed shapes only happen on schema drift; treat as changed.
            _ => true,
        }
    }
}

/// A record freshly observed from a source, keyed by its schema's key field.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalRecord {
    fields: BTreeMap<String, FieldValue>,
}

impl CanonicalRecord {
    pub fn new() -> Self {
        CanonicalRecord::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: FieldValue) {
        self.fields.insert(name.into(), value);
    }

    pub fn with(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// The record's key value under the given key field, if present and scalar.
    pub fn key(&self, key_field: &str) -> Option<&str> {
        self.fields.get(key_field).and_then(FieldValue::as_text)
    }

    pub fn fields(&self) -> &BTreeMap<String, FieldValue> {
        &self.fields
    }

    pub fn into_fields(self) -> BTreeMap<String, FieldValue> {
        self.fields
    }
}

impl FromIterator<(String, FieldValue)> for CanonicalRecord {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        CanonicalRecord {
            fields: iter.into_iter().collect(),
        }
    }
}

/// A record as held by the document store: canonical fields plus the opaque
/// persisted identifier. The identifier is assigned once on create and never
/// reassigned; a key that disappears and later reappears gets a fresh one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedRecord {
    pub id: String,
    pub record: CanonicalRecord,
}

impl PersistedRecord {
    pub fn new(id: impl Into<String>, record: CanonicalRecord) -> Self {
        PersistedRecord {
            id: id.into(),
            record,
        }
    }

    pub fn key(&self, key_field: &str) -> Option<&str> {
        self.record.key(key_field)
    }
}

/// Outcome of diffing an old snapshot against a new one.
///
/// `changed` entries carry the new field values plus `<field>_previous`
/// slots for each comparable field that differed, so a report can render
/// before/after without a second lookup.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiffResult {
    pub added: Vec<CanonicalRecord>,
    pub removed: Vec<PersistedRecord>,
    pub changed: Vec<CanonicalRecord>,
}

impl DiffResult {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

/// Per-invocation metadata produced by the normaliser and never mutated
/// afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMeta {
    pub source_id: String,
    pub display_name: String,
    pub origin_uri: String,
    /// Capture timestamp already formatted for display; has no bearing on
    /// comparison.
    pub captured_at: String,
    pub destination_address: String,
    /// Target storage location (collection id) for this source's records.
    pub collection_id: String,
}

/// Collapses duplicate keys within one snapshot, last occurrence wins.
///
/// The surviving record keeps the position of the key's first occurrence so
/// report ordering stays stable. Records without a readable key are dropped.
pub fn dedup_last_wins(records: Vec<CanonicalRecord>, key_field: &str) -> Vec<CanonicalRecord> {
    let mut out: Vec<CanonicalRecord> = Vec::with_capacity(records.len());
    let mut index_by_key: BTreeMap<String, usize> = BTreeMap::new();
    for record in records {
        let key = match record.key(key_field) {
            Some(k) if !k.is_empty() => k.to_string(),
            _ => continue,
        };
        match index_by_key.get(&key) {
            Some(&idx) => out[idx] = record,
            None => {
                index_by_key.insert(key, out.len());
                out.push(record);
            }
        }
    }
    out
}
