//! Snapshot diff engine.
//!
//! Pure and deterministic: given the old persisted snapshot and the newly
//! observed snapshot, computes `added`, `removed` and `changed` by the
//! schema's key field. Input ordering never affects the outcome beyond the
//! reported sequence order.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::record::{dedup_last_wins, CanonicalRecord, DiffResult, PersistedRecord};
use crate::schema::SourceSchema;

/// Suffix appended to a comparable field's name to carry its prior value in
/// a `changed` entry.
pub const PREVIOUS_SUFFIX: &str = "_previous";

/// Diffs `old` against `new` under the given schema.
///
/// Duplicate keys in `new` are collapsed last-write-wins before comparison,
/// mirroring the normaliser's guarantee. Records without a readable key are
/// ignored on both sides.
pub fn diff(schema: &SourceSchema, old: &[PersistedRecord], new: &[CanonicalRecord]) -> DiffResult {
    let new = dedup_last_wins(new.to_vec(), schema.key_field);

    let mut old_by_key: BTreeMap<&str, &PersistedRecord> = BTreeMap::new();
    for record in old {
        if let Some(key) = record.key(schema.key_field) {
            old_by_key.insert(key, record);
        }
    }
    let new_keys: BTreeSet<&str> = new
        .iter()
        .filter_map(|r| r.key(schema.key_field))
        .collect();

    let mut result = DiffResult::default();

    let mut removed_seen: BTreeSet<&str> = BTreeSet::new();
    for record in old {
        if let Some(key) = record.key(schema.key_field) {
            if !new_keys.contains(key) && removed_seen.insert(key) {
                result.removed.push(record.clone());
            }
        }
    }

    for record in &new {
        let key = match record.key(schema.key_field) {
            Some(k) => k,
            None => continue,
        };
        match old_by_key.get(key) {
            None => result.added.push(record.clone()),
            Some(old_record) => {
                if let Some(changed) = compare_record(schema, old_record, record) {
                    result.changed.push(changed);
                }
            }
        }
    }

    debug!(
        added = result.added.len(),
        removed = result.removed.len(),
        changed = result.changed.len(),
        "Computed snapshot diff"
    );
    result
}

/// Compares one common record field by field. Returns the changed entry
/// (new values plus `_previous` slots for differing fields) when any
/// comparable field differs, `None` otherwise.
fn compare_record(
    schema: &SourceSchema,
    old: &PersistedRecord,
    new: &CanonicalRecord,
) -> Option<CanonicalRecord> {
    let mut differing: Vec<&'static str> = Vec::new();
    for field in schema.comparable_fields {
        let new_value = new
            .get(field)
            .cloned()
            .unwrap_or_else(|| schema.empty_value(field));
        let old_value = old
            .record
            .get(field)
            .cloned()
            .unwrap_or_else(|| schema.empty_value(field));
        if new_value.differs_from(&old_value) {
            differing.push(field);
        }
    }
    if differing.is_empty() {
        return None;
    }
    let mut changed = new.clone();
    for field in differing {
        let old_value = old
            .record
            .get(field)
            .cloned()
            .unwrap_or_else(|| schema.empty_value(field));
        changed.set(format!("{field}{PREVIOUS_SUFFIX}"), old_value);
    }
    Some(changed)
}
