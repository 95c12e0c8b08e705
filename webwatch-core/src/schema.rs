//! Static per-source schemas.
//!
//! Record identity and the comparable-field set are declared here as data,
//! never inferred from payload shape at runtime. Adding a source type means
//! declaring a schema and a normaliser, not branching inside the engine.

use crate::record::FieldValue;

/// Declares the key field, the canonical field set and the comparison policy
/// for one source type.
///
/// `key_field` must appear in `scalar_fields`. A source with an empty
/// `comparable_fields` set (title-only listings) never produces `changed`
/// entries: a title edit shows up as a removal plus an addition. A singleton
/// blob source uses a constant key so the whole snapshot is one record.
#[derive(Debug, Clone, Copy)]
pub struct SourceSchema {
    pub key_field: &'static str,
    pub scalar_fields: &'static [&'static str],
    pub list_fields: &'static [&'static str],
    pub comparable_fields: &'static [&'static str],
}

impl SourceSchema {
    /// All canonical field names, scalar first.
    pub fn canonical_fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.scalar_fields
            .iter()
            .chain(self.list_fields.iter())
            .copied()
    }

    pub fn is_list_field(&self, name: &str) -> bool {
        self.list_fields.contains(&name)
    }

    /// Neutral value for an absent field, so comparison never sees nulls.
    pub fn empty_value(&self, name: &str) -> FieldValue {
        if self.is_list_field(name) {
            FieldValue::empty_list()
        } else {
            FieldValue::empty_text()
        }
    }
}
