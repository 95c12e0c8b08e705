//! Organisation listings: code, name and a list of granted authorities.
//!
//! The richest source shape: a scalar comparable field plus a
//! list-of-string comparable field.

use tracing::warn;

use super::{entry_list, entry_text, meta_for, parse_entries};
use crate::dispatch::WatchRequest;
use crate::error::EngineError;
use crate::policy::SourcePolicy;
use crate::record::{dedup_last_wins, CanonicalRecord, FieldValue, SourceMeta};
use crate::schema::SourceSchema;

pub const SCHEMA: SourceSchema = SourceSchema {
    key_field: "code",
    scalar_fields: &["code", "name"],
    list_fields: &["authorities"],
    comparable_fields: &["name", "authorities"],
};

pub struct Organisations;

impl SourcePolicy for Organisations {
    fn source_id(&self) -> &'static str {
        "organisations"
    }

    fn schema(&self) -> &'static SourceSchema {
        &SCHEMA
    }

    fn normalize(
        &self,
        request: &WatchRequest,
    ) -> Result<(SourceMeta, Vec<CanonicalRecord>), EngineError> {
        let meta = meta_for(request);
        let entries = parse_entries(&request.raw_text, self.source_id())?;
        let mut records = Vec::with_capacity(entries.len());
        for entry in &entries {
            let code = match entry_text(entry, "code") {
                Some(code) => code,
                None => {
                    warn!(source_id = self.source_id(), ?entry, "Dropping entry without code");
                    continue;
                }
            };
            let name = entry_text(entry, "name").unwrap_or_default();
            let authorities = entry_list(entry, "authorities");
            records.push(
                CanonicalRecord::new()
                    .with("code", FieldValue::text(code))
                    .with("name", FieldValue::text(name))
                    .with("authorities", FieldValue::list(authorities)),
            );
        }
        Ok((meta, dedup_last_wins(records, SCHEMA.key_field)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::RoutingMode;

    fn request(raw_text: &str) -> WatchRequest {
        WatchRequest {
            source_id: "organisations".into(),
            display_name: "Organisations".into(),
            origin_uri: "https://example.org/orgs.html".into(),
            raw_text: raw_text.into(),
            captured_at: "2026-02-01T06:30:00Z".into(),
            destination_address: "watch@example.org".into(),
            target_collection: "orgs".into(),
            routing_mode: RoutingMode::Direct,
        }
    }

    #[test]
    fn normalises_entries_and_splits_authority_strings() {
        let raw = r#"[
            {"code": "1", "name": "Alpha", "authorities": "a, b"},
            {"code": "2", "name": "Beta", "authorities": ["c"]}
        ]"#;
        let (meta, records) = Organisations.normalize(&request(raw)).unwrap();
        assert_eq!(meta.collection_id, "orgs");
        assert_eq!(meta.captured_at, "01.02.2026 09:30");
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0].get("authorities"),
            Some(&FieldValue::list(["a", "b"]))
        );
    }

    #[test]
    fn drops_entries_without_key_and_collapses_duplicates() {
        let raw = r#"[
            {"name": "keyless"},
            {"code": "1", "name": "first"},
            {"code": "1", "name": "last"}
        ]"#;
        let (_, records) = Organisations.normalize(&request(raw)).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("name"), Some(&FieldValue::text("last")));
    }

    #[test]
    fn non_array_payload_is_malformed() {
        let err = Organisations.normalize(&request("{\"rows\": 1}")).unwrap_err();
        assert!(matches!(err, EngineError::MalformedPayload(_)));
    }
}
