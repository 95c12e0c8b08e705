//! Legal-text listings, keyed by the document number, title comparable.

use tracing::warn;

use super::{entry_text, format_date, meta_for, parse_entries};
use crate::dispatch::WatchRequest;
use crate::error::EngineError;
use crate::policy::SourcePolicy;
use crate::record::{dedup_last_wins, CanonicalRecord, FieldValue, SourceMeta};
use crate::schema::SourceSchema;

pub const SCHEMA: SourceSchema = SourceSchema {
    key_field: "number",
    scalar_fields: &["number", "title", "published_at"],
    list_fields: &[],
    comparable_fields: &["title"],
};

pub struct LegalTexts;

impl SourcePolicy for LegalTexts {
    fn source_id(&self) -> &'static str {
        "legal-texts"
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
            let number = match entry_text(entry, "number") {
                Some(number) => number,
                None => {
                    warn!(source_id = self.source_id(), ?entry, "Dropping entry without number");
                    continue;
                }
            };
            let title = entry_text(entry, "title").unwrap_or_default();
            let published_at = entry_text(entry, "published_at")
                .map(|d| format_date(&d))
                .unwrap_or_default();
            records.push(
                CanonicalRecord::new()
                    .with("number", FieldValue::text(number))
                    .with("title", FieldValue::text(title))
                    .with("published_at", FieldValue::text(published_at)),
            );
        }
        Ok((meta, dedup_last_wins(records, SCHEMA.key_field)))
    }
}
