//! Announcement listings, keyed by title with no comparable fields.
//!
//! A title edit is indistinguishable from a removal plus an addition; that
//! behaviour is deliberate and preserved.

use tracing::warn;

use super::{entry_text, format_date, meta_for, parse_entries};
use crate::dispatch::WatchRequest;
use crate::error::EngineError;
use crate::policy::SourcePolicy;
use crate::record::{dedup_last_wins, CanonicalRecord, FieldValue, SourceMeta};
use crate::schema::SourceSchema;

pub const SCHEMA: SourceSchema = SourceSchema {
    key_field: "title",
    scalar_fields: &["title", "published_at", "link"],
    list_fields: &[],
    comparable_fields: &[],
};

pub struct Announcements;

impl SourcePolicy for Announcements {
    fn source_id(&self) -> &'static str {
        "announcements"
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
            let title = match entry_text(entry, "title") {
                Some(title) => title,
                None => {
                    warn!(source_id = self.source_id(), ?entry, "Dropping entry without title");
                    continue;
                }
            };
            let published_at = entry_text(entry, "published_at")
                .map(|d| format_date(&d))
                .unwrap_or_default();
            let link = entry_text(entry, "link").unwrap_or_default();
            records.push(
                CanonicalRecord::new()
                    .with("title", FieldValue::text(title))
                    .with("published_at", FieldValue::text(published_at))
                    .with("link", FieldValue::text(link)),
            );
        }
        Ok((meta, dedup_last_wins(records, SCHEMA.key_field)))
    }
}
