//! Singleton HTML-blob source: the whole page is one record.
//!
//! The record carries a constant key, so `added` fires only on the very
//! first observation, `changed` fires on any content difference and
//! `removed` never fires.

use regex::Regex;

use super::meta_for;
use crate::dispatch::WatchRequest;
use crate::error::EngineError;
use crate::policy::SourcePolicy;
use crate::record::{CanonicalRecord, FieldValue, SourceMeta};
use crate::schema::SourceSchema;

pub const SCHEMA: SourceSchema = SourceSchema {
    key_field: "slug",
    scalar_fields: &["slug", "content"],
    list_fields: &[],
    comparable_fields: &["content"],
};

/// Constant key of the single record.
const SLUG: &str = "bulletin";

pub struct Bulletin;

impl SourcePolicy for Bulletin {
    fn source_id(&self) -> &'static str {
        "bulletin"
    }

    fn schema(&self) -> &'static SourceSchema {
        &SCHEMA
    }

    fn normalize(
        &self,
        request: &WatchRequest,
    ) -> Result<(SourceMeta, Vec<CanonicalRecord>), EngineError> {
        let meta = meta_for(request);
        let content = strip_markup(&request.raw_text);
        if content.is_empty() {
            return Err(EngineError::MalformedPayload(
                "bulletin: payload reduced to empty content".to_string(),
            ));
        }
        let record = CanonicalRecord::new()
            .with("slug", FieldValue::text(SLUG))
            .with("content", FieldValue::text(content));
        Ok((meta, vec![record]))
    }
}

/// Strips tags and collapses whitespace so cosmetic markup edits do not
/// register as content changes.
fn strip_markup(html: &str) -> String {
    let without_tags = Regex::new(r"<[^>]+>").unwrap().replace_all(html, " ");
    Regex::new(r"\s+")
        .unwrap()
        .replace_all(&without_tags, " ")
        .trim()
        .to_string()
}
