//! Concrete source policies and the registry the dispatcher looks them up in.
//!
//! Each source type is a small, mechanical [`SourcePolicy`] implementation:
//! a schema plus a normaliser. Shared payload helpers live here.

pub mod announcements;
pub mod bulletin;
pub mod legal_texts;
pub mod organisations;

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde_json::Value;

use crate::dispatch::WatchRequest;
use crate::error::EngineError;
use crate::policy::SourcePolicy;
use crate::record::SourceMeta;

/// Fixed display offset for report timestamps (UTC+3).
const REPORT_UTC_OFFSET_SECS: i32 = 3 * 3600;

/// Source-id keyed registry of policies.
pub struct SourceRegistry {
    policies: HashMap<&'static str, Box<dyn SourcePolicy>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        SourceRegistry {
            policies: HashMap::new(),
        }
    }

    /// Registry with every built-in source type.
    pub fn with_default_sources() -> Self {
        let mut registry = SourceRegistry::new();
        registry.register(Box::new(organisations::Organisations));
        registry.register(Box::new(announcements::Announcements));
        registry.register(Box::new(legal_texts::LegalTexts));
        registry.register(Box::new(bulletin::Bulletin));
        registry
    }

    pub fn register(&mut self, policy: Box<dyn SourcePolicy>) {
        self.policies.insert(policy.source_id(), policy);
    }

    pub fn get(&self, source_id: &str) -> Option<&dyn SourcePolicy> {
        self.policies.get(source_id).map(Box::as_ref)
    }

    pub fn source_ids(&self) -> Vec<&'static str> {
        let mut ids: Vec<_> = self.policies.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        SourceRegistry::with_default_sources()
    }
}

/// Builds the immutable invocation metadata from the inbound request.
pub(crate) fn meta_for(request: &WatchRequest) -> SourceMeta {
    SourceMeta {
        source_id: request.source_id.clone(),
        display_name: request.display_name.clone(),
        origin_uri: request.origin_uri.clone(),
        captured_at: format_timestamp(&request.captured_at),
        destination_address: request.destination_address.clone(),
        collection_id: request.target_collection.clone(),
    }
}

/// RFC 3339 timestamp → fixed-offset display string. Unparseable input is
/// passed through untouched; display formatting never affects comparison.
pub(crate) fn format_timestamp(raw: &str) -> String {
    let parsed = DateTime::parse_from_rfc3339(raw);
    match (parsed, FixedOffset::east_opt(REPORT_UTC_OFFSET_SECS)) {
        (Ok(ts), Some(offset)) => ts
            .with_timezone(&offset)
            .format("%d.%m.%Y %H:%M")
            .to_string(),
        _ => raw.to_string(),
    }
}

/// ISO date → display date, pass-through on anything else.
pub(crate) fn format_date(raw: &str) -> String {
    match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        Ok(date) => date.format("%d.%m.%Y").to_string(),
        Err(_) => raw.to_string(),
    }
}

/// Parses the payload wrapper: a top-level JSON array, or an object with an
/// `items` array. Anything else is a malformed payload for this source.
pub(crate) fn parse_entries(raw: &str, source_id: &str) -> Result<Vec<Value>, EngineError> {
    let value: Value = serde_json::from_str(raw).map_err(|e| {
        EngineError::MalformedPayload(format!("{source_id}: payload is not valid JSON: {e}"))
    })?;
    match value {
        Value::Array(entries) => Ok(entries),
        Value::Object(ref map) => match map.get("items").and_then(Value::as_array) {
            Some(entries) => Ok(entries.clone()),
            None => Err(EngineError::MalformedPayload(format!(
                "{source_id}: expected an array or an object with an `items` array"
            ))),
        },
        _ => Err(EngineError::MalformedPayload(format!(
            "{source_id}: expected an array wrapper"
        ))),
    }
}

/// Trimmed non-empty string field of a payload entry.
pub(crate) fn entry_text(entry: &Value, field: &str) -> Option<String> {
    entry
        .get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// List field of a payload entry: a JSON string array, or a single
/// comma-separated string.
pub(crate) fn entry_list(entry: &Value, field: &str) -> Vec<String> {
    match entry.get(field) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::String(joined)) => joined
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}
