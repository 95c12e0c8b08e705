//! Outbound report: rendering and the notifier contract.
//!
//! The report is rendered once, before reconciliation, so it always
//! reflects the delta about to be applied even when the write path later
//! partially fails.

use async_trait::async_trait;
use mockall::automock;

use crate::diff::PREVIOUS_SUFFIX;
use crate::error::NotifyError;
use crate::record::{CanonicalRecord, DiffResult, FieldValue, SourceMeta};

/// A rendered change report, ready for one outbound POST.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Report {
    pub to: String,
    pub subject: String,
    pub source_id: String,
    pub origin_uri: String,
    pub captured_at: String,
    pub added: Vec<CanonicalRecord>,
    pub removed: Vec<crate::record::PersistedRecord>,
    pub changed: Vec<CanonicalRecord>,
    pub body_html: String,
}

/// Delivery sink for rendered reports.
///
/// `deliver` posts to the immediate mail endpoint; `pool` hands the report
/// to a holding area for later batch delivery. Routing between the two is
/// the dispatcher's decision and changes nothing about diff or reconcile.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, report: &Report) -> Result<(), NotifyError>;

    async fn pool(&self, report: &Report) -> Result<(), NotifyError>;
}

/// Renders the report for one diff outcome.
pub fn render_report(meta: &SourceMeta, diff: &DiffResult) -> Report {
    Report {
        to: meta.destination_address.clone(),
        subject: format!("{} change report", meta.display_name),
        source_id: meta.source_id.clone(),
        origin_uri: meta.origin_uri.clone(),
        captured_at: meta.captured_at.clone(),
        added: diff.added.clone(),
        removed: diff.removed.clone(),
        changed: diff.changed.clone(),
        body_html: render_body(meta, diff),
    }
}

fn render_body(meta: &SourceMeta, diff: &DiffResult) -> String {
    let mut html = String::new();
    html.push_str(&format!(
        "<h1>{}</h1>\n<p>Source: <a href=\"{}\">{}</a><br>Captured: {}</p>\n",
        escape(&meta.display_name),
        escape(&meta.origin_uri),
        escape(&meta.origin_uri),
        escape(&meta.captured_at)
    ));
    if diff.is_empty() {
        html.push_str("<p>No changes detected.</p>\n");
        return html;
    }
    if !diff.added.is_empty() {
        html.push_str("<h2>Added</h2>\n<ul>\n");
        for record in &diff.added {
            html.push_str(&format!("<li>{}</li>\n", render_record(record)));
        }
        html.push_str("</ul>\n");
    }
    if !diff.removed.is_empty() {
        html.push_str("<h2>Removed</h2>\n<ul>\n");
        for record in &diff.removed {
            html.push_str(&format!("<li>{}</li>\n", render_record(&record.record)));
        }
        html.push_str("</ul>\n");
    }
    if !diff.changed.is_empty() {
        html.push_str("<h2>Changed</h2>\n<ul>\n");
        for record in &diff.changed {
            html.push_str(&format!("<li>{}</li>\n", render_changed(record)));
        }
        html.push_str("</ul>\n");
    }
    html
}

fn render_record(record: &CanonicalRecord) -> String {
    let parts: Vec<String> = record
        .fields()
        .iter()
        .map(|(name, value)| format!("{}: {}", escape(name), escape(&render_value(value))))
        .collect();
    parts.join(", ")
}

/// For a changed entry, fields with a `_previous` sibling render as
/// "previous → current"; the `_previous` slots themselves are folded in.
fn render_changed(record: &CanonicalRecord) -> String {
    let mut parts: Vec<String> = Vec::new();
    for (name, value) in record.fields() {
        if name.ends_with(PREVIOUS_SUFFIX) {
            continue;
        }
        let previous = record.get(&format!("{name}{PREVIOUS_SUFFIX}"));
        match previous {
            Some(old) => parts.push(format!(
                "{}: {} &rarr; {}",
                escape(name),
                escape(&render_value(old)),
                escape(&render_value(value))
            )),
            None => parts.push(format!("{}: {}", escape(name), escape(&render_value(value)))),
        }
    }
    parts.join(", ")
}

fn render_value(value: &FieldValue) -> String {
    match value {
        FieldValue::Text(s) => s.clone(),
        FieldValue::TextList(items) => items.join(", "),
    }
}

fn escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::PersistedRecord;

    fn meta() -> SourceMeta {
        SourceMeta {
            source_id: "organisations".into(),
            display_name: "Organisations".into(),
            origin_uri: "https://example.org/list.html".into(),
            captured_at: "01.02.2026 09:30".into(),
            destination_address: "watch@example.org".into(),
            collection_id: "orgs".into(),
        }
    }

    #[test]
    fn report_carries_destination_and_subject() {
        let diff = DiffResult::default();
        let report = render_report(&meta(), &diff);
        assert_eq!(report.to, "watch@example.org");
        assert_eq!(report.subject, "Organisations change report");
        assert!(report.body_html.contains("No changes detected"));
    }

    #[test]
    fn changed_entries_render_previous_and_current() {
        let changed = CanonicalRecord::new()
            .with("code", FieldValue::text("1"))
            .with("name", FieldValue::text("New name"))
            .with("name_previous", FieldValue::text("Old name"));
        let diff = DiffResult {
            added: vec![],
            removed: vec![PersistedRecord::new(
                "doc-1",
                CanonicalRecord::new().with("code", FieldValue::text("9")),
            )],
            changed: vec![changed],
        };
        let report = render_report(&meta(), &diff);
        assert!(report.body_html.contains("Old name &rarr; New name"));
        assert!(report.body_html.contains("<h2>Removed</h2>"));
        assert!(!report.body_html.contains("name_previous:"));
    }

    #[test]
    fn html_in_field_values_is_escaped() {
        let diff = DiffResult {
            added: vec![CanonicalRecord::new()
                .with("code", FieldValue::text("1"))
                .with("name", FieldValue::text("<script>alert(1)</script>"))],
            removed: vec![],
            changed: vec![],
        };
        let report = render_report(&meta(), &diff);
        assert!(report.body_html.contains("&lt;script&gt;"));
        assert!(!report.body_html.contains("<script>"));
    }
}
