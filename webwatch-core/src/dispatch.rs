//! Dispatcher: one invocation end to end.
//!
//! Looks up the source policy by the id in the inbound request, then runs
//! normalise → fetch old → diff → notify → reconcile in strict order.
//! Notification precedes reconciliation so the delivered report always
//! reflects the delta about to be applied, even when some writes later
//! fail. Per-item reconcile failures never fail the invocation.

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::EngineError;
use crate::notify::{render_report, Notifier};
use crate::reconcile::{ReconcileReport, WritePolicy};
use crate::record::{CanonicalRecord, PersistedRecord, SourceMeta};
use crate::repository::Repository;
use crate::sources::SourceRegistry;

/// Inbound trigger body. `raw_text` is itself a JSON- or HTML-encoded
/// string whose inner shape only the source's normaliser understands.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchRequest {
    pub source_id: String,
    pub display_name: String,
    pub origin_uri: String,
    pub raw_text: String,
    pub captured_at: String,
    pub destination_address: String,
    pub target_collection: String,
    #[serde(default)]
    pub routing_mode: RoutingMode,
}

/// Where the rendered report goes: straight out, or into the pooled
/// holding sink for later batch delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingMode {
    #[default]
    Direct,
    Pooled,
}

/// Successful invocation outcome.
#[derive(Debug, Serialize)]
pub struct RunOutcome {
    pub metadata: SourceMeta,
    pub added: Vec<CanonicalRecord>,
    pub removed: Vec<PersistedRecord>,
    pub changed: Vec<CanonicalRecord>,
    /// Write counters for logs and tests; not part of the response body.
    #[serde(skip)]
    pub reconcile: ReconcileReport,
}

/// Response envelope for callers.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum RunResponse {
    Success {
        success: bool,
        metadata: SourceMeta,
        added: Vec<CanonicalRecord>,
        removed: Vec<PersistedRecord>,
        changed: Vec<CanonicalRecord>,
    },
    Failure {
        success: bool,
        error: String,
    },
}

impl From<Result<RunOutcome, EngineError>> for RunResponse {
    fn from(result: Result<RunOutcome, EngineError>) -> Self {
        match result {
            Ok(outcome) => RunResponse::Success {
                success: true,
                metadata: outcome.metadata,
                added: outcome.added,
                removed: outcome.removed,
                changed: outcome.changed,
            },
            Err(e) => RunResponse::Failure {
                success: false,
                error: e.to_string(),
            },
        }
    }
}

/// Runs one invocation for the source named in `request`.
pub async fn run(
    registry: &SourceRegistry,
    repo: &dyn Repository,
    notifier: &dyn Notifier,
    writes: &WritePolicy,
    request: &WatchRequest,
) -> Result<RunOutcome, EngineError> {
    let policy = registry
        .get(&request.source_id)
        .ok_or_else(|| EngineError::UnknownSource(request.source_id.clone()))?;

    info!(source_id = %request.source_id, "Starting watch invocation");

    let (meta, new) = policy.normalize(request)?;
    info!(
        source_id = %meta.source_id,
        records = new.len(),
        "Normalised new snapshot"
    );

    let old = policy.fetch_old(repo, &meta).await.map_err(|e| {
        error!(source_id = %meta.source_id, error = %e, "Failed to load old snapshot");
        EngineError::Storage(e)
    })?;

    let diff = policy.diff(&old, &new);
    info!(
        source_id = %meta.source_id,
        added = diff.added.len(),
        removed = diff.removed.len(),
        changed = diff.changed.len(),
        "Diff computed"
    );

    let report = render_report(&meta, &diff);
    let delivery = match request.routing_mode {
        RoutingMode::Direct => notifier.deliver(&report).await,
        RoutingMode::Pooled => notifier.pool(&report).await,
    };
    delivery.map_err(|e| {
        error!(source_id = %meta.source_id, error = %e, "Report delivery failed, aborting before reconcile");
        EngineError::NotificationDelivery(e)
    })?;

    let reconcile = policy
        .reconcile(repo, writes, &meta, &old, &new, &diff.removed)
        .await;

    info!(
        source_id = %meta.source_id,
        created = reconcile.created,
        updated = reconcile.updated,
        deleted = reconcile.deleted,
        failed = reconcile.failed,
        "Watch invocation complete"
    );

    Ok(RunOutcome {
        metadata: meta,
        added: diff.added,
        removed: diff.removed,
        changed: diff.changed,
        reconcile,
    })
}
