//! Reconciler: applies a new snapshot to the document store.
//!
//! Translates the diff outcome plus the full new snapshot into a minimal
//! sequence of delete/update/create calls, with retry-with-backoff on
//! transient failures and a throttle pause between batches of writes.
//! Per-item failures are logged and swallowed; the batch always runs to
//! completion.

use std::collections::BTreeMap;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::record::{dedup_last_wins, CanonicalRecord, PersistedRecord};
use crate::repository::Repository;
use crate::retry::RetryPolicy;
use crate::schema::SourceSchema;

/// Write pacing: retry policy plus the throttle applied between batches.
#[derive(Debug, Clone)]
pub struct WritePolicy {
    pub retry: RetryPolicy,
    /// Pause after every `throttle_every` write operations.
    pub throttle_every: usize,
    pub throttle_pause: Duration,
}

impl Default for WritePolicy {
    fn default() -> Self {
        WritePolicy {
            retry: RetryPolicy::default(),
            throttle_every: 10,
            throttle_pause: Duration::from_millis(1000),
        }
    }
}

impl WritePolicy {
    /// No sleeping anywhere, for tests.
    pub fn no_delay() -> Self {
        WritePolicy {
            retry: RetryPolicy::no_delay(),
            throttle_every: 10,
            throttle_pause: Duration::ZERO,
        }
    }
}

/// Counts of applied and failed write operations for one invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub failed: usize,
}

/// Brings the collection in line with `new`.
///
/// Deletes every `removed` record by its persisted identifier, then writes
/// the deduplicated new snapshot: update where the key resolves to an
/// existing identifier, create otherwise. At-least-once per item; re-running
/// with the same snapshot converges to the same field values.
pub async fn reconcile(
    repo: &dyn Repository,
    policy: &WritePolicy,
    schema: &SourceSchema,
    collection: &str,
    old: &[PersistedRecord],
    new: &[CanonicalRecord],
    removed: &[PersistedRecord],
) -> ReconcileReport {
    let mut id_by_key: BTreeMap<&str, &str> = BTreeMap::new();
    for record in old {
        if let Some(key) = record.key(schema.key_field) {
            id_by_key.insert(key, record.id.as_str());
        }
    }

    let mut report = ReconcileReport::default();
    let mut ops = 0usize;

    for record in removed {
        if record.id.is_empty() {
            // Never persisted, nothing to delete.
            continue;
        }
        let result = policy
            .retry
            .run("delete", || {
                let id = record.id.clone();
                async move { repo.delete(collection, &id).await }
            })
            .await;
        match result {
            Ok(()) => {
                info!(collection, id = %record.id, "Deleted removed record");
                report.deleted += 1;
            }
            Err(e) => {
                // Tolerated: the row may already be gone.
                warn!(
                    collection,
                    id = %record.id,
                    code = ?e.code,
                    error = %e,
                    "Delete failed, continuing"
                );
                report.failed += 1;
            }
        }
        ops += 1;
        throttle(policy, ops).await;
    }

    // The normaliser already guarantees key uniqueness; collapse again here
    // so a buggy policy cannot double-write a key.
    let deduped = dedup_last_wins(new.to_vec(), schema.key_field);

    for record in &deduped {
        let key = match record.key(schema.key_field) {
            Some(k) => k.to_string(),
            None => continue,
        };
        let fields = record.clone().into_fields();
        let result = match id_by_key.get(key.as_str()) {
            Some(id) => {
                let id = id.to_string();
                let outcome = policy
                    .retry
                    .run("update", || {
                        let id = id.clone();
                        let fields = fields.clone();
                        async move { repo.update(collection, &id, fields).await }
                    })
                    .await;
                match outcome {
                    Ok(()) => {
                        report.updated += 1;
                        Ok(())
                    }
                    Err(e) => Err(e),
                }
            }
            None => {
                let outcome = policy
                    .retry
                    .run("create", || {
                        let fields = fields.clone();
                        async move { repo.create(collection, fields).await }
                    })
                    .await;
                match outcome {
                    Ok(row) => {
                        info!(collection, key = %key, id = %row.id, "Created record");
                        report.created += 1;
                        Ok(())
                    }
                    Err(e) => Err(e),
                }
            }
        };
        if let Err(e) = result {
            error!(
                collection,
                key = %key,
                code = ?e.code,
                raw = ?e.raw,
                item = ?record,
                error = %e,
                "Write failed after retries, continuing with remaining items"
            );
            report.failed += 1;
        }
        ops += 1;
        throttle(policy, ops).await;
    }

    info!(
        collection,
        created = report.created,
        updated = report.updated,
        deleted = report.deleted,
        failed = report.failed,
        "Reconciliation finished"
    );
    report
}

async fn throttle(policy: &WritePolicy, ops: usize) {
    if policy.throttle_every > 0
        && ops % policy.throttle_every == 0
        && !policy.throttle_pause.is_zero()
    {
        tokio::time::sleep(policy.throttle_pause).await;
    }
}
