//! The per-source policy contract.
//!
//! One trait, four operations: normalise, fetch the old snapshot, diff,
//! reconcile. `fetch_old`, `diff` and `reconcile` have default
//! implementations driven by the declared schema, so a concrete source type
//! usually supplies only its id, its schema and its normaliser. New source
//! types are added by implementing this trait, never by branching inside
//! the engine.

use async_trait::async_trait;

use crate::dispatch::WatchRequest;
use crate::error::{EngineError, StorageError};
use crate::reconcile::{self, ReconcileReport, WritePolicy};
use crate::record::{CanonicalRecord, DiffResult, PersistedRecord, SourceMeta};
use crate::repository::{fetch_snapshot, Repository};
use crate::schema::SourceSchema;

#[async_trait]
pub trait SourcePolicy: Send + Sync {
    /// Stable identifier used for registry lookup.
    fn source_id(&self) -> &'static str;

    fn schema(&self) -> &'static SourceSchema;

    /// Parses the raw payload into metadata plus the new snapshot.
    ///
    /// Drops malformed individual entries, collapses duplicate keys
    /// last-write-wins and fails with [`EngineError::MalformedPayload`] when
    /// the payload wrapper does not match the source's expected structure.
    fn normalize(
        &self,
        request: &WatchRequest,
    ) -> Result<(SourceMeta, Vec<CanonicalRecord>), EngineError>;

    /// Full paginated scan of the previously persisted snapshot.
    async fn fetch_old(
        &self,
        repo: &dyn Repository,
        meta: &SourceMeta,
    ) -> Result<Vec<PersistedRecord>, StorageError> {
        fetch_snapshot(repo, &meta.collection_id, self.schema()).await
    }

    fn diff(&self, old: &[PersistedRecord], new: &[CanonicalRecord]) -> DiffResult {
        crate::diff::diff(self.schema(), old, new)
    }

    async fn reconcile(
        &self,
        repo: &dyn Repository,
        policy: &WritePolicy,
        meta: &SourceMeta,
        old: &[PersistedRecord],
        new: &[CanonicalRecord],
        removed: &[PersistedRecord],
    ) -> ReconcileReport {
        reconcile::reconcile(
            repo,
            policy,
            self.schema(),
            &meta.collection_id,
            old,
            new,
            removed,
        )
        .await
    }
}
