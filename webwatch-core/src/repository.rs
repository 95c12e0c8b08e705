//! Document store contract and the paginated old-snapshot reader.
//!
//! The [`Repository`] trait is the only interface the engine has to
//! persisted state. Implementors connect to a real document API (see the
//! CLI crate) or are generated as `mockall` mocks for tests.

use std::collections::BTreeMap;

use async_trait::async_trait;
use mockall::automock;
use tracing::{debug, info};

use crate::error::StorageError;
use crate::record::{FieldValue, PersistedRecord};
use crate::schema::SourceSchema;

/// Page size for the full scan of a collection.
pub const PAGE_SIZE: usize = 100;

/// One persisted row: opaque identifier plus named fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub id: String,
    pub fields: BTreeMap<String, FieldValue>,
}

/// Create/update/delete/list access to one document collection.
///
/// No retry lives at this layer; the reconciler wraps its writes in a
/// [`crate::retry::RetryPolicy`].
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Repository: Send + Sync {
    /// List up to `limit` rows starting at `offset`.
    async fn list(
        &self,
        collection: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Row>, StorageError>;

    /// Create a row; the store assigns and returns its identifier.
    async fn create(
        &self,
        collection: &str,
        fields: BTreeMap<String, FieldValue>,
    ) -> Result<Row, StorageError>;

    /// Replace the named fields of an existing row. The identifier never
    /// changes across updates.
    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: BTreeMap<String, FieldValue>,
    ) -> Result<(), StorageError>;

    /// Delete a row by identifier.
    async fn delete(&self, collection: &str, id: &str) -> Result<(), StorageError>;
}

/// Full paginated scan of a collection into the canonical shape.
///
/// Pages are fetched sequentially; the scan stops when a page comes back
/// shorter than [`PAGE_SIZE`]. Under concurrent writes during the scan this
/// can over- or under-read; accepted approximation, not a guaranteed-exact
/// snapshot. Absent canonical fields default to empty values so comparison
/// logic never sees nulls.
pub async fn fetch_snapshot(
    repo: &dyn Repository,
    collection: &str,
    schema: &SourceSchema,
) -> Result<Vec<PersistedRecord>, StorageError> {
    let mut records: Vec<PersistedRecord> = Vec::new();
    let mut offset = 0usize;
    loop {
        let page = repo.list(collection, PAGE_SIZE, offset).await?;
        let page_len = page.len();
        debug!(collection, offset, page_len, "Fetched snapshot page");
        for row in page {
            records.push(row_to_record(row, schema));
        }
        if page_len < PAGE_SIZE {
            break;
        }
        offset += PAGE_SIZE;
    }
    info!(collection, count = records.len(), "Loaded old snapshot");
    Ok(records)
}

fn row_to_record(row: Row, schema: &SourceSchema) -> PersistedRecord {
    let mut record = crate::record::CanonicalRecord::new();
    for field in schema.canonical_fields() {
        let value = row
            .fields
            .get(field)
            .cloned()
            .unwrap_or_else(|| schema.empty_value(field));
        record.set(field, value);
    }
    PersistedRecord::new(row.id, record)
}
