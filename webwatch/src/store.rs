#![doc = "Document store client: bridges the core Repository trait to an Appwrite-style documents REST API."]
//
//! # Store Integration (CLI <-> Core)
//!
//! This module implements [`webwatch_core::repository::Repository`] against
//! a remote document database. All transport, serialization and error-code
//! mapping are encapsulated here; the engine only ever sees rows and
//! [`StorageError`] values.
//!
//! ## Client Usage
//!
//! - Construct [`DocumentStore`] from the config's storage section plus the
//!   `APPWRITE_API_KEY` environment variable.
//! - Status codes are preserved on [`StorageError`] so the core retry layer
//!   can classify failures as transient or permanent.

use std::collections::BTreeMap;
use std::env;

use async_trait::async_trait;
use serde_json::{json, Value};

use webwatch_core::error::StorageError;
use webwatch_core::record::FieldValue;
use webwatch_core::repository::{Repository, Row};

use crate::load_config::StorageSection;

pub struct DocumentStore {
    http: reqwest::Client,
    endpoint: String,
    project_id: String,
    database_id: String,
    api_key: String,
}

impl DocumentStore {
    /// Builds the client from config coordinates plus the API key from env.
    pub fn new_from_env(storage: &StorageSection) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let api_key = match env::var("APPWRITE_API_KEY") {
            Ok(key) => key,
            Err(e) => {
                tracing::error!(error = ?e, "APPWRITE_API_KEY missing in environment");
                return Err(anyhow::anyhow!("APPWRITE_API_KEY missing in environment"));
            }
        };
        tracing::info!(
            endpoint = %storage.endpoint,
            project_id = %storage.project_id,
            database_id = %storage.database_id,
            "Initialized DocumentStore from config and environment"
        );
        Ok(DocumentStore {
            http: reqwest::Client::new(),
            endpoint: storage.endpoint.trim_end_matches('/').to_string(),
            project_id: storage.project_id.clone(),
            database_id: storage.database_id.clone(),
            api_key,
        })
    }

    fn documents_url(&self, collection: &str) -> String {
        format!(
            "{}/databases/{}/collections/{}/documents",
            self.endpoint, self.database_id, collection
        )
    }

    fn document_url(&self, collection: &str, id: &str) -> String {
        format!("{}/{}", self.documents_url(collection), id)
    }

    fn with_headers(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("X-Appwrite-Project", &self.project_id)
            .header("X-Appwrite-Key", &self.api_key)
    }

    async fn read_body(
        response: reqwest::Response,
        context: &str,
    ) -> Result<Value, StorageError> {
        let status = response.status();
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<failed to decode response body>"));
        if !status.is_success() {
            tracing::error!(status = %status, context, body = %text, "Document API returned error");
            return Err(
                StorageError::with_code(format!("{context} failed"), status.as_u16())
                    .with_raw(text),
            );
        }
        serde_json::from_str(&text).map_err(|e| {
            StorageError::new(format!("{context}: invalid response JSON: {e}")).with_raw(text)
        })
    }
}

fn send_error(context: &str, e: reqwest::Error) -> StorageError {
    tracing::error!(error = ?e, context, "Document API request failed");
    StorageError {
        message: format!("{context}: {e}"),
        code: e.status().map(|s| s.as_u16()),
        raw: None,
    }
}

/// Maps a document JSON object to a row: `$id` plus every non-system field.
/// String values become scalars, string arrays become lists; anything else
/// is not part of the canonical model and is skipped.
fn document_to_row(document: &Value) -> Option<Row> {
    let object = document.as_object()?;
    let id = object.get("$id")?.as_str()?.to_string();
    let mut fields = BTreeMap::new();
    for (name, value) in object {
        if name.starts_with('$') {
            continue;
        }
        match value {
            Value::String(s) => {
                fields.insert(name.clone(), FieldValue::text(s.clone()));
            }
            Value::Array(items) => {
                let list: Vec<String> = items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect();
                fields.insert(name.clone(), FieldValue::TextList(list));
            }
            _ => {}
        }
    }
    Some(Row { id, fields })
}

fn fields_to_json(fields: &BTreeMap<String, FieldValue>) -> Value {
    let mut data = serde_json::Map::new();
    for (name, value) in fields {
        match value {
            FieldValue::Text(s) => {
                data.insert(name.clone(), Value::String(s.clone()));
            }
            FieldValue::TextList(items) => {
                data.insert(
                    name.clone(),
                    Value::Array(items.iter().cloned().map(Value::String).collect()),
                );
            }
        }
    }
    Value::Object(data)
}

#[async_trait]
impl Repository for DocumentStore {
    async fn list(
        &self,
        collection: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Row>, StorageError> {
        tracing::debug!(collection, limit, offset, "Listing documents");
        let response = self
            .with_headers(self.http.get(self.documents_url(collection)))
            .query(&[
                ("queries[]", format!("limit({limit})")),
                ("queries[]", format!("offset({offset})")),
            ])
            .send()
            .await
            .map_err(|e| send_error("list documents", e))?;
        let body = Self::read_body(response, "list documents").await?;
        let documents = body
            .get("documents")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                StorageError::new("list documents: response has no `documents` array")
            })?;
        Ok(documents.iter().filter_map(document_to_row).collect())
    }

    async fn create(
        &self,
        collection: &str,
        fields: BTreeMap<String, FieldValue>,
    ) -> Result<Row, StorageError> {
        tracing::info!(collection, "Creating document");
        let body = json!({
            "documentId": uuid::Uuid::new_v4().to_string(),
            "data": fields_to_json(&fields),
        });
        let response = self
            .with_headers(self.http.post(self.documents_url(collection)))
            .json(&body)
            .send()
            .await
            .map_err(|e| send_error("create document", e))?;
        let body = Self::read_body(response, "create document").await?;
        document_to_row(&body).ok_or_else(|| {
            StorageError::new("create document: response is not a document object")
        })
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: BTreeMap<String, FieldValue>,
    ) -> Result<(), StorageError> {
        tracing::info!(collection, id, "Updating document");
        let body = json!({ "data": fields_to_json(&fields) });
        let response = self
            .with_headers(self.http.patch(self.document_url(collection, id)))
            .json(&body)
            .send()
            .await
            .map_err(|e| send_error("update document", e))?;
        Self::read_body(response, "update document").await.map(|_| ())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StorageError> {
        tracing::info!(collection, id, "Deleting document");
        let response = self
            .with_headers(self.http.delete(self.document_url(collection, id)))
            .send()
            .await
            .map_err(|e| send_error("delete document", e))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, collection, id, body = %text, "Delete failed");
            return Err(
                StorageError::with_code("delete document failed", status.as_u16()).with_raw(text),
            );
        }
        Ok(())
    }
}
