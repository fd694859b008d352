// crates/search-engine/src/meilisearch.rs
//! Meilisearch over its REST API

use crate::error::Operation;
use crate::types::effective_batch_size;
use crate::{
    IndexSchema, IndexStats, SearchEngine, SearchError, SearchQuery, SearchResponse,
    SearchResult, TaskHandle, TaskState, TaskStatus,
};
use async_trait::async_trait;
use bookshelf_core::{BookDocument, BookId};
use bookshelf_network::{Client, ClientConfig, NetworkError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeSet, HashMap};

/// Task uids asked for per status request
const TASK_QUERY_CHUNK: usize = 100;

/// A Meilisearch instance
#[derive(Clone)]
pub struct MeilisearchEngine {
    client: Client,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnqueuedTask {
    task_uid: u64,
}

impl From<EnqueuedTask> for TaskHandle {
    fn from(task: EnqueuedTask) -> Self {
        TaskHandle::new(task.task_uid)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexInfo {
    #[serde(default)]
    primary_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RemoteSettings {
    searchable_attributes: Vec<String>,
    // Newer engines may report objects with per-attribute features here
    filterable_attributes: Vec<Value>,
    sortable_attributes: Vec<String>,
    displayed_attributes: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SettingsUpdate<'a> {
    searchable_attributes: &'a [String],
    filterable_attributes: &'a [String],
    sortable_attributes: &'a [String],
    displayed_attributes: &'a [String],
}

impl<'a> From<&'a IndexSchema> for SettingsUpdate<'a> {
    fn from(schema: &'a IndexSchema) -> Self {
        Self {
            searchable_attributes: &schema.searchable,
            filterable_attributes: &schema.filterable,
            sortable_attributes: &schema.sortable,
            displayed_attributes: &schema.displayed,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TaskList {
    #[serde(default)]
    results: Vec<RemoteTask>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteTask {
    uid: u64,
    #[serde(default)]
    index_uid: Option<String>,
    status: TaskState,
    #[serde(default)]
    error: Option<RemoteTaskError>,
}

#[derive(Debug, Deserialize)]
struct RemoteTaskError {
    message: String,
}

fn as_set<'a>(items: impl IntoIterator<Item = &'a String>) -> BTreeSet<&'a str> {
    items.into_iter().map(String::as_str).collect()
}

impl RemoteSettings {
    fn matches(&self, schema: &IndexSchema) -> bool {
        let filterable: Option<BTreeSet<&str>> = self
            .filterable_attributes
            .iter()
            .map(Value::as_str)
            .collect();

        self.searchable_attributes == schema.searchable
            && filterable == Some(as_set(&schema.filterable))
            && as_set(&self.sortable_attributes) == as_set(&schema.sortable)
            && as_set(&self.displayed_attributes) == as_set(&schema.displayed)
    }
}

impl MeilisearchEngine {
    /// Connects to the engine at `host`, authenticating with `api_key` when given
    pub fn new(host: &str, api_key: Option<&str>) -> SearchResult<Self> {
        let config = ClientConfig {
            bearer_token: api_key.filter(|k| !k.is_empty()).map(str::to_string),
            ..ClientConfig::default()
        };
        let client = Client::with_config(host, config).map_err(|error| SearchError::Unavailable {
            operation: Operation::EnsureIndex,
            error,
        })?;
        Ok(Self::with_client(client))
    }

    /// Uses an existing client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// True when the engine answers its health endpoint
    pub async fn is_healthy(&self) -> bool {
        self.client.get_json::<Value>("health", &[]).await.is_ok()
    }

    async fn fetch_index(&self, index: &str) -> SearchResult<Option<IndexInfo>> {
        match self.client.get_json(&format!("indexes/{}", index), &[]).await {
            Ok(info) => Ok(Some(info)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(SearchError::from_network(Operation::EnsureIndex, index, e)),
        }
    }

    async fn apply_settings(&self, index: &str, schema: &IndexSchema) -> SearchResult<TaskHandle> {
        let task: EnqueuedTask = self
            .client
            .patch_json(
                &format!("indexes/{}/settings", index),
                &SettingsUpdate::from(schema),
            )
            .await
            .map_err(|e| SearchError::from_network(Operation::EnsureIndex, index, e))?;
        Ok(task.into())
    }

    fn reject(operation: Operation, index: &str) -> impl Fn(NetworkError) -> SearchError + '_ {
        move |e| SearchError::from_network(operation, index, e)
    }
}

#[async_trait]
impl SearchEngine for MeilisearchEngine {
    fn name(&self) -> &str {
        "meilisearch"
    }

    async fn ensure_index(&self, index: &str, schema: &IndexSchema) -> SearchResult<Vec<TaskHandle>> {
        let mut tasks = Vec::new();

        let Some(info) = self.fetch_index(index).await? else {
            let created: EnqueuedTask = self
                .client
                .post_json("indexes", &json!({ "uid": index, "primaryKey": schema.primary_key }))
                .await
                .map_err(Self::reject(Operation::EnsureIndex, index))?;
            tasks.push(created.into());
            tasks.push(self.apply_settings(index, schema).await?);
            log::info!("Created index '{}'", index);
            return Ok(tasks);
        };

        match info.primary_key.as_deref() {
            Some(key) if key == schema.primary_key => {}
            Some(key) => {
                return Err(SearchError::Rejected {
                    operation: Operation::EnsureIndex,
                    index: index.to_string(),
                    reason: format!(
                        "primary key is '{}', expected '{}'",
                        key, schema.primary_key
                    ),
                });
            }
            None => {
                let updated: EnqueuedTask = self
                    .client
                    .patch_json(
                        &format!("indexes/{}", index),
                        &json!({ "primaryKey": schema.primary_key }),
                    )
                    .await
                    .map_err(Self::reject(Operation::EnsureIndex, index))?;
                tasks.push(updated.into());
            }
        }

        let settings: RemoteSettings = self
            .client
            .get_json(&format!("indexes/{}/settings", index), &[])
            .await
            .map_err(Self::reject(Operation::EnsureIndex, index))?;
        if settings.matches(schema) {
            log::debug!("Index '{}' already configured", index);
        } else {
            tasks.push(self.apply_settings(index, schema).await?);
            log::info!("Reconfigured index '{}'", index);
        }

        Ok(tasks)
    }

    async fn delete_all_documents(&self, index: &str) -> SearchResult<TaskHandle> {
        let task: EnqueuedTask = self
            .client
            .delete_json(&format!("indexes/{}/documents", index))
            .await
            .map_err(Self::reject(Operation::DeleteAll, index))?;
        Ok(task.into())
    }

    async fn write_documents_batch(
        &self,
        index: &str,
        documents: &[BookDocument],
        batch_size: usize,
    ) -> SearchResult<Vec<TaskHandle>> {
        let size = effective_batch_size(batch_size, documents.len());
        let path = format!("indexes/{}/documents?primaryKey=id", index);
        let mut tasks = Vec::with_capacity(documents.len().div_ceil(size));

        for chunk in documents.chunks(size) {
            let task: EnqueuedTask = self
                .client
                .post_json(&path, chunk)
                .await
                .map_err(Self::reject(Operation::Write, index))?;
            log::debug!(
                "Enqueued {} documents for '{}' as task {}",
                chunk.len(),
                index,
                task.task_uid
            );
            tasks.push(task.into());
        }

        Ok(tasks)
    }

    async fn get_task_statuses(&self, handles: &[TaskHandle]) -> SearchResult<Vec<TaskStatus>> {
        let mut found: HashMap<u64, RemoteTask> = HashMap::with_capacity(handles.len());

        for chunk in handles.chunks(TASK_QUERY_CHUNK) {
            let uids = chunk
                .iter()
                .map(|h| h.uid().to_string())
                .collect::<Vec<_>>()
                .join(",");
            let query = [("uids", uids), ("limit", chunk.len().to_string())];
            let list: TaskList = self
                .client
                .get_json("tasks", &query)
                .await
                .map_err(Self::reject(Operation::TaskStatus, "*"))?;
            found.extend(list.results.into_iter().map(|task| (task.uid, task)));
        }

        handles
            .iter()
            .map(|handle| {
                let task = found
                    .remove(&handle.uid())
                    .ok_or(SearchError::UnknownTask { uid: handle.uid() })?;
                Ok(TaskStatus {
                    handle: *handle,
                    index: task.index_uid,
                    state: task.status,
                    error: task.error.map(|e| e.message),
                })
            })
            .collect()
    }

    async fn swap_indexes(&self, first: &str, second: &str) -> SearchResult<TaskHandle> {
        let body = json!([{ "indexes": [first, second] }]);
        let task: EnqueuedTask = self
            .client
            .post_json("swap-indexes", &body)
            .await
            .map_err(|e| match SearchError::from_network(Operation::Swap, first, e) {
                SearchError::Rejected { reason, .. } => SearchError::SwapRejected {
                    first: first.to_string(),
                    second: second.to_string(),
                    reason,
                },
                other => other,
            })?;
        log::info!("Swap of '{}' and '{}' enqueued as task {}", first, second, task.task_uid);
        Ok(task.into())
    }

    async fn query(&self, index: &str, query: &SearchQuery) -> SearchResult<SearchResponse> {
        self.client
            .post_query(&format!("indexes/{}/search", index), query)
            .await
            .map_err(Self::reject(Operation::Query, index))
    }

    async fn get_document(&self, index: &str, id: BookId) -> SearchResult<Option<BookDocument>> {
        let path = format!("indexes/{}/documents/{}", index, id);
        match self.client.get_json(&path, &[]).await {
            Ok(document) => Ok(Some(document)),
            Err(e) => {
                let not_found = e.is_not_found();
                match SearchError::from_network(Operation::GetDocument, index, e) {
                    SearchError::Rejected { .. } if not_found => Ok(None),
                    other => Err(other),
                }
            }
        }
    }

    async fn upsert_documents(&self, index: &str, documents: &[BookDocument]) -> SearchResult<TaskHandle> {
        let task: EnqueuedTask = self
            .client
            .put_json(
                &format!("indexes/{}/documents", index),
                &[("primaryKey", "id".to_string())],
                documents,
            )
            .await
            .map_err(Self::reject(Operation::Write, index))?;
        Ok(task.into())
    }

    async fn delete_documents(&self, index: &str, ids: &[BookId]) -> SearchResult<TaskHandle> {
        let task: EnqueuedTask = self
            .client
            .post_json(&format!("indexes/{}/documents/delete-batch", index), ids)
            .await
            .map_err(Self::reject(Operation::DeleteDocuments, index))?;
        Ok(task.into())
    }

    async fn index_stats(&self, index: &str) -> SearchResult<IndexStats> {
        self.client
            .get_json(&format!("indexes/{}/stats", index), &[])
            .await
            .map_err(Self::reject(Operation::Stats, index))
    }
}
