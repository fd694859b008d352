// crates/content-sources/src/content_server.rs

use crate::{MetadataChanges, MetadataSource, SourceError, SourceResult};
use async_trait::async_trait;
use bookshelf_core::{BookId, RawBookRecord};
use bookshelf_network::{Client, ClientConfig, Download, NetworkError};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::time::Duration;

const SOURCE_NAME: &str = "content_server";

/// Fields requested from the list command
const LIST_FIELDS: &[&str] = &[
    "id",
    "title",
    "authors",
    "author_sort",
    "comments",
    "size",
    "publisher",
    "pubdate",
    "last_modified",
    "series_index",
    "isbn",
    "tags",
    "rating",
    "identifiers",
    "languages",
];

/// A Calibre content server
pub struct ContentServerSource {
    client: Client,
    library: String,
}

impl ContentServerSource {
    /// Connects to the content server at `server` serving the library `library`
    pub fn new(server: &str, library: impl Into<String>) -> SourceResult<Self> {
        let config = ClientConfig {
            timeout: Duration::from_secs(120),
            ..ClientConfig::default()
        };
        let client = Client::with_config(server, config)
            .map_err(|e| SourceError::network(SOURCE_NAME, e))?;
        Ok(Self::with_client(client, library))
    }

    /// Uses an existing client
    pub fn with_client(client: Client, library: impl Into<String>) -> Self {
        let library = library.into();
        let library = if library.trim().is_empty() {
            "library".to_string()
        } else {
            library
        };
        Self { client, library }
    }

    /// Library id requests are made against
    pub fn library(&self) -> &str {
        &self.library
    }

    fn map_network(&self, id: Option<BookId>, error: NetworkError) -> SourceError {
        match id {
            Some(id) if error.is_not_found() => SourceError::NotFound { id: id.get() },
            _ => SourceError::network(SOURCE_NAME, error),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    book_ids: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    result: Option<ListResult>,
    #[serde(default)]
    err: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListResult {
    #[serde(default)]
    book_ids: Vec<Value>,
    #[serde(default)]
    data: HashMap<String, HashMap<String, Value>>,
}

/// Turns an id as sent by the server into the token records are keyed by
fn id_token(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(
            n.as_i64()
                .map(|i| i.to_string())
                .unwrap_or_else(|| n.to_string()),
        ),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

/// Rebuilds per-book records from the column-oriented list result
fn records_from_columns(result: ListResult) -> Vec<RawBookRecord> {
    let mut records = Vec::with_capacity(result.book_ids.len());

    for raw_id in &result.book_ids {
        let Some(token) = id_token(raw_id) else {
            log::warn!("Skipping book with unusable id {}", raw_id);
            continue;
        };

        let mut fields = Map::new();
        for (field, column) in &result.data {
            if field == "id" {
                continue;
            }
            if let Some(value) = column.get(&token) {
                fields.insert(field.clone(), value.clone());
            }
        }
        fields.insert("id".to_string(), Value::String(token.clone()));

        match serde_json::from_value::<RawBookRecord>(Value::Object(fields)) {
            Ok(record) => records.push(with_isbn_fallback(record)),
            Err(e) => log::warn!("Skipping book {}: undecodable metadata: {}", token, e),
        }
    }

    records
}

fn with_isbn_fallback(mut record: RawBookRecord) -> RawBookRecord {
    let blank = record.isbn.as_deref().map(str::trim).unwrap_or("").is_empty();
    if blank {
        record.isbn = record
            .identifiers
            .as_ref()
            .and_then(|ids| ids.get("isbn").cloned());
    }
    record
}

#[async_trait]
impl MetadataSource for ContentServerSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn list_all_identifiers(&self) -> SourceResult<Vec<i64>> {
        let path = format!("ajax/search/{}", self.library);
        let query = [
            ("num", "9999999".to_string()),
            ("offset", "0".to_string()),
            ("sort", "id".to_string()),
            ("sort_order", "asc".to_string()),
            ("query", String::new()),
        ];
        let response: SearchResponse = self
            .client
            .get_json(&path, &query)
            .await
            .map_err(|e| self.map_network(None, e))?;

        let mut ids: Vec<i64> = response
            .book_ids
            .iter()
            .filter_map(|value| {
                let id = value.as_i64();
                if id.is_none() {
                    log::warn!("Ignoring non-integer book id {}", value);
                }
                id
            })
            .collect();
        ids.sort_unstable();
        ids.dedup();

        log::debug!("Content server lists {} books", ids.len());
        Ok(ids)
    }

    async fn fetch_metadata(&self, min: i64, max: i64) -> SourceResult<Vec<RawBookRecord>> {
        if min > max {
            return Ok(Vec::new());
        }

        let body = json!([
            LIST_FIELDS,
            "id",
            "True",
            format!("id:>={} and id:<={}", min, max),
            -1
        ]);
        let response: ListResponse = self
            .client
            .post_query("cdb/cmd/list/0", &body)
            .await
            .map_err(|e| self.map_network(None, e))?;

        if let Some(err) = response.err.filter(|e| !e.is_empty()) {
            return Err(SourceError::invalid(SOURCE_NAME, err));
        }
        let result = response
            .result
            .ok_or_else(|| SourceError::invalid(SOURCE_NAME, "list response has no result"))?;

        let records = records_from_columns(result);
        log::debug!("Fetched {} records for ids {}..={}", records.len(), min, max);
        Ok(records)
    }

    async fn update_metadata(
        &self,
        id: BookId,
        changes: &MetadataChanges,
    ) -> SourceResult<RawBookRecord> {
        let path = format!("cdb/set-fields/{}/{}", id, self.library);
        let body = json!({ "changes": changes.to_fields() });

        let response: HashMap<String, RawBookRecord> = self
            .client
            .post_json(&path, &body)
            .await
            .map_err(|e| self.map_network(Some(id), e))?;

        let token = id.to_string();
        let (key, mut record) = response
            .into_iter()
            .find(|(key, _)| key == &token)
            .ok_or_else(|| {
                SourceError::invalid(SOURCE_NAME, format!("set-fields returned no entry for {}", id))
            })?;
        record.id = key;
        log::info!("Updated metadata of book {} at the content server", id);
        Ok(with_isbn_fallback(record))
    }

    async fn delete_books(&self, ids: &[BookId]) -> SourceResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let joined = ids
            .iter()
            .map(BookId::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let path = format!("cdb/delete-books/{}/{}", joined, self.library);

        let single = (ids.len() == 1).then(|| ids[0]);
        let _: Value = self
            .client
            .post_json(&path, &Value::Null)
            .await
            .map_err(|e| self.map_network(single, e))?;

        log::info!("Deleted books {} at the content server", joined);
        Ok(())
    }

    async fn fetch_cover(&self, id: BookId) -> SourceResult<Download> {
        let path = format!("get/cover/{}/{}", id, self.library);
        self.client
            .get_bytes(&path)
            .await
            .map_err(|e| self.map_network(Some(id), e))
    }

    async fn fetch_book_file(&self, id: BookId) -> SourceResult<Download> {
        let path = format!("get/EPUB/{}/{}", id, self.library);
        self.client
            .get_bytes(&path)
            .await
            .map_err(|e| self.map_network(Some(id), e))
    }
}
