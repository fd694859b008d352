// crates/content-sources/src/memory.rs

use crate::{MetadataChanges, MetadataSource, SourceError, SourceResult};
use async_trait::async_trait;
use bookshelf_core::{BookId, RawBookRecord, RawTimestamp};
use bookshelf_network::{Download, NetworkError};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

const SOURCE_NAME: &str = "memory";

#[derive(Default)]
struct MemoryState {
    records: BTreeMap<i64, RawBookRecord>,
    covers: HashMap<i64, Download>,
    files: HashMap<i64, Download>,
    fetch_calls: Vec<(i64, i64)>,
    fail_fetch_on_call: Option<usize>,
    fail_listing: bool,
}

/// A metadata source held in memory
///
/// Records are keyed by the id they are listed under, which lets a record carry an
/// arbitrary (even malformed) id token. Fetch and listing failures can be scripted.
#[derive(Default)]
pub struct MemorySource {
    state: RwLock<MemoryState>,
}

impl MemorySource {
    /// An empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// A source holding `records`, each listed under its own id
    ///
    /// Records whose id is not an integer are dropped; use [`MemorySource::insert_at`]
    /// to list those.
    pub fn with_records(records: impl IntoIterator<Item = RawBookRecord>) -> Self {
        let mut state = MemoryState::default();
        for record in records {
            match record.id.trim().parse::<i64>() {
                Ok(key) => {
                    state.records.insert(key, record);
                }
                Err(_) => log::warn!("Dropping record with non-integer id {:?}", record.id),
            }
        }
        Self {
            state: RwLock::new(state),
        }
    }

    /// A source holding `count` minimal records with ids `1..=count`
    pub fn with_sequential(count: i64) -> Self {
        Self::with_records(
            (1..=count).map(|id| RawBookRecord::new(id.to_string()).with_title(format!("Book {}", id))),
        )
    }

    /// Lists `record` under `key` regardless of its own id
    pub async fn insert_at(&self, key: i64, record: RawBookRecord) {
        self.state.write().await.records.insert(key, record);
    }

    /// Replaces the stored record listed under the record's own id
    pub async fn upsert(&self, record: RawBookRecord) -> SourceResult<()> {
        let key = record
            .id
            .trim()
            .parse::<i64>()
            .map_err(|_| SourceError::invalid(SOURCE_NAME, format!("id {:?} is not an integer", record.id)))?;
        self.insert_at(key, record).await;
        Ok(())
    }

    /// Makes the `call`-th fetch (counting from 1) fail as if the source were down
    pub async fn fail_fetch_on_call(&self, call: usize) {
        self.state.write().await.fail_fetch_on_call = Some(call);
    }

    /// Makes listing fail as if the source were down
    pub async fn fail_listing(&self, fail: bool) {
        self.state.write().await.fail_listing = fail;
    }

    /// Every `(min, max)` range fetched so far
    pub async fn fetch_calls(&self) -> Vec<(i64, i64)> {
        self.state.read().await.fetch_calls.clone()
    }

    /// Stores a cover image for `id`
    pub async fn set_cover(&self, id: BookId, cover: Download) {
        self.state.write().await.covers.insert(id.get(), cover);
    }

    /// Stores an EPUB file for `id`
    pub async fn set_book_file(&self, id: BookId, file: Download) {
        self.state.write().await.files.insert(id.get(), file);
    }

    /// The record listed under `id`, if any
    pub async fn record(&self, id: i64) -> Option<RawBookRecord> {
        self.state.read().await.records.get(&id).cloned()
    }

    fn unavailable() -> SourceError {
        SourceError::network(SOURCE_NAME, NetworkError::Timeout)
    }
}

fn apply_changes(record: &mut RawBookRecord, changes: &MetadataChanges) {
    let fields = changes.to_fields();
    let text = |key: &str| fields.get(key).and_then(|v| v.as_str()).map(str::to_string);

    if let Some(title) = text("title") {
        record.title = Some(title);
    }
    if let Some(publisher) = text("publisher") {
        record.publisher = Some(publisher);
    }
    if let Some(comments) = text("comments") {
        record.comments = Some(comments);
    }
    if let Some(pubdate) = text("pubdate") {
        record.pubdate = Some(RawTimestamp::Text(pubdate));
    }
    if let Some(authors) = fields.get("authors").and_then(|v| v.as_array()) {
        record.authors = Some(
            authors
                .iter()
                .filter_map(|a| a.as_str().map(str::to_string))
                .collect(),
        );
    }
    if let Some(isbn) = fields
        .get("identifiers")
        .and_then(|ids| ids.get("isbn"))
        .and_then(|v| v.as_str())
    {
        record
            .identifiers
            .get_or_insert_with(HashMap::new)
            .insert("isbn".to_string(), isbn.to_string());
        record.isbn = Some(isbn.to_string());
    }
}

#[async_trait]
impl MetadataSource for MemorySource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn list_all_identifiers(&self) -> SourceResult<Vec<i64>> {
        let state = self.state.read().await;
        if state.fail_listing {
            return Err(Self::unavailable());
        }
        Ok(state.records.keys().copied().collect())
    }

    async fn fetch_metadata(&self, min: i64, max: i64) -> SourceResult<Vec<RawBookRecord>> {
        let mut state = self.state.write().await;
        state.fetch_calls.push((min, max));
        if state.fail_fetch_on_call == Some(state.fetch_calls.len()) {
            return Err(Self::unavailable());
        }
        if min > max {
            return Ok(Vec::new());
        }
        Ok(state.records.range(min..=max).map(|(_, r)| r.clone()).collect())
    }

    async fn update_metadata(
        &self,
        id: BookId,
        changes: &MetadataChanges,
    ) -> SourceResult<RawBookRecord> {
        let mut state = self.state.write().await;
        let record = state
            .records
            .get_mut(&id.get())
            .ok_or(SourceError::NotFound { id: id.get() })?;
        apply_changes(record, changes);
        Ok(record.clone())
    }

    async fn delete_books(&self, ids: &[BookId]) -> SourceResult<()> {
        let mut state = self.state.write().await;
        if let Some(missing) = ids.iter().find(|id| !state.records.contains_key(&id.get())) {
            return Err(SourceError::NotFound { id: missing.get() });
        }
        for id in ids {
            state.records.remove(&id.get());
        }
        Ok(())
    }

    async fn fetch_cover(&self, id: BookId) -> SourceResult<Download> {
        self.state
            .read()
            .await
            .covers
            .get(&id.get())
            .cloned()
            .ok_or(SourceError::NotFound { id: id.get() })
    }

    async fn fetch_book_file(&self, id: BookId) -> SourceResult<Download> {
        self.state
            .read()
            .await
            .files
            .get(&id.get())
            .cloned()
            .ok_or(SourceError::NotFound { id: id.get() })
    }
}
