// crates/search-engine/src/memory.rs
//! In-process search engine
//!
//! Index names point at generations; the name map is only rewritten when an index is
//! created or two indexes are swapped, both under the same write lock. Writes apply
//! immediately and their tasks report a scripted outcome (succeeded by default).

use crate::error::Operation;
use crate::types::effective_batch_size;
use crate::{
    IndexSchema, IndexStats, SearchEngine, SearchError, SearchQuery, SearchResponse,
    SearchResult, TaskHandle, TaskState, TaskStatus,
};
use async_trait::async_trait;
use bookshelf_core::{BookDocument, BookId};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::RwLock;

/// One write call seen by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteCall {
    pub index: String,
    pub documents: usize,
    pub tasks: usize,
}

#[derive(Debug, Default)]
struct Generation {
    documents: BTreeMap<i64, BookDocument>,
    schema: Option<IndexSchema>,
}

#[derive(Default)]
struct EngineState {
    names: HashMap<String, u64>,
    generations: HashMap<u64, Generation>,
    next_generation: u64,
    tasks: BTreeMap<u64, TaskStatus>,
    write_outcome: Option<TaskState>,
    swap_outcome: Option<TaskState>,
    busy_polls: usize,
    failing: HashSet<Operation>,
    write_calls: Vec<WriteCall>,
}

impl EngineState {
    fn enqueue(&mut self, index: &str, state: TaskState, error: Option<String>) -> TaskHandle {
        let handle = TaskHandle::new(self.tasks.len() as u64);
        self.tasks.insert(
            handle.uid(),
            TaskStatus {
                handle,
                index: Some(index.to_string()),
                state,
                error,
            },
        );
        handle
    }

    fn check(&self, operation: Operation, index: &str) -> SearchResult<()> {
        if self.failing.contains(&operation) {
            return Err(SearchError::Rejected {
                operation,
                index: index.to_string(),
                reason: "injected failure".to_string(),
            });
        }
        Ok(())
    }

    fn generation(&self, index: &str) -> SearchResult<&Generation> {
        self.names
            .get(index)
            .and_then(|id| self.generations.get(id))
            .ok_or_else(|| SearchError::IndexNotFound {
                index: index.to_string(),
            })
    }

    fn generation_mut(&mut self, index: &str) -> SearchResult<&mut Generation> {
        let id = *self.names.get(index).ok_or_else(|| SearchError::IndexNotFound {
            index: index.to_string(),
        })?;
        self.generations
            .get_mut(&id)
            .ok_or_else(|| SearchError::IndexNotFound {
                index: index.to_string(),
            })
    }
}

/// A search engine held in memory
#[derive(Default)]
pub struct MemorySearchEngine {
    state: RwLock<EngineState>,
}

impl MemorySearchEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later document write report `state` instead of succeeding
    ///
    /// Writes whose task does not succeed leave the index unchanged.
    pub async fn script_write_outcome(&self, state: TaskState) {
        self.state.write().await.write_outcome = Some(state);
    }

    /// Makes later swap tasks report `state`
    ///
    /// The swap itself is still applied, like an engine whose task log lags.
    pub async fn script_swap_outcome(&self, state: TaskState) {
        self.state.write().await.swap_outcome = Some(state);
    }

    /// Makes the next `polls` status queries report every task as processing
    pub async fn report_busy_for(&self, polls: usize) {
        self.state.write().await.busy_polls = polls;
    }

    /// Makes every call of `operation` fail until [`MemorySearchEngine::recover`]
    pub async fn fail_operation(&self, operation: Operation) {
        self.state.write().await.failing.insert(operation);
    }

    pub async fn recover(&self, operation: Operation) {
        self.state.write().await.failing.remove(&operation);
    }

    /// Ids stored in `index`, ascending; `None` when the index does not exist
    pub async fn document_ids(&self, index: &str) -> Option<Vec<i64>> {
        let state = self.state.read().await;
        state
            .generation(index)
            .ok()
            .map(|g| g.documents.keys().copied().collect())
    }

    /// Generation the name currently resolves to
    pub async fn generation_of(&self, index: &str) -> Option<u64> {
        self.state.read().await.names.get(index).copied()
    }

    /// Every document write seen so far
    pub async fn write_calls(&self) -> Vec<WriteCall> {
        self.state.read().await.write_calls.clone()
    }

    /// Number of tasks enqueued so far
    pub async fn task_count(&self) -> usize {
        self.state.read().await.tasks.len()
    }
}

fn text_matches(document: &BookDocument, schema: Option<&IndexSchema>, terms: &[String]) -> bool {
    if terms.is_empty() {
        return true;
    }
    let searchable = schema
        .map(|s| s.searchable.clone())
        .unwrap_or_else(|| IndexSchema::library().searchable);

    let mut haystack = String::new();
    for attribute in &searchable {
        match attribute.as_str() {
            "title" => haystack.push_str(&document.title),
            "authors" => haystack.push_str(&document.authors.join(" ")),
            "isbn" => haystack.push_str(&document.isbn),
            "publisher" => haystack.push_str(&document.publisher),
            "tags" => haystack.push_str(&document.tags.join(" ")),
            "comments" => haystack.push_str(&document.comments),
            _ => {}
        }
        haystack.push(' ');
    }
    let haystack = haystack.to_lowercase();
    terms.iter().all(|term| haystack.contains(term.as_str()))
}

/// One `attribute = value` clause
struct Clause {
    attribute: String,
    value: String,
}

fn parse_filter(filter: &str, schema: Option<&IndexSchema>) -> SearchResult<Vec<Clause>> {
    let mut clauses = Vec::new();
    for part in filter.split(" AND ") {
        let (attribute, value) = part.split_once('=').ok_or_else(|| SearchError::InvalidQuery {
            reason: format!("unsupported filter expression '{}'", part.trim()),
        })?;
        let attribute = attribute.trim().to_string();
        if let Some(schema) = schema {
            if !schema.is_filterable(&attribute) {
                return Err(SearchError::InvalidQuery {
                    reason: format!("attribute '{}' is not filterable", attribute),
                });
            }
        }
        let value = value.trim().trim_matches(|c: char| c == '"' || c == '\'').to_string();
        clauses.push(Clause { attribute, value });
    }
    Ok(clauses)
}

impl Clause {
    fn matches(&self, document: &BookDocument) -> SearchResult<bool> {
        let eq = |text: &str| text.eq_ignore_ascii_case(&self.value);
        let any = |list: &[String]| list.iter().any(|item| eq(item));
        Ok(match self.attribute.as_str() {
            "id" => document.id.to_string() == self.value,
            "authors" => any(&document.authors),
            "tags" => any(&document.tags),
            "languages" => any(&document.languages),
            "publisher" => eq(&document.publisher),
            "isbn" => eq(&document.isbn),
            "file_url" => document.file_url == self.value,
            other => {
                return Err(SearchError::InvalidQuery {
                    reason: format!("filtering on '{}' is not supported", other),
                })
            }
        })
    }
}

type Comparator = fn(&BookDocument, &BookDocument) -> Ordering;

fn comparator(rule: &str, schema: Option<&IndexSchema>) -> SearchResult<(Comparator, bool)> {
    let (attribute, direction) = rule.split_once(':').unwrap_or((rule, "asc"));
    let descending = match direction {
        "asc" => false,
        "desc" => true,
        other => {
            return Err(SearchError::InvalidQuery {
                reason: format!("unknown sort direction '{}'", other),
            })
        }
    };
    if let Some(schema) = schema {
        if !schema.is_sortable(attribute) {
            return Err(SearchError::InvalidQuery {
                reason: format!("attribute '{}' is not sortable", attribute),
            });
        }
    }
    let compare: Comparator = match attribute {
        "id" => |a, b| a.id.cmp(&b.id),
        "author_sort" => |a, b| a.author_sort.cmp(&b.author_sort),
        "publisher" => |a, b| a.publisher.cmp(&b.publisher),
        "pubdate" => |a, b| a.pubdate.cmp(&b.pubdate),
        "last_modified" => |a, b| a.last_modified.cmp(&b.last_modified),
        "title" => |a, b| a.title.cmp(&b.title),
        other => {
            return Err(SearchError::InvalidQuery {
                reason: format!("sorting on '{}' is not supported", other),
            })
        }
    };
    Ok((compare, descending))
}

#[async_trait]
impl SearchEngine for MemorySearchEngine {
    fn name(&self) -> &str {
        "memory"
    }

    async fn ensure_index(&self, index: &str, schema: &IndexSchema) -> SearchResult<Vec<TaskHandle>> {
        let mut state = self.state.write().await;
        state.check(Operation::EnsureIndex, index)?;

        if let Ok(generation) = state.generation_mut(index) {
            if generation.schema.as_ref() == Some(schema) {
                return Ok(Vec::new());
            }
            generation.schema = Some(schema.clone());
            return Ok(vec![state.enqueue(index, TaskState::Succeeded, None)]);
        }

        let id = state.next_generation;
        state.next_generation += 1;
        state.generations.insert(
            id,
            Generation {
                documents: BTreeMap::new(),
                schema: Some(schema.clone()),
            },
        );
        state.names.insert(index.to_string(), id);
        log::info!("Created in-memory index '{}'", index);
        Ok(vec![state.enqueue(index, TaskState::Succeeded, None)])
    }

    async fn delete_all_documents(&self, index: &str) -> SearchResult<TaskHandle> {
        let mut state = self.state.write().await;
        state.check(Operation::DeleteAll, index)?;
        state.generation_mut(index)?.documents.clear();
        Ok(state.enqueue(index, TaskState::Succeeded, None))
    }

    async fn write_documents_batch(
        &self,
        index: &str,
        documents: &[BookDocument],
        batch_size: usize,
    ) -> SearchResult<Vec<TaskHandle>> {
        let mut state = self.state.write().await;
        state.check(Operation::Write, index)?;
        state.generation(index)?;

        let outcome = state.write_outcome.unwrap_or(TaskState::Succeeded);
        let size = effective_batch_size(batch_size, documents.len());
        let mut tasks = Vec::new();

        for chunk in documents.chunks(size) {
            if outcome.is_success() {
                let generation = state.generation_mut(index)?;
                for document in chunk {
                    generation.documents.insert(document.id, document.clone());
                }
            }
            let error = (outcome == TaskState::Failed).then(|| "scripted task failure".to_string());
            tasks.push(state.enqueue(index, outcome, error));
        }

        state.write_calls.push(WriteCall {
            index: index.to_string(),
            documents: documents.len(),
            tasks: tasks.len(),
        });
        Ok(tasks)
    }

    async fn get_task_statuses(&self, handles: &[TaskHandle]) -> SearchResult<Vec<TaskStatus>> {
        let mut state = self.state.write().await;
        state.check(Operation::TaskStatus, "*")?;
        let busy = state.busy_polls > 0;
        state.busy_polls = state.busy_polls.saturating_sub(1);
        handles
            .iter()
            .map(|handle| -> SearchResult<TaskStatus> {
                let mut status = state
                    .tasks
                    .get(&handle.uid())
                    .cloned()
                    .ok_or(SearchError::UnknownTask { uid: handle.uid() })?;
                if busy {
                    status.state = TaskState::Processing;
                    status.error = None;
                }
                Ok(status)
            })
            .collect()
    }

    async fn swap_indexes(&self, first: &str, second: &str) -> SearchResult<TaskHandle> {
        let mut state = self.state.write().await;
        if state.failing.contains(&Operation::Swap) {
            return Err(SearchError::SwapRejected {
                first: first.to_string(),
                second: second.to_string(),
                reason: "injected failure".to_string(),
            });
        }

        let a = *state.names.get(first).ok_or_else(|| SearchError::IndexNotFound {
            index: first.to_string(),
        })?;
        let b = *state.names.get(second).ok_or_else(|| SearchError::IndexNotFound {
            index: second.to_string(),
        })?;
        state.names.insert(first.to_string(), b);
        state.names.insert(second.to_string(), a);

        log::info!("Swapped in-memory indexes '{}' and '{}'", first, second);
        let outcome = state.swap_outcome.unwrap_or(TaskState::Succeeded);
        Ok(state.enqueue(first, outcome, None))
    }

    async fn query(&self, index: &str, query: &SearchQuery) -> SearchResult<SearchResponse> {
        let state = self.state.read().await;
        state.check(Operation::Query, index)?;
        let generation = state.generation(index)?;
        let schema = generation.schema.as_ref();

        let terms: Vec<String> = query.q.split_whitespace().map(str::to_lowercase).collect();
        let clauses = match &query.filter {
            Some(filter) => parse_filter(filter, schema)?,
            None => Vec::new(),
        };
        let rules = query
            .sort
            .iter()
            .map(|rule| comparator(rule, schema))
            .collect::<SearchResult<Vec<_>>>()?;

        let mut matched = Vec::new();
        for document in generation.documents.values() {
            if !text_matches(document, schema, &terms) {
                continue;
            }
            let mut keep = true;
            for clause in &clauses {
                if !clause.matches(document)? {
                    keep = false;
                    break;
                }
            }
            if keep {
                matched.push(document);
            }
        }

        matched.sort_by(|a, b| {
            rules
                .iter()
                .map(|(compare, descending)| {
                    let ordering = compare(*a, *b);
                    if *descending {
                        ordering.reverse()
                    } else {
                        ordering
                    }
                })
                .find(|ordering| ordering.is_ne())
                .unwrap_or(Ordering::Equal)
        });

        let total = matched.len();
        let hits = matched
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .cloned()
            .collect();

        Ok(SearchResponse {
            hits,
            estimated_total_hits: total as u64,
            offset: query.offset,
            limit: query.limit,
            processing_time_ms: 0,
            query: query.q.clone(),
        })
    }

    async fn get_document(&self, index: &str, id: BookId) -> SearchResult<Option<BookDocument>> {
        let state = self.state.read().await;
        state.check(Operation::GetDocument, index)?;
        Ok(state.generation(index)?.documents.get(&id.get()).cloned())
    }

    async fn upsert_documents(&self, index: &str, documents: &[BookDocument]) -> SearchResult<TaskHandle> {
        let mut state = self.state.write().await;
        state.check(Operation::Write, index)?;
        let generation = state.generation_mut(index)?;
        for document in documents {
            generation.documents.insert(document.id, document.clone());
        }
        Ok(state.enqueue(index, TaskState::Succeeded, None))
    }

    async fn delete_documents(&self, index: &str, ids: &[BookId]) -> SearchResult<TaskHandle> {
        let mut state = self.state.write().await;
        state.check(Operation::DeleteDocuments, index)?;
        let generation = state.generation_mut(index)?;
        for id in ids {
            generation.documents.remove(&id.get());
        }
        Ok(state.enqueue(index, TaskState::Succeeded, None))
    }

    async fn index_stats(&self, index: &str) -> SearchResult<IndexStats> {
        let state = self.state.read().await;
        state.check(Operation::Stats, index)?;
        Ok(IndexStats {
            number_of_documents: state.generation(index)?.documents.len() as u64,
            is_indexing: false,
        })
    }
}
