// crates/server/src/handlers.rs
//! Request handlers for the `/api` surface

use crate::error::{ServerError, ServerResult};
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bookshelf_content_sources::{Download, MetadataChanges};
use bookshelf_core::{links, AppError, BookDocument, BookId};
use bookshelf_resilience::with_timeout;
use bookshelf_search_engine::{SearchQuery, SearchResponse};
use bookshelf_sync_engine::ControllerStatus;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const COVER_CONTENT_TYPE: &str = "image/jpeg";
const BOOK_FILE_CONTENT_TYPE: &str = "application/epub+zip";
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// `{code, message, data}` envelope used by the write endpoints
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub code: u16,
    pub message: String,
    pub data: T,
}

impl<T> Envelope<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: StatusCode::OK.as_u16(),
            message: "success".to_string(),
            data,
        }
    }
}

/// `sort` given either as one comma-separated string or as a list
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SortParam {
    List(Vec<String>),
    Text(String),
}

impl SortParam {
    fn into_rules(self) -> Vec<String> {
        let rules = match self {
            SortParam::List(rules) => rules,
            SortParam::Text(text) => text.split(',').map(str::to_string).collect(),
        };
        rules
            .into_iter()
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .collect()
    }
}

/// Parameters of `/api/search`, from the query string or a JSON body
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SearchParams {
    pub q: String,
    pub limit: Option<usize>,
    pub offset: usize,
    pub filter: Option<String>,
    pub sort: Option<SortParam>,
}

impl SearchParams {
    fn into_query(self, default_limit: usize) -> SearchQuery {
        let mut query = SearchQuery::new(self.q)
            .with_limit(self.limit.unwrap_or(default_limit))
            .with_offset(self.offset);
        if let Some(filter) = self.filter {
            query = query.with_filter(filter);
        }
        for rule in self.sort.map(SortParam::into_rules).unwrap_or_default() {
            query = query.with_sort(rule);
        }
        query
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PageParams {
    pub limit: Option<usize>,
    pub offset: usize,
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub index: String,
    pub documents: Option<u64>,
    pub is_indexing: Option<bool>,
    pub reindex: bookshelf_sync_engine::ReindexState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Response {
    let primary = state.catalog.primary_index().to_string();
    let reindex = state.controller.state();
    let stats = with_timeout(HEALTH_TIMEOUT, state.controller.engine().index_stats(&primary))
        .await
        .map_err(|e| e.to_string())
        .and_then(|result| result.map_err(|e| e.to_string()));
    match stats {
        Ok(stats) => Json(HealthReport {
            status: "ok",
            index: primary,
            documents: Some(stats.number_of_documents),
            is_indexing: Some(stats.is_indexing),
            reindex,
            reason: None,
        })
        .into_response(),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthReport {
                status: "unavailable",
                index: primary,
                documents: None,
                is_indexing: None,
                reindex,
                reason: Some(e),
            }),
        )
            .into_response(),
    }
}

pub async fn search_get(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> ServerResult<Json<SearchResponse>> {
    search(&state, params).await
}

pub async fn search_post(
    State(state): State<Arc<AppState>>,
    Json(params): Json<SearchParams>,
) -> ServerResult<Json<SearchResponse>> {
    search(&state, params).await
}

async fn search(state: &AppState, params: SearchParams) -> ServerResult<Json<SearchResponse>> {
    let query = params.into_query(state.config.default_search_limit);
    Ok(Json(state.catalog.search(query).await?))
}

pub async fn recently(
    State(state): State<Arc<AppState>>,
    Query(page): Query<PageParams>,
) -> ServerResult<Json<SearchResponse>> {
    let limit = page.limit.unwrap_or(state.config.default_recent_limit);
    Ok(Json(state.catalog.recent(limit, page.offset).await?))
}

pub async fn get_book(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ServerResult<Json<BookDocument>> {
    let id = BookId::parse(&id)?;
    Ok(Json(state.catalog.get_book(id).await?))
}

pub async fn update_book(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(changes): Json<MetadataChanges>,
) -> ServerResult<Json<Envelope<BookDocument>>> {
    let id = BookId::parse(&id)?;
    let document = state.catalog.update_book(id, &changes).await?;
    Ok(Json(Envelope::success(document)))
}

pub async fn delete_book(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ServerResult<Json<Envelope<i64>>> {
    let id = BookId::parse(&id)?;
    state.catalog.delete_book(id).await?;
    Ok(Json(Envelope::success(id.get())))
}

pub async fn cover(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ServerResult<Response> {
    let id = links::parse_cover_name(&name).ok_or(ServerError::UnknownFile { name })?;
    let download = state.catalog.cover(id).await?;
    Ok(file_response(download, COVER_CONTENT_TYPE))
}

pub async fn book_file(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ServerResult<Response> {
    let id = links::parse_book_file_name(&name).ok_or(ServerError::UnknownFile { name })?;
    let download = state.catalog.book_file(id).await?;
    Ok(file_response(download, BOOK_FILE_CONTENT_TYPE))
}

fn file_response(download: Download, fallback: &'static str) -> Response {
    let content_type = download
        .content_type
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| fallback.to_string());
    ([(header::CONTENT_TYPE, content_type)], download.bytes).into_response()
}

/// Runs a full reindex and reports how many identifiers it processed
///
/// The run is spawned so a dropped connection does not abort it.
pub async fn trigger_reindex(
    State(state): State<Arc<AppState>>,
) -> ServerResult<Json<Envelope<usize>>> {
    let controller = state.controller.clone();
    let report = tokio::spawn(async move { controller.run().await })
        .await
        .map_err(|e| AppError::internal(format!("reindex task failed: {}", e)))?
        .map_err(AppError::from)?;
    Ok(Json(Envelope::success(report.identifiers)))
}

pub async fn index_status(State(state): State<Arc<AppState>>) -> Json<ControllerStatus> {
    Json(state.controller.status())
}
