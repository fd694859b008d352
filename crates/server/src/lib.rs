// crates/server/src/lib.rs
//! HTTP surface of the catalog
//!
//! Reads go through [`bookshelf_sync_engine::Catalog`], so they always hit the
//! current primary index. `POST /api/index/update` triggers a reindex run and
//! `GET /api/index/status` reports on it.

mod error;
mod handlers;
mod router;
mod state;

pub use error::{ErrorBody, ServerError, ServerResult};
pub use handlers::{Envelope, PageParams, SearchParams, SortParam};
pub use router::{build_router, serve, serve_on};
pub use state::AppState;
