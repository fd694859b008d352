// crates/server/src/state.rs

use bookshelf_config::ServerConfig;
use bookshelf_sync_engine::{Catalog, ReindexController};
use std::sync::Arc;

/// Shared by every request handler
pub struct AppState {
    pub catalog: Catalog,
    pub controller: Arc<ReindexController>,
    pub config: ServerConfig,
}

impl AppState {
    /// Builds the state with a catalog reading the controller's primary index
    pub fn new(controller: Arc<ReindexController>, config: ServerConfig) -> Self {
        let catalog = Catalog::new(
            controller.source().clone(),
            controller.engine().clone(),
            controller.settings().primary_index.clone(),
        );
        Self {
            catalog,
            controller,
            config,
        }
    }
}
