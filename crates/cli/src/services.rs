// crates/cli/src/services.rs

use anyhow::{Context, Result};
use bookshelf_config::{Config, SearchBackend, SourceKind};
use bookshelf_content_sources::{ContentServerSource, LibraryDbSource, MetadataSource};
use bookshelf_resilience::CancellationToken;
use bookshelf_search_engine::{MeilisearchEngine, MemorySearchEngine, SearchEngine};
use bookshelf_sync_engine::{Catalog, ReindexController, ReindexSettings};
use std::sync::Arc;

/// Everything a command needs, wired from one configuration
pub struct Services {
    pub config: Config,
    pub controller: Arc<ReindexController>,
    pub catalog: Catalog,
    pub cancel: CancellationToken,
}

impl Services {
    /// Builds the source and engine named by `config`
    pub async fn from_config(config: Config, cancel: CancellationToken) -> Result<Self> {
        let source = open_source(&config).await?;
        let engine = open_engine(&config)?;
        Ok(Self::from_parts(config, source, engine, cancel))
    }

    pub fn from_parts(
        config: Config,
        source: Arc<dyn MetadataSource>,
        engine: Arc<dyn SearchEngine>,
        cancel: CancellationToken,
    ) -> Self {
        let settings = ReindexSettings::from_config(&config.search, &config.reindex);
        let catalog = Catalog::new(source.clone(), engine.clone(), settings.primary_index.clone());
        let controller = Arc::new(ReindexController::with_cancellation(
            source,
            engine,
            settings,
            cancel.clone(),
        ));
        Self {
            config,
            controller,
            catalog,
            cancel,
        }
    }
}

async fn open_source(config: &Config) -> Result<Arc<dyn MetadataSource>> {
    let source: Arc<dyn MetadataSource> = match config.source.kind {
        SourceKind::ContentServer => Arc::new(
            ContentServerSource::new(&config.source.server, config.source.library.clone())
                .with_context(|| format!("Invalid content server URL '{}'", config.source.server))?,
        ),
        SourceKind::LibraryDb => Arc::new(
            LibraryDbSource::open(&config.source.library_db_path)
                .await
                .with_context(|| {
                    format!(
                        "Failed to open library database {}",
                        config.source.library_db_path.display()
                    )
                })?,
        ),
    };
    log::info!("Metadata source: {} ({})", source.name(), config.source.kind);
    Ok(source)
}

fn open_engine(config: &Config) -> Result<Arc<dyn SearchEngine>> {
    let engine: Arc<dyn SearchEngine> = match config.search.backend {
        SearchBackend::Meilisearch => Arc::new(
            MeilisearchEngine::new(&config.search.host, config.search.api_key.as_deref())
                .with_context(|| format!("Invalid search host '{}'", config.search.host))?,
        ),
        SearchBackend::Memory => {
            log::warn!("Using the in-memory search engine; the index is lost on exit");
            Arc::new(MemorySearchEngine::new())
        }
    };
    Ok(engine)
}
