// crates/server/src/router.rs

use crate::error::{ServerError, ServerResult};
use crate::handlers;
use crate::state::AppState;
use axum::routing::{get, post};
use axum::Router;
use bookshelf_resilience::CancellationToken;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

/// All routes of the read and trigger surface
pub fn build_router(state: Arc<AppState>) -> Router {
    let permissive_cors = state.config.permissive_cors;

    let router = Router::new()
        .route("/health", get(handlers::health))
        // Reads
        .route(
            "/api/search",
            get(handlers::search_get).post(handlers::search_post),
        )
        .route("/api/recently", get(handlers::recently))
        .route("/api/book/{id}", get(handlers::get_book))
        .route("/api/get/cover/{file}", get(handlers::cover))
        .route("/api/get/book/{file}", get(handlers::book_file))
        // Edits
        .route("/api/book/{id}/update", post(handlers::update_book))
        .route("/api/book/{id}/delete", post(handlers::delete_book))
        // Reindex
        .route("/api/index/update", post(handlers::trigger_reindex))
        .route("/api/index/status", get(handlers::index_status))
        .with_state(state);

    if permissive_cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}

/// Binds the configured address and serves until `shutdown` fires
pub async fn serve(state: Arc<AppState>, shutdown: CancellationToken) -> ServerResult<()> {
    let address = state.config.bind_address();
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| ServerError::Bind {
            address: address.clone(),
            source,
        })?;
    serve_on(listener, state, shutdown).await
}

/// Serves on an already bound listener until `shutdown` fires
pub async fn serve_on(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: CancellationToken,
) -> ServerResult<()> {
    log::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    log::info!("Server stopped");
    Ok(())
}
