// crates/sync-engine/tests/reindex_tests.rs
//! End-to-end reindex runs against in-memory collaborators

use bookshelf_content_sources::MemorySource;
use bookshelf_core::{AppError, BookId, RawBookRecord};
use bookshelf_resilience::CancellationToken;
use bookshelf_search_engine::{MemorySearchEngine, Operation, SearchQuery, TaskState};
use bookshelf_sync_engine::{
    Catalog, ReindexController, ReindexSettings, ReindexState, RunOutcome,
};
use std::sync::Arc;
use std::time::Duration;

struct Fixture {
    source: Arc<MemorySource>,
    engine: Arc<MemorySearchEngine>,
    controller: Arc<ReindexController>,
    cancel: CancellationToken,
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn fixture(source: MemorySource) -> Fixture {
    init_logging();
    let source = Arc::new(source);
    let engine = Arc::new(MemorySearchEngine::new());
    let cancel = CancellationToken::new();
    let controller = Arc::new(ReindexController::with_cancellation(
        source.clone(),
        engine.clone(),
        ReindexSettings::default(),
        cancel.clone(),
    ));
    Fixture {
        source,
        engine,
        controller,
        cancel,
    }
}

/// A fixture whose primary index already holds books 1..=3 and whose source has
/// since gained book 4
async fn seeded() -> Fixture {
    let fx = fixture(MemorySource::with_sequential(3));
    fx.controller.run().await.unwrap();
    fx.source
        .upsert(RawBookRecord::new("4").with_title("Book 4"))
        .await
        .unwrap();
    fx
}

async fn primary_ids(fx: &Fixture) -> Option<Vec<i64>> {
    fx.engine.document_ids("library").await
}

#[tokio::test]
async fn test_large_library_is_fetched_and_written_in_batches() {
    let fx = fixture(MemorySource::with_sequential(4500));

    let report = fx.controller.run().await.unwrap();

    assert!(report.succeeded());
    assert_eq!(report.identifiers, 4500);
    assert_eq!(report.batches, 3);
    assert_eq!(
        fx.source.fetch_calls().await,
        vec![(1, 2000), (2001, 4000), (4001, 4500)]
    );

    let writes = fx.engine.write_calls().await;
    let sizes: Vec<usize> = writes.iter().map(|w| w.documents).collect();
    let tasks: Vec<usize> = writes.iter().map(|w| w.tasks).collect();
    assert_eq!(sizes, vec![2000, 2000, 500]);
    assert_eq!(tasks, vec![2, 2, 1]);
    assert!(writes.iter().all(|w| w.index == "library-bak"));

    assert_eq!(primary_ids(&fx).await.map(|ids| ids.len()), Some(4500));
}

#[tokio::test]
async fn test_fetch_failure_leaves_primary_untouched() {
    let fx = seeded().await;
    fx.source.fail_fetch_on_call(2).await;

    let err = fx.controller.run().await.unwrap_err();

    assert_eq!(err.stage, ReindexState::Staging);
    assert!(matches!(err.cause, AppError::SourceUnavailable { .. }));
    assert_eq!(primary_ids(&fx).await, Some(vec![1, 2, 3]));
}

#[tokio::test]
async fn test_rejected_write_leaves_primary_untouched() {
    let fx = seeded().await;
    fx.engine.fail_operation(Operation::Write).await;

    let err = fx.controller.run().await.unwrap_err();

    assert!(matches!(err.cause, AppError::WriteRejected { ref index, .. } if index == "library-bak"));
    assert_eq!(primary_ids(&fx).await, Some(vec![1, 2, 3]));
}

#[tokio::test]
async fn test_failed_tasks_prevent_the_swap() {
    let fx = seeded().await;
    fx.engine.script_write_outcome(TaskState::Failed).await;

    let err = fx.controller.run().await.unwrap_err();

    assert_eq!(err.stage, ReindexState::Monitoring);
    assert!(matches!(err.cause, AppError::WriteRejected { .. }));
    assert_eq!(primary_ids(&fx).await, Some(vec![1, 2, 3]));
}

#[tokio::test]
async fn test_refused_swap_keeps_previous_primary() {
    let fx = seeded().await;
    fx.engine.fail_operation(Operation::Swap).await;

    let err = fx.controller.run().await.unwrap_err();

    assert_eq!(err.stage, ReindexState::Swapping);
    assert!(matches!(err.cause, AppError::SwapRejected { .. }));
    assert_eq!(primary_ids(&fx).await, Some(vec![1, 2, 3]));
    assert_eq!(
        fx.engine.document_ids("library-bak").await,
        Some(vec![1, 2, 3, 4])
    );

    fx.engine.recover(Operation::Swap).await;
    fx.controller.run().await.unwrap();
    assert_eq!(primary_ids(&fx).await, Some(vec![1, 2, 3, 4]));
}

#[tokio::test(start_paused = true)]
async fn test_accepted_swap_succeeds_while_its_task_is_pending() {
    let fx = seeded().await;
    fx.engine.script_swap_outcome(TaskState::Processing).await;

    let report = fx.controller.run().await.unwrap();

    assert!(report.succeeded());
    assert_eq!(primary_ids(&fx).await, Some(vec![1, 2, 3, 4]));
    assert_eq!(fx.controller.last_run().map(|r| r.outcome), Some(RunOutcome::Succeeded));
    assert_eq!(fx.controller.state(), ReindexState::Idle);
}

#[tokio::test]
async fn test_rerun_without_changes_is_idempotent() {
    let fx = fixture(MemorySource::with_sequential(7));

    let first = fx.controller.run().await.unwrap();
    let before = primary_ids(&fx).await;
    let second = fx.controller.run().await.unwrap();

    assert_eq!(first.documents, second.documents);
    assert_eq!(primary_ids(&fx).await, before);
    assert_eq!(before, Some((1..=7).collect()));
}

#[tokio::test(start_paused = true)]
async fn test_indexing_that_never_finishes_times_out() {
    let fx = seeded().await;
    fx.engine.script_write_outcome(TaskState::Processing).await;

    let started = tokio::time::Instant::now();
    let err = fx.controller.run().await.unwrap_err();

    assert_eq!(err.stage, ReindexState::Monitoring);
    assert!(matches!(
        err.cause,
        AppError::IndexingTimeout {
            pending: 1,
            waited_secs: 30
        }
    ));
    assert!(started.elapsed() >= Duration::from_secs(30));
    assert_eq!(primary_ids(&fx).await, Some(vec![1, 2, 3]));
    match fx.controller.last_run().map(|r| r.outcome) {
        Some(RunOutcome::Aborted { kind, .. }) => assert_eq!(kind, "indexing_timeout"),
        other => panic!("unexpected outcome {:?}", other),
    }
}

#[tokio::test]
async fn test_malformed_record_is_skipped() {
    let source = MemorySource::with_sequential(5);
    source.insert_at(3, RawBookRecord::new("x3")).await;
    let fx = fixture(source);

    let report = fx.controller.run().await.unwrap();

    assert_eq!(report.skipped, 1);
    assert_eq!(report.documents, 4);
    assert_eq!(primary_ids(&fx).await, Some(vec![1, 2, 4, 5]));
}

#[tokio::test]
async fn test_indexed_book_carries_download_links() {
    let fx = fixture(MemorySource::with_records(vec![
        RawBookRecord::new("42").with_title("The Answer")
    ]));
    fx.controller.run().await.unwrap();
    let catalog = Catalog::new(fx.source.clone(), fx.engine.clone(), "library");

    let book = catalog.get_book(BookId::new(42).unwrap()).await.unwrap();
    assert_eq!(book.cover_url, "/api/get/cover/42.jpg");
    assert_eq!(book.file_url, "/api/get/book/42.epub");

    let found = catalog.search(SearchQuery::new("answer")).await.unwrap();
    assert_eq!(found.hits.len(), 1);
    assert_eq!(found.hits[0].cover_url, "/api/get/cover/42.jpg");
}

async fn wait_for_state(controller: &ReindexController, state: ReindexState) {
    for _ in 0..100 {
        if controller.state() == state {
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("controller never reached {}", state);
}

#[tokio::test(start_paused = true)]
async fn test_second_trigger_is_rejected_while_running() {
    let fx = seeded().await;
    fx.engine.script_write_outcome(TaskState::Processing).await;
    let catalog = Catalog::new(fx.source.clone(), fx.engine.clone(), "library");

    let running = fx.controller.clone();
    let handle = tokio::spawn(async move { running.run().await });
    wait_for_state(&fx.controller, ReindexState::Monitoring).await;

    let second = fx.controller.run().await.unwrap_err();
    assert!(matches!(second.cause, AppError::AlreadyRunning { .. }));
    assert!(fx.controller.is_running());

    // readers still see the previous primary mid-run
    let page = catalog.search(SearchQuery::new("")).await.unwrap();
    assert_eq!(page.estimated_total_hits, 3);

    fx.cancel.cancel();
    let first = handle.await.unwrap().unwrap_err();
    assert!(matches!(first.cause, AppError::Cancelled { .. }));
    assert_eq!(first.stage, ReindexState::Monitoring);
    assert!(!fx.controller.is_running());
    assert_eq!(fx.controller.state(), ReindexState::Idle);
    assert_eq!(primary_ids(&fx).await, Some(vec![1, 2, 3]));
}

#[tokio::test]
async fn test_swap_is_visible_to_the_next_read() {
    let fx = seeded().await;
    let catalog = Catalog::new(fx.source.clone(), fx.engine.clone(), "library");
    assert_eq!(
        catalog.search(SearchQuery::new("")).await.unwrap().estimated_total_hits,
        3
    );

    fx.controller.run().await.unwrap();

    let page = catalog.search(SearchQuery::new("")).await.unwrap();
    assert_eq!(page.estimated_total_hits, 4);
    assert_eq!(page.hits[0].id, 4);
}
