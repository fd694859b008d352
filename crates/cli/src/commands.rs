// crates/cli/src/commands.rs

use crate::services::Services;
use anyhow::{Context, Result};
use bookshelf_config::ConfigManager;
use bookshelf_core::{BookDocument, BookId};
use bookshelf_search_engine::SearchQuery;
use bookshelf_server::AppState;
use bookshelf_sync_engine::{RunOutcome, RunReport};
use clap::ArgMatches;
use console::style;
use std::sync::Arc;

/// Write a default config file
pub fn init_config(manager: &ConfigManager) -> Result<()> {
    let created = manager
        .initialize()
        .context("Failed to write default configuration")?;
    let path = manager.config_path();
    if created {
        println!("{} Wrote default configuration to {}", style("✓").green().bold(), path.display());
    } else {
        println!("Configuration already exists at {}", path.display());
    }
    Ok(())
}

/// Make sure the primary and staging indexes exist
pub async fn provision(services: &Services) -> Result<()> {
    services
        .controller
        .provision()
        .await
        .context("Failed to provision search indexes")?;

    let settings = services.controller.settings();
    println!(
        "{} Indexes '{}' and '{}' are ready",
        style("✓").green().bold(),
        settings.primary_index,
        settings.staging_index
    );
    Ok(())
}

/// Rebuild the primary index from the metadata source
pub async fn reindex(services: &Services) -> Result<RunReport> {
    match services.controller.run().await {
        Ok(report) => {
            print_run_report(&report);
            Ok(report)
        }
        Err(err) => {
            if let Some(report) = services.controller.last_run() {
                print_run_report(&report);
            }
            Err(err).context("Reindex failed")
        }
    }
}

/// Provision, then serve HTTP until the process is interrupted
pub async fn serve(services: &Services) -> Result<()> {
    services
        .controller
        .provision()
        .await
        .context("Failed to provision search indexes")?;

    let state = Arc::new(AppState::new(
        services.controller.clone(),
        services.config.server.clone(),
    ));
    bookshelf_server::serve(state, services.cancel.clone())
        .await
        .context("HTTP server failed")?;
    Ok(())
}

/// Search the primary index
pub async fn search(services: &Services, matches: &ArgMatches) -> Result<()> {
    let query = matches
        .get_one::<String>("query")
        .ok_or_else(|| anyhow::anyhow!("Search query is required"))?;
    let limit = matches
        .get_one::<usize>("limit")
        .copied()
        .unwrap_or(services.config.server.default_search_limit);

    let response = services
        .catalog
        .search(SearchQuery::new(query.as_str()).with_limit(limit))
        .await
        .context("Failed to search books")?;

    if response.hits.is_empty() {
        println!("No books found matching '{}'", query);
        return Ok(());
    }

    println!(
        "\n{} of {} Results for '{}'",
        style(response.hits.len()).bold().cyan(),
        response.estimated_total_hits,
        query
    );
    println!("{}", "=".repeat(80));
    for book in &response.hits {
        print_book_summary(book);
    }
    Ok(())
}

/// Show one indexed book
pub async fn info(services: &Services, matches: &ArgMatches) -> Result<()> {
    let raw = matches
        .get_one::<String>("id")
        .ok_or_else(|| anyhow::anyhow!("Book ID is required"))?;
    let id = BookId::parse(raw).context("Invalid book ID")?;

    let book = services
        .catalog
        .get_book(id)
        .await
        .context("Failed to get book")?;

    println!("\n{}", style("Book Information").bold().cyan());
    println!("{}", "=".repeat(80));
    println!("ID: {}", book.id);
    println!("Title: {}", style(&book.title).bold());
    if !book.authors.is_empty() {
        println!("Authors: {}", book.authors.join(", "));
    }
    if !book.publisher.is_empty() {
        println!("Publisher: {}", book.publisher);
    }
    println!("Published: {}", book.pubdate.format("%Y-%m-%d"));
    if !book.isbn.is_empty() {
        println!("ISBN: {}", book.isbn);
    }
    if !book.tags.is_empty() {
        println!("Tags: {}", book.tags.join(", "));
    }
    if !book.languages.is_empty() {
        println!("Languages: {}", book.languages.join(", "));
    }
    if book.rating > 0.0 {
        println!("Rating: {:.1}", book.rating);
    }
    println!("Size: {}", format_size(book.size));
    println!("Cover: {}", book.cover_url);
    println!("File: {}", book.file_url);
    Ok(())
}

fn print_run_report(report: &RunReport) {
    let elapsed = report.finished_at - report.started_at;
    match &report.outcome {
        RunOutcome::Succeeded => println!(
            "{} Indexed {} book(s) from {} id(s) in {}s",
            style("✓").green().bold(),
            report.documents,
            report.identifiers,
            elapsed.num_seconds()
        ),
        RunOutcome::Aborted { stage, kind, message } => println!(
            "{} Reindex aborted during {} ({}): {}",
            style("✗").red().bold(),
            stage,
            kind,
            message
        ),
    }
    if report.skipped > 0 {
        println!(
            "  {} record(s) skipped as malformed",
            style(report.skipped).yellow()
        );
    }
}

fn print_book_summary(book: &BookDocument) {
    println!("{:>6}  {}", style(book.id).dim(), style(&book.title).bold());
    if !book.authors.is_empty() {
        println!("        by {}", book.authors.join(", "));
    }
}

fn format_size(bytes: i64) -> String {
    const KB: i64 = 1024;
    const MB: i64 = KB * 1024;
    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
