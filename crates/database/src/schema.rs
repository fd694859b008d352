//! The subset of the Calibre library schema this crate reads

use crate::DbPool;
use bookshelf_core::AppError;

/// Tables and columns read by [`crate::queries`], with Calibre's names and types
const LIBRARY_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS books (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL DEFAULT 'Unknown',
    sort TEXT,
    timestamp TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    pubdate TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    series_index REAL NOT NULL DEFAULT 1.0,
    author_sort TEXT,
    path TEXT NOT NULL DEFAULT '',
    has_cover BOOL DEFAULT 0,
    last_modified TIMESTAMP NOT NULL DEFAULT '2000-01-01 00:00:00+00:00'
);

CREATE TABLE IF NOT EXISTS authors (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    sort TEXT,
    UNIQUE(name)
);

CREATE TABLE IF NOT EXISTS books_authors_link (
    id INTEGER PRIMARY KEY,
    book INTEGER NOT NULL,
    author INTEGER NOT NULL,
    UNIQUE(book, author)
);

CREATE TABLE IF NOT EXISTS comments (
    id INTEGER PRIMARY KEY,
    book INTEGER NOT NULL,
    text TEXT NOT NULL,
    UNIQUE(book)
);

CREATE TABLE IF NOT EXISTS publishers (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    sort TEXT,
    UNIQUE(name)
);

CREATE TABLE IF NOT EXISTS books_publishers_link (
    id INTEGER PRIMARY KEY,
    book INTEGER NOT NULL,
    publisher INTEGER NOT NULL,
    UNIQUE(book)
);

CREATE TABLE IF NOT EXISTS tags (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    UNIQUE(name)
);

CREATE TABLE IF NOT EXISTS books_tags_link (
    id INTEGER PRIMARY KEY,
    book INTEGER NOT NULL,
    tag INTEGER NOT NULL,
    UNIQUE(book, tag)
);

CREATE TABLE IF NOT EXISTS languages (
    id INTEGER PRIMARY KEY,
    lang_code TEXT NOT NULL,
    UNIQUE(lang_code)
);

CREATE TABLE IF NOT EXISTS books_languages_link (
    id INTEGER PRIMARY KEY,
    book INTEGER NOT NULL,
    lang_code INTEGER NOT NULL,
    item_order INTEGER NOT NULL DEFAULT 0,
    UNIQUE(book, lang_code)
);

CREATE TABLE IF NOT EXISTS ratings (
    id INTEGER PRIMARY KEY,
    rating INTEGER CHECK(rating > -1 AND rating < 11),
    UNIQUE(rating)
);

CREATE TABLE IF NOT EXISTS books_ratings_link (
    id INTEGER PRIMARY KEY,
    book INTEGER NOT NULL,
    rating INTEGER NOT NULL,
    UNIQUE(book, rating)
);

CREATE TABLE IF NOT EXISTS identifiers (
    id INTEGER PRIMARY KEY,
    book INTEGER NOT NULL,
    type TEXT NOT NULL DEFAULT 'isbn',
    val TEXT NOT NULL,
    UNIQUE(book, type)
);

CREATE TABLE IF NOT EXISTS data (
    id INTEGER PRIMARY KEY,
    book INTEGER NOT NULL,
    format TEXT NOT NULL,
    uncompressed_size INTEGER NOT NULL,
    name TEXT NOT NULL,
    UNIQUE(book, format)
);
"#;

/// Creates the library tables on an empty, writable database
pub async fn create_library_schema(pool: &DbPool) -> Result<(), AppError> {
    sqlx::raw_sql(LIBRARY_SCHEMA)
        .execute(pool)
        .await
        .map_err(|e| AppError::database("Failed to create library schema", e))?;
    Ok(())
}

/// Checks that the file is a readable SQLite database with a `books` table
pub async fn verify_library(pool: &DbPool) -> Result<(), AppError> {
    let result: String = sqlx::query_scalar("PRAGMA quick_check")
        .fetch_one(pool)
        .await
        .map_err(|e| AppError::database("Failed to check integrity", e))?;

    if result != "ok" {
        return Err(AppError::SourceUnavailable {
            source_name: "library_db".to_string(),
            reason: format!("integrity check failed: {}", result),
        });
    }

    let tables: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'books'",
    )
    .fetch_one(pool)
    .await
    .map_err(|e| AppError::database("Failed to inspect schema", e))?;

    if tables == 0 {
        return Err(AppError::SourceUnavailable {
            source_name: "library_db".to_string(),
            reason: "no books table, not a Calibre library".to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::create_test_db;

    #[tokio::test]
    async fn test_create_schema_is_repeatable() {
        let pool = create_test_db().await.unwrap();
        create_library_schema(&pool).await.unwrap();
        create_library_schema(&pool).await.unwrap();

        verify_library(&pool).await.unwrap();
    }

    #[tokio::test]
    async fn test_verify_rejects_foreign_database() {
        let pool = create_test_db().await.unwrap();
        sqlx::query("CREATE TABLE songs (id INTEGER)")
            .execute(&pool)
            .await
            .unwrap();

        let err = verify_library(&pool).await.unwrap_err();
        assert!(matches!(err, AppError::SourceUnavailable { .. }));
    }
}
