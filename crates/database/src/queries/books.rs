//! Book metadata queries against a Calibre library

use crate::DbPool;
use bookshelf_core::{AppError, RawBookRecord, RawTimestamp};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::collections::HashMap;

/// Separates list items inside one aggregated column
const ITEM_SEPARATOR: char = '\u{1f}';

/// Separates an identifier type from its value
const PAIR_SEPARATOR: char = '\u{1e}';

const BOOKS_IN_RANGE: &str = r#"
SELECT
    b.id AS id,
    b.title AS title,
    b.author_sort AS author_sort,
    CAST(b.pubdate AS TEXT) AS pubdate,
    CAST(b.last_modified AS TEXT) AS last_modified,
    b.series_index AS series_index,
    (SELECT c.text FROM comments c WHERE c.book = b.id) AS comments,
    (SELECT group_concat(name, char(31)) FROM (
        SELECT a.name AS name FROM books_authors_link l
        JOIN authors a ON a.id = l.author
        WHERE l.book = b.id ORDER BY l.id
    )) AS authors,
    (SELECT p.name FROM books_publishers_link l
        JOIN publishers p ON p.id = l.publisher
        WHERE l.book = b.id LIMIT 1) AS publisher,
    (SELECT group_concat(name, char(31)) FROM (
        SELECT t.name AS name FROM books_tags_link l
        JOIN tags t ON t.id = l.tag
        WHERE l.book = b.id ORDER BY t.name
    )) AS tags,
    (SELECT group_concat(code, char(31)) FROM (
        SELECT lg.lang_code AS code FROM books_languages_link l
        JOIN languages lg ON lg.id = l.lang_code
        WHERE l.book = b.id ORDER BY l.item_order
    )) AS languages,
    (SELECT r.rating FROM books_ratings_link l
        JOIN ratings r ON r.id = l.rating
        WHERE l.book = b.id LIMIT 1) AS rating,
    (SELECT d.uncompressed_size FROM data d
        WHERE d.book = b.id AND d.format = 'EPUB' LIMIT 1) AS size,
    (SELECT group_concat(i.type || char(30) || i.val, char(31)) FROM identifiers i
        WHERE i.book = b.id) AS identifiers
FROM books b
WHERE b.id BETWEEN ? AND ?
ORDER BY b.id
"#;

/// Lists every book id in ascending order
pub async fn list_book_ids(pool: &DbPool) -> Result<Vec<i64>, AppError> {
    sqlx::query_scalar("SELECT id FROM books ORDER BY id ASC")
        .fetch_all(pool)
        .await
        .map_err(|e| AppError::database("Failed to list book ids", e))
}

/// Counts the books in the library
pub async fn count_books(pool: &DbPool) -> Result<i64, AppError> {
    sqlx::query_scalar("SELECT COUNT(*) FROM books")
        .fetch_one(pool)
        .await
        .map_err(|e| AppError::database("Failed to count books", e))
}

/// Fetches every book whose id lies in `min..=max`
///
/// A row whose columns cannot be decoded is logged and left out.
pub async fn fetch_books_in_range(
    pool: &DbPool,
    min: i64,
    max: i64,
) -> Result<Vec<RawBookRecord>, AppError> {
    if min > max {
        return Ok(Vec::new());
    }

    let rows = sqlx::query(BOOKS_IN_RANGE)
        .bind(min)
        .bind(max)
        .fetch_all(pool)
        .await
        .map_err(|e| AppError::database("Failed to fetch books", e))?;

    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        match row_to_record(row) {
            Ok(record) => records.push(record),
            Err(e) => log::warn!("Skipping undecodable book row in {}..={}: {}", min, max, e),
        }
    }
    Ok(records)
}

fn row_to_record(row: SqliteRow) -> Result<RawBookRecord, AppError> {
    let get_text = |column: &str| -> Result<Option<String>, AppError> {
        row.try_get::<Option<String>, _>(column)
            .map_err(|e| AppError::database(format!("Failed to read column {}", column), e))
    };

    let id: i64 = row
        .try_get("id")
        .map_err(|e| AppError::database("Failed to read column id", e))?;

    let identifiers = get_text("identifiers")?.map(|joined| split_pairs(&joined));
    let isbn = identifiers
        .as_ref()
        .and_then(|map| map.get("isbn").cloned());

    Ok(RawBookRecord {
        id: id.to_string(),
        title: get_text("title")?,
        authors: get_text("authors")?.map(|joined| split_items(&joined)),
        author_sort: get_text("author_sort")?,
        isbn,
        identifiers,
        languages: get_text("languages")?.map(|joined| split_items(&joined)),
        tags: get_text("tags")?.map(|joined| split_items(&joined)),
        publisher: get_text("publisher")?,
        pubdate: get_text("pubdate")?.map(RawTimestamp::Text),
        last_modified: get_text("last_modified")?.map(RawTimestamp::Text),
        series_index: row
            .try_get::<Option<f64>, _>("series_index")
            .map_err(|e| AppError::database("Failed to read column series_index", e))?,
        rating: row
            .try_get::<Option<i64>, _>("rating")
            .map_err(|e| AppError::database("Failed to read column rating", e))?
            .map(|r| r as f64),
        size: row
            .try_get::<Option<i64>, _>("size")
            .map_err(|e| AppError::database("Failed to read column size", e))?,
        comments: get_text("comments")?,
    })
}

fn split_items(joined: &str) -> Vec<String> {
    joined
        .split(ITEM_SEPARATOR)
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn split_pairs(joined: &str) -> HashMap<String, String> {
    joined
        .split(ITEM_SEPARATOR)
        .filter_map(|pair| pair.split_once(PAIR_SEPARATOR))
        .map(|(kind, value)| (kind.to_ascii_lowercase(), value.to_string()))
        .collect()
}
