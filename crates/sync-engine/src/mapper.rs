// crates/sync-engine/src/mapper.rs
//! Raw source records to search documents

use bookshelf_core::{AppError, BookDocument, BookId, RawBookRecord, RawTimestamp};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Formats tried, in order, for timestamps carrying an offset
const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"];

/// Formats tried for timestamps without an offset, read as UTC
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Documents produced from one batch of raw records
#[derive(Debug, Default)]
pub struct MappedBatch {
    pub documents: Vec<BookDocument>,
    /// One `MalformedRecord` per skipped record
    pub skipped: Vec<AppError>,
}

/// Parses a timestamp in any of the shapes sources emit
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in OFFSET_FORMATS {
        if let Ok(parsed) = DateTime::parse_from_str(text, format) {
            return Some(parsed.with_timezone(&Utc));
        }
    }
    for format in NAIVE_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(text, format) {
            return Some(parsed.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

fn timestamp(raw: Option<&RawTimestamp>, id: BookId, field: &str) -> DateTime<Utc> {
    let Some(text) = raw.and_then(RawTimestamp::as_str) else {
        return DateTime::<Utc>::UNIX_EPOCH;
    };
    parse_timestamp(text).unwrap_or_else(|| {
        log::debug!("Book {}: unparseable {} {:?}, using epoch", id, field, text);
        DateTime::<Utc>::UNIX_EPOCH
    })
}

fn finite_or_zero(value: Option<f64>) -> f64 {
    value.filter(|v| v.is_finite()).unwrap_or(0.0)
}

fn text(value: &Option<String>) -> String {
    value.as_deref().map(str::trim).unwrap_or_default().to_string()
}

fn list(value: &Option<Vec<String>>) -> Vec<String> {
    value
        .iter()
        .flatten()
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Maps one raw record, failing only when its identifier is unusable
pub fn map_record(raw: &RawBookRecord) -> Result<BookDocument, AppError> {
    let id = BookId::parse(&raw.id)?;
    let mut document = BookDocument::new(id);

    document.title = text(&raw.title);
    document.authors = list(&raw.authors);
    document.author_sort = text(&raw.author_sort);
    document.identifiers = raw.identifiers.clone().unwrap_or_default();
    document.isbn = match raw.isbn.as_deref().map(str::trim) {
        Some(isbn) if !isbn.is_empty() => isbn.to_string(),
        _ => document
            .identifiers
            .get("isbn")
            .cloned()
            .unwrap_or_default(),
    };
    document.languages = list(&raw.languages);
    document.tags = list(&raw.tags);
    document.publisher = text(&raw.publisher);
    document.pubdate = timestamp(raw.pubdate.as_ref(), id, "pubdate");
    document.last_modified = timestamp(raw.last_modified.as_ref(), id, "last_modified");
    document.series_index = finite_or_zero(raw.series_index);
    document.rating = finite_or_zero(raw.rating).clamp(0.0, 10.0);
    document.size = raw.size.unwrap_or(0).max(0);
    document.comments = raw.comments.clone().unwrap_or_default();

    Ok(document)
}

/// Maps a batch, skipping and reporting records with malformed identifiers
pub fn map_batch(records: &[RawBookRecord]) -> MappedBatch {
    let mut batch = MappedBatch {
        documents: Vec::with_capacity(records.len()),
        skipped: Vec::new(),
    };

    for record in records {
        match map_record(record) {
            Ok(document) => batch.documents.push(document),
            Err(err) => {
                log::warn!("Skipping record: {}", err);
                batch.skipped.push(err);
            }
        }
    }

    batch
}
