//! URL scheme for covers and book files
//!
//! Search documents carry these links and the HTTP read surface serves them, so both
//! sides build and parse them here.

use crate::types::BookId;

/// Route prefix for cover images
pub const COVER_ROUTE: &str = "/api/get/cover";

/// Route prefix for book files
pub const BOOK_FILE_ROUTE: &str = "/api/get/book";

/// Extension of served cover images
pub const COVER_EXTENSION: &str = "jpg";

/// Extension of served book files
pub const BOOK_FILE_EXTENSION: &str = "epub";

/// Link to the cover image of a book
pub fn cover_url(id: BookId) -> String {
    format!("{}/{}.{}", COVER_ROUTE, id, COVER_EXTENSION)
}

/// Link to the downloadable file of a book
pub fn file_url(id: BookId) -> String {
    format!("{}/{}.{}", BOOK_FILE_ROUTE, id, BOOK_FILE_EXTENSION)
}

/// Extracts the book id from a cover file name such as `42.jpg`
pub fn parse_cover_name(name: &str) -> Option<BookId> {
    parse_file_name(name, COVER_EXTENSION)
}

/// Extracts the book id from a book file name such as `42.epub`
pub fn parse_book_file_name(name: &str) -> Option<BookId> {
    parse_file_name(name, BOOK_FILE_EXTENSION)
}

fn parse_file_name(name: &str, extension: &str) -> Option<BookId> {
    let stem = match name.rsplit_once('.') {
        Some((stem, ext)) if ext.eq_ignore_ascii_case(extension) => stem,
        Some(_) => return None,
        None => name,
    };
    BookId::parse(stem).ok()
}
