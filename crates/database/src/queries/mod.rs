//! Library query operations

pub mod books;

pub use books::{count_books, fetch_books_in_range, list_book_ids};
