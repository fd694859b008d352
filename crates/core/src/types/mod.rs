//! Domain types for Bookshelf
//!
//! - `book`: book identifiers and the searchable document
//! - `raw`: raw records as delivered by a metadata source
//! - `links`: cover and file URL scheme
//! - `common`: shared traits

mod book;
mod common;
pub mod links;
mod raw;

pub use book::{BookDocument, BookId};
pub use common::Validator;
pub use raw::{RawBookRecord, RawTimestamp};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_types_are_exported() {
        let id = BookId::new(1).unwrap();
        let _doc: BookDocument = BookDocument::new(id);
        let _raw: RawBookRecord = RawBookRecord::new("1");
        let _ts: RawTimestamp = RawTimestamp::from("2020-01-01");
    }
}
