//! Bookshelf Database Layer
//!
//! Read access to a Calibre `metadata.db` with sqlx. Rows come back as
//! [`bookshelf_core::RawBookRecord`] so the library database and the content
//! server feed the same mapper.

pub mod connection;
pub mod queries;
pub mod schema;

pub use connection::{connect, DatabaseConfig, DbPool};
pub use queries::{count_books, fetch_books_in_range, list_book_ids};
pub use schema::{create_library_schema, verify_library};

#[cfg(test)]
mod tests {
    use super::*;
    use bookshelf_core::AppError;
    use connection::create_test_db;

    async fn seed(pool: &DbPool) -> Result<(), AppError> {
        create_library_schema(pool).await?;
        sqlx::raw_sql(
            r#"
            INSERT INTO books (id, title, author_sort, pubdate, last_modified, series_index, path)
            VALUES
                (1, 'Ancillary Justice', 'Leckie, Ann', '2013-10-01 00:00:00+00:00',
                 '2024-01-05 10:00:00+00:00', 1.0, 'Ann Leckie/Ancillary Justice (1)'),
                (2, 'Good Omens', 'Pratchett, Terry & Gaiman, Neil', '1990-05-01 00:00:00+00:00',
                 '2024-02-01 09:30:00+00:00', 1.0, 'Terry Pratchett/Good Omens (2)'),
                (5, 'Untitled', NULL, NULL, '2024-03-01 00:00:00+00:00', 2.5, 'Unknown/Untitled (5)');

            INSERT INTO authors (id, name, sort) VALUES
                (1, 'Ann Leckie', 'Leckie, Ann'),
                (2, 'Terry Pratchett', 'Pratchett, Terry'),
                (3, 'Neil Gaiman', 'Gaiman, Neil');
            INSERT INTO books_authors_link (id, book, author) VALUES (1, 1, 1), (2, 2, 2), (3, 2, 3);

            INSERT INTO publishers (id, name) VALUES (1, 'Orbit');
            INSERT INTO books_publishers_link (id, book, publisher) VALUES (1, 1, 1);

            INSERT INTO tags (id, name) VALUES (1, 'Space Opera'), (2, 'Fantasy'), (3, 'Humor');
            INSERT INTO books_tags_link (id, book, tag) VALUES (1, 1, 1), (2, 2, 3), (3, 2, 2);

            INSERT INTO languages (id, lang_code) VALUES (1, 'eng');
            INSERT INTO books_languages_link (id, book, lang_code, item_order) VALUES (1, 1, 1, 0);

            INSERT INTO ratings (id, rating) VALUES (1, 8);
            INSERT INTO books_ratings_link (id, book, rating) VALUES (1, 1, 1);

            INSERT INTO identifiers (id, book, type, val) VALUES
                (1, 1, 'isbn', '9780316246620'),
                (2, 1, 'goodreads', '17333324');

            INSERT INTO comments (id, book, text) VALUES (1, 1, '<p>Breq was a warship.</p>');
            INSERT INTO data (id, book, format, uncompressed_size, name)
                VALUES (1, 1, 'EPUB', 524288, 'Ancillary Justice - Ann Leckie');
            "#,
        )
        .execute(pool)
        .await
        .map_err(|e| AppError::database("Failed to seed library", e))?;
        Ok(())
    }

    #[tokio::test]
    async fn test_list_ids_ascending() -> Result<(), AppError> {
        let pool = create_test_db().await?;
        seed(&pool).await?;

        assert_eq!(list_book_ids(&pool).await?, vec![1, 2, 5]);
        assert_eq!(count_books(&pool).await?, 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_full_record() -> Result<(), AppError> {
        let pool = create_test_db().await?;
        seed(&pool).await?;

        let records = fetch_books_in_range(&pool, 1, 1).await?;
        assert_eq!(records.len(), 1);

        let book = &records[0];
        assert_eq!(book.id, "1");
        assert_eq!(book.title.as_deref(), Some("Ancillary Justice"));
        assert_eq!(book.authors, Some(vec!["Ann Leckie".to_string()]));
        assert_eq!(book.publisher.as_deref(), Some("Orbit"));
        assert_eq!(book.tags, Some(vec!["Space Opera".to_string()]));
        assert_eq!(book.languages, Some(vec!["eng".to_string()]));
        assert_eq!(book.isbn.as_deref(), Some("9780316246620"));
        assert_eq!(book.rating, Some(8.0));
        assert_eq!(book.size, Some(524288));
        assert_eq!(
            book.pubdate.as_ref().and_then(|p| p.as_str()),
            Some("2013-10-01 00:00:00+00:00")
        );
        assert!(book.comments.as_deref().unwrap_or_default().contains("warship"));
        Ok(())
    }

    #[tokio::test]
    async fn test_range_is_inclusive_and_sparse() -> Result<(), AppError> {
        let pool = create_test_db().await?;
        seed(&pool).await?;

        let records = fetch_books_in_range(&pool, 2, 5).await?;
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "5"]);

        let good_omens = &records[0];
        assert_eq!(
            good_omens.authors,
            Some(vec!["Terry Pratchett".to_string(), "Neil Gaiman".to_string()])
        );
        assert_eq!(
            good_omens.tags,
            Some(vec!["Fantasy".to_string(), "Humor".to_string()])
        );

        let untitled = &records[1];
        assert!(untitled.authors.is_none());
        assert!(untitled.publisher.is_none());
        assert!(untitled.identifiers.is_none());
        assert!(untitled.size.is_none());
        assert_eq!(untitled.series_index, Some(2.5));
        Ok(())
    }

    #[tokio::test]
    async fn test_undecodable_row_is_skipped() -> Result<(), AppError> {
        let pool = create_test_db().await?;
        seed(&pool).await?;
        sqlx::raw_sql(
            "INSERT INTO data (id, book, format, uncompressed_size, name)
                VALUES (2, 2, 'EPUB', 'not a number', 'Good Omens');",
        )
        .execute(&pool)
        .await
        .map_err(|e| AppError::database("Failed to corrupt row", e))?;

        let records = fetch_books_in_range(&pool, 1, 5).await?;
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "5"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_and_inverted_ranges() -> Result<(), AppError> {
        let pool = create_test_db().await?;
        seed(&pool).await?;

        assert!(fetch_books_in_range(&pool, 10, 20).await?.is_empty());
        assert!(fetch_books_in_range(&pool, 5, 1).await?.is_empty());
        Ok(())
    }
}
