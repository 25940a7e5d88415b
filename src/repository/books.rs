//! Books repository for database operations

use sqlx::{PgConnection, Pool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{like_pattern, split_csv};
use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, BookQuery, CreateBook, UpdateBook},
        pagination::{order_by, Page},
    },
};

const SORTABLE_FIELDS: &[(&str, &str)] = &[
    ("title", "b.title"),
    ("author", "b.author"),
    ("book_id", "b.book_id"),
    ("book_language", "b.book_language"),
    ("publication_date", "b.publication_date"),
    ("page_count", "b.page_count"),
    ("available_copies", "b.available_copies"),
    ("borrow_count", "b.borrow_count"),
    ("created_at", "b.created_at"),
];

/// Append the WHERE clause shared by the count and page queries
fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, query: &BookQuery) {
    qb.push(" WHERE TRUE");

    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = like_pattern(search);
        qb.push(" AND (b.title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR b.author ILIKE ")
            .push_bind(pattern)
            .push(")");
    }

    if let Some(ref genre) = query.genre {
        let slugs = split_csv(genre);
        if !slugs.is_empty() {
            qb.push(" AND b.genre_ids && ARRAY(SELECT g.id FROM genres g WHERE g.slug = ANY(")
                .push_bind(slugs)
                .push("))");
        }
    }

    if let Some(ref language) = query.language {
        let languages: Vec<String> = split_csv(language)
            .into_iter()
            .map(|l| l.to_lowercase())
            .collect();
        if !languages.is_empty() {
            qb.push(" AND LOWER(b.book_language) = ANY(")
                .push_bind(languages)
                .push(")");
        }
    }

    match query.available {
        Some(true) => {
            qb.push(" AND b.available_copies > 0");
        }
        Some(false) => {
            qb.push(" AND b.available_copies = 0");
        }
        None => {}
    }
}

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get book by internal ID
    pub async fn get_by_id(&self, id: Uuid) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("No book found with that ID".to_string()))
    }

    /// Lock a book row for the rest of the transaction
    pub async fn lock(&self, conn: &mut PgConnection, id: Uuid) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| AppError::NotFound("No book found with that ID".to_string()))
    }

    /// Search books with filters, sorting and pagination
    pub async fn search(&self, query: &BookQuery) -> AppResult<(Vec<Book>, i64)> {
        let page = Page::new(query.page, query.per_page);

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM books b");
        push_filters(&mut count, query);
        let total = count
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut select = QueryBuilder::<Postgres>::new("SELECT b.* FROM books b");
        push_filters(&mut select, query);
        select
            .push(" ORDER BY ")
            .push(order_by(
                query.sort.as_deref(),
                SORTABLE_FIELDS,
                "b.created_at DESC",
            ))
            .push(", b.id LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let books = select.build_query_as::<Book>().fetch_all(&self.pool).await?;

        Ok((books, total))
    }

    /// Insert a book whose copies are all on the shelf
    pub async fn create(
        &self,
        conn: &mut PgConnection,
        book_id: i32,
        book: &CreateBook,
    ) -> AppResult<Book> {
        let created = sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (
                id, book_id, cover_img, title, author, publisher, genre_ids,
                publication_date, book_language, page_count, summary,
                total_copies, available_copies, borrow_count
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $12, 0)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(book_id)
        .bind(&book.cover_img)
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.publisher)
        .bind(&book.genres)
        .bind(book.publication_date)
        .bind(&book.book_language)
        .bind(book.page_count)
        .bind(&book.summary)
        .bind(book.total_copies)
        .fetch_one(&mut *conn)
        .await?;

        Ok(created)
    }

    /// Apply a partial update; `available_copies` is precomputed by the caller
    pub async fn update(
        &self,
        conn: &mut PgConnection,
        id: Uuid,
        patch: &UpdateBook,
        available_copies: i32,
    ) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(
            r#"
            UPDATE books SET
                cover_img = COALESCE($2, cover_img),
                title = COALESCE($3, title),
                author = COALESCE($4, author),
                publisher = COALESCE($5, publisher),
                genre_ids = COALESCE($6, genre_ids),
                publication_date = COALESCE($7, publication_date),
                book_language = COALESCE($8, book_language),
                page_count = COALESCE($9, page_count),
                summary = COALESCE($10, summary),
                total_copies = COALESCE($11, total_copies),
                available_copies = $12,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&patch.cover_img)
        .bind(&patch.title)
        .bind(&patch.author)
        .bind(&patch.publisher)
        .bind(&patch.genres)
        .bind(patch.publication_date)
        .bind(&patch.book_language)
        .bind(patch.page_count)
        .bind(&patch.summary)
        .bind(patch.total_copies)
        .bind(available_copies)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("No book found with that ID".to_string()))
    }

    /// Take one copy off the shelf if any is left.
    ///
    /// Returns `None` when no copy is available; the conditional update makes
    /// concurrent issues of the last copy impossible.
    pub async fn take_copy(&self, conn: &mut PgConnection, id: Uuid) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>(
            r#"
            UPDATE books
            SET available_copies = available_copies - 1,
                borrow_count = borrow_count + 1,
                updated_at = NOW()
            WHERE id = $1 AND available_copies > 0
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(book)
    }

    /// Put one copy back on the shelf; `None` when every copy is already in
    pub async fn put_back_copy(
        &self,
        conn: &mut PgConnection,
        id: Uuid,
    ) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>(
            r#"
            UPDATE books
            SET available_copies = available_copies + 1,
                updated_at = NOW()
            WHERE id = $1 AND available_copies < total_copies
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(book)
    }

    /// Delete a book
    pub async fn delete(&self, conn: &mut PgConnection, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("No book found with that ID".to_string()));
        }

        Ok(())
    }

    /// Whether any book references the genre
    pub async fn any_with_genre(&self, genre_id: Uuid) -> AppResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE $1 = ANY(genre_ids))")
                .bind(genre_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }
}
