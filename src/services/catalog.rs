//! Catalog service for books and genres

use std::collections::HashMap;

use uuid::Uuid;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, BookDetails, BookQuery, BookWithGenres, CreateBook, UpdateBook},
        genre::{is_valid_slug, CreateGenre, Genre, GenreQuery, GenreSummary, UpdateGenre},
        review::ReviewDetails,
    },
    repository::{reviews::ReviewFilter, Repository},
};

use super::waitlist::WaitlistService;

fn check_slug(slug: &str) -> AppResult<()> {
    if is_valid_slug(slug) {
        Ok(())
    } else {
        Err(AppError::Validation(
            "Slug must be lowercase words separated by hyphens".to_string(),
        ))
    }
}

/// Pair each book with its genres, in the book's own genre order
fn attach_genres(books: Vec<Book>, genres: &[GenreSummary]) -> Vec<BookWithGenres> {
    let by_id: HashMap<Uuid, &GenreSummary> = genres.iter().map(|g| (g.id, g)).collect();
    books
        .into_iter()
        .map(|book| {
            let genres = book
                .genre_ids
                .iter()
                .filter_map(|id| by_id.get(id).map(|g| (*g).clone()))
                .collect();
            BookWithGenres { book, genres }
        })
        .collect()
}

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
    waitlist: WaitlistService,
}

impl CatalogService {
    pub fn new(repository: Repository, waitlist: WaitlistService) -> Self {
        Self {
            repository,
            waitlist,
        }
    }

    // =========================================================================
    // BOOKS
    // =========================================================================

    /// Search books, each with its genres
    pub async fn list_books(&self, query: &BookQuery) -> AppResult<(Vec<BookWithGenres>, i64)> {
        let (books, total) = self.repository.books.search(query).await?;

        let mut genre_ids: Vec<Uuid> = books.iter().flat_map(|b| b.genre_ids.clone()).collect();
        genre_ids.sort();
        genre_ids.dedup();
        let genres = self.repository.genres.summaries(&genre_ids).await?;

        Ok((attach_genres(books, &genres), total))
    }

    /// Get a book with genres, reviews and waitlist
    pub async fn get_book(&self, id: Uuid) -> AppResult<BookDetails> {
        let book = self.repository.books.get_by_id(id).await?;
        let genres = self.repository.genres.summaries(&book.genre_ids).await?;
        let reviews: Vec<ReviewDetails> = self
            .repository
            .reviews
            .list(ReviewFilter {
                book: Some(book.id),
                member: None,
            })
            .await?;
        let waitlist = self.repository.waitlists.get_by_book(book.id).await?;

        Ok(BookDetails {
            book,
            genres,
            reviews,
            waitlist,
        })
    }

    /// Add a book; all of its copies start on the shelf
    pub async fn add_book(&self, input: CreateBook) -> AppResult<Book> {
        input.validate()?;
        self.repository.genres.ensure_exist(&input.genres).await?;

        let mut tx = self.repository.begin().await?;
        let book_id = self.repository.counters.next_book_ids(&mut *tx, 1).await?;
        let book = self.repository.books.create(&mut *tx, book_id, &input).await?;
        tx.commit().await?;

        tracing::info!(book_id = book.book_id, title = %book.title, "Book added");
        Ok(book)
    }

    /// Add several books with consecutive numbers, all or nothing
    pub async fn add_books(&self, inputs: Vec<CreateBook>) -> AppResult<Vec<Book>> {
        if inputs.is_empty() {
            return Err(AppError::Validation("No books to add".to_string()));
        }
        for input in &inputs {
            input.validate()?;
        }
        let mut genre_ids: Vec<Uuid> = inputs.iter().flat_map(|b| b.genres.clone()).collect();
        genre_ids.sort();
        genre_ids.dedup();
        self.repository.genres.ensure_exist(&genre_ids).await?;

        let count = i32::try_from(inputs.len())
            .map_err(|_| AppError::Validation("Too many books in one request".to_string()))?;

        let mut tx = self.repository.begin().await?;
        let first = self.repository.counters.next_book_ids(&mut *tx, count).await?;

        let mut books = Vec::with_capacity(inputs.len());
        for (offset, input) in (0..count).zip(inputs.iter()) {
            books.push(
                self.repository
                    .books
                    .create(&mut *tx, first + offset, input)
                    .await?,
            );
        }
        tx.commit().await?;

        tracing::info!(count, first_book_id = first, "Books added");
        Ok(books)
    }

    /// Update a book; stock changes move availability by the same delta
    pub async fn update_book(&self, id: Uuid, patch: UpdateBook) -> AppResult<Book> {
        patch.validate()?;
        if let Some(ref genres) = patch.genres {
            self.repository.genres.ensure_exist(genres).await?;
        }

        let mut tx = self.repository.begin().await?;
        let current = self.repository.books.lock(&mut *tx, id).await?;

        let available = match patch.total_copies {
            Some(total) => current.available_after_restock(total)?,
            None => current.available_copies,
        };

        let updated = self
            .repository
            .books
            .update(&mut *tx, id, &patch, available)
            .await?;
        tx.commit().await?;

        if !current.is_available() && updated.is_available() {
            self.waitlist.spawn_notification(updated.id);
        }

        Ok(updated)
    }

    /// Delete a book together with its reviews, waitlist and issues
    pub async fn delete_book(&self, id: Uuid) -> AppResult<()> {
        let mut tx = self.repository.begin().await?;
        let book = self.repository.books.lock(&mut *tx, id).await?;

        let reviews = self.repository.reviews.delete_for_book(&mut *tx, id).await?;
        let waitlists = self.repository.waitlists.delete_for_book(&mut *tx, id).await?;
        let issues = self.repository.issues.delete_for_book(&mut *tx, id).await?;
        self.repository.books.delete(&mut *tx, id).await?;

        tx.commit().await?;

        tracing::info!(
            book_id = book.book_id,
            reviews,
            waitlists,
            issues,
            "Book deleted"
        );
        Ok(())
    }

    // =========================================================================
    // GENRES
    // =========================================================================

    pub async fn list_genres(&self, query: &GenreQuery) -> AppResult<(Vec<Genre>, i64)> {
        self.repository.genres.list(query).await
    }

    pub async fn get_genre(&self, id: Uuid) -> AppResult<Genre> {
        self.repository.genres.get_by_id(id).await
    }

    pub async fn add_genre(&self, input: CreateGenre) -> AppResult<Genre> {
        input.validate()?;
        check_slug(&input.slug)?;
        self.repository.genres.create(&input).await
    }

    pub async fn update_genre(&self, id: Uuid, patch: UpdateGenre) -> AppResult<Genre> {
        patch.validate()?;
        if let Some(ref slug) = patch.slug {
            check_slug(slug)?;
        }
        self.repository.genres.update(id, &patch).await
    }

    /// Delete a genre no book refers to
    pub async fn delete_genre(&self, id: Uuid) -> AppResult<()> {
        let genre = self.repository.genres.get_by_id(id).await?;
        if self.repository.books.any_with_genre(genre.id).await? {
            return Err(AppError::Conflict(format!(
                "Genre '{}' is still used by some books",
                genre.genre_name
            )));
        }
        self.repository.genres.delete(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn genre(name: &str) -> GenreSummary {
        GenreSummary {
            id: Uuid::new_v4(),
            genre_name: name.to_string(),
            slug: name.to_lowercase(),
            image_url: format!("{}.png", name),
        }
    }

    fn book(genre_ids: Vec<Uuid>) -> Book {
        Book {
            id: Uuid::new_v4(),
            book_id: 100,
            cover_img: "cover.jpg".to_string(),
            title: "Lalsalu".to_string(),
            author: "Syed Waliullah".to_string(),
            publisher: None,
            genre_ids,
            publication_date: None,
            book_language: "bangla".to_string(),
            page_count: Some(120),
            summary: None,
            total_copies: 2,
            available_copies: 2,
            borrow_count: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_attach_genres() {
        let (novel, poetry) = (genre("Novel"), genre("Poetry"));
        let missing = Uuid::new_v4();
        let books = vec![
            book(vec![poetry.id, novel.id]),
            book(vec![missing]),
        ];

        let result = attach_genres(books, &[novel.clone(), poetry.clone()]);
        let names: Vec<&str> = result[0].genres.iter().map(|g| g.genre_name.as_str()).collect();
        assert_eq!(names, vec!["Poetry", "Novel"]);
        assert!(result[1].genres.is_empty());
    }

    #[test]
    fn test_check_slug() {
        assert!(check_slug("thriller").is_ok());
        assert!(matches!(check_slug("Thriller"), Err(AppError::Validation(_))));
    }
}
