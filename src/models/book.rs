//! Book (catalog entry) model and related types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::{
    genre::GenreSummary,
    review::ReviewDetails,
    waitlist::Waitlist,
};
use crate::error::{AppError, AppResult};

/// Book model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: Uuid,
    /// Human-facing sequential number
    pub book_id: i32,
    pub cover_img: String,
    pub title: String,
    pub author: String,
    pub publisher: Option<String>,
    pub genre_ids: Vec<Uuid>,
    pub publication_date: Option<NaiveDate>,
    pub book_language: String,
    pub page_count: Option<i32>,
    pub summary: Option<String>,
    pub total_copies: i32,
    pub available_copies: i32,
    pub borrow_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Book {
    pub fn is_available(&self) -> bool {
        self.available_copies > 0
    }

    /// Available copies after changing the stock to `new_total`.
    ///
    /// Copies currently out on loan stay out, so availability shifts by the
    /// same delta as the total.
    pub fn available_after_restock(&self, new_total: i32) -> AppResult<i32> {
        let on_loan = self.total_copies - self.available_copies;
        let available = new_total - on_loan;
        if available < 0 {
            return Err(AppError::InvalidState(format!(
                "Cannot reduce total copies to {}: {} copies are currently issued",
                new_total, on_loan
            )));
        }
        Ok(available)
    }
}

/// Short book representation embedded in issues, reviews and waitlists
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BookSummary {
    pub id: Uuid,
    pub book_id: i32,
    pub title: String,
    pub author: String,
    pub cover_img: String,
}

/// Book with its genres populated (list view)
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BookWithGenres {
    #[serde(flatten)]
    pub book: Book,
    pub genres: Vec<GenreSummary>,
}

/// Book with genres, reviews and waitlist populated (detail view)
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BookDetails {
    #[serde(flatten)]
    pub book: Book,
    pub genres: Vec<GenreSummary>,
    pub reviews: Vec<ReviewDetails>,
    pub waitlist: Option<Waitlist>,
}

/// Book search query
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct BookQuery {
    /// Case-insensitive search in title and author
    pub search: Option<String>,
    /// Comma separated genre slugs
    pub genre: Option<String>,
    /// Comma separated languages
    pub language: Option<String>,
    /// Only books with at least one available copy
    pub available: Option<bool>,
    /// Comma separated fields, `-` prefix for descending order
    pub sort: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Create book request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[validate(length(min = 1, message = "Cover image is required"))]
    pub cover_img: String,
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "Author is required"))]
    pub author: String,
    pub publisher: Option<String>,
    #[serde(default)]
    pub genres: Vec<Uuid>,
    pub publication_date: Option<NaiveDate>,
    #[validate(length(min = 1, message = "Book language is required"))]
    pub book_language: String,
    #[validate(range(min = 10, message = "Page count must be at least 10"))]
    pub page_count: Option<i32>,
    pub summary: Option<String>,
    #[validate(range(min = 1, message = "A book needs at least one copy"))]
    pub total_copies: i32,
}

/// Update book request
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateBook {
    #[validate(length(min = 1, message = "Cover image cannot be empty"))]
    pub cover_img: Option<String>,
    #[validate(length(min = 1, message = "Title cannot be empty"))]
    pub title: Option<String>,
    #[validate(length(min = 1, message = "Author cannot be empty"))]
    pub author: Option<String>,
    pub publisher: Option<String>,
    pub genres: Option<Vec<Uuid>>,
    pub publication_date: Option<NaiveDate>,
    #[validate(length(min = 1, message = "Book language cannot be empty"))]
    pub book_language: Option<String>,
    #[validate(range(min = 10, message = "Page count must be at least 10"))]
    pub page_count: Option<i32>,
    pub summary: Option<String>,
    #[validate(range(min = 1, message = "A book needs at least one copy"))]
    pub total_copies: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book(total: i32, available: i32) -> Book {
        Book {
            id: Uuid::new_v4(),
            book_id: 100,
            cover_img: "cover.jpg".to_string(),
            title: "Padma Nadir Majhi".to_string(),
            author: "Manik Bandopadhyay".to_string(),
            publisher: None,
            genre_ids: vec![],
            publication_date: None,
            book_language: "bangla".to_string(),
            page_count: Some(180),
            summary: None,
            total_copies: total,
            available_copies: available,
            borrow_count: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_restock_keeps_issued_copies_out() {
        let b = book(5, 2);
        assert_eq!(b.available_after_restock(7).unwrap(), 4);
        assert_eq!(b.available_after_restock(3).unwrap(), 0);
    }

    #[test]
    fn test_restock_below_issued_copies_is_rejected() {
        let b = book(5, 2);
        assert!(matches!(
            b.available_after_restock(2),
            Err(AppError::InvalidState(_))
        ));
    }

    #[test]
    fn test_is_available() {
        assert!(book(1, 1).is_available());
        assert!(!book(1, 0).is_available());
    }

    #[test]
    fn test_create_book_validation() {
        let input = CreateBook {
            cover_img: "cover.jpg".to_string(),
            title: "Gitanjali".to_string(),
            author: "Rabindranath Tagore".to_string(),
            publisher: None,
            genres: vec![],
            publication_date: None,
            book_language: "bangla".to_string(),
            page_count: Some(5),
            summary: None,
            total_copies: 0,
        };
        let errors = input.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("page_count"));
        assert!(fields.contains_key("total_copies"));
    }
}
