//! Repository layer for database operations
//!
//! Methods taking `&mut PgConnection` are meant to run inside a caller-owned
//! transaction; the others use the shared pool.

pub mod books;
pub mod counters;
pub mod genres;
pub mod issues;
pub mod reviews;
pub mod users;
pub mod waitlists;

use sqlx::{Pool, Postgres, Transaction};

use crate::error::AppResult;

/// Main repository struct holding database connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    pub counters: counters::CountersRepository,
    pub books: books::BooksRepository,
    pub genres: genres::GenresRepository,
    pub users: users::UsersRepository,
    pub issues: issues::IssuesRepository,
    pub reviews: reviews::ReviewsRepository,
    pub waitlists: waitlists::WaitlistsRepository,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            counters: counters::CountersRepository::new(pool.clone()),
            books: books::BooksRepository::new(pool.clone()),
            genres: genres::GenresRepository::new(pool.clone()),
            users: users::UsersRepository::new(pool.clone()),
            issues: issues::IssuesRepository::new(pool.clone()),
            reviews: reviews::ReviewsRepository::new(pool.clone()),
            waitlists: waitlists::WaitlistsRepository::new(pool.clone()),
            pool,
        }
    }

    /// Start a transaction on the shared pool
    pub async fn begin(&self) -> AppResult<Transaction<'static, Postgres>> {
        Ok(self.pool.begin().await?)
    }
}

/// Escape `%`, `_` and `\` so user input is matched literally by ILIKE
pub(crate) fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// Split a comma separated query value into trimmed, non-empty parts
pub(crate) fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
