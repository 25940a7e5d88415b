//! Overview service: read-only dashboard aggregates

use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{error::AppResult, models::user::User, repository::Repository};

/// Library-wide figures for the librarian dashboard
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LibraryOverview {
    pub total_books: i64,
    pub total_members: i64,
    pub total_reviews: i64,
    /// Every issue ever made (sum of borrow counts)
    pub total_issued_books: i64,
    /// Copies out on loan right now
    pub issued_books: i64,
    pub total_fine_collected: Decimal,
}

/// Figures for one member's dashboard
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MemberOverview {
    pub total_borrowed: i64,
    pub total_reviews: i64,
    pub currently_borrowed: i64,
    pub total_returned: i64,
    /// Open issues past their estimated return date
    pub delayed_books: i64,
    pub total_fine_paid: Decimal,
}

#[derive(Clone)]
pub struct OverviewService {
    repository: Repository,
}

impl OverviewService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn library(&self) -> AppResult<LibraryOverview> {
        let pool = &self.repository.pool;

        let (total_books, total_issued_books, issued_books): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COALESCE(SUM(borrow_count), 0)::BIGINT,
                   COALESCE(SUM(total_copies - available_copies), 0)::BIGINT
            FROM books
            "#,
        )
        .fetch_one(pool)
        .await?;

        let total_members: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = 'member'")
                .fetch_one(pool)
                .await?;

        let total_reviews: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reviews")
            .fetch_one(pool)
            .await?;

        let total_fine_collected: Decimal = sqlx::query_scalar(
            "SELECT COALESCE(SUM(delayed_fine), 0) FROM issues WHERE status = 'returned'",
        )
        .fetch_one(pool)
        .await?;

        Ok(LibraryOverview {
            total_books,
            total_members,
            total_reviews,
            total_issued_books,
            issued_books,
            total_fine_collected,
        })
    }

    pub async fn member(&self, user: &User) -> AppResult<MemberOverview> {
        let pool = &self.repository.pool;

        let (total_borrowed, currently_borrowed, total_returned, delayed_books, total_fine_paid): (
            i64,
            i64,
            i64,
            i64,
            Decimal,
        ) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COUNT(*) FILTER (WHERE status = 'issued'),
                   COUNT(*) FILTER (WHERE status = 'returned'),
                   COUNT(*) FILTER (WHERE status = 'issued' AND estimated_return_date < NOW()),
                   COALESCE(SUM(delayed_fine) FILTER (WHERE status = 'returned'), 0)
            FROM issues
            WHERE user_id = $1
            "#,
        )
        .bind(user.id)
        .fetch_one(pool)
        .await?;

        let total_reviews: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM reviews WHERE member_id = $1")
                .bind(user.id)
                .fetch_one(pool)
                .await?;

        Ok(MemberOverview {
            total_borrowed,
            total_reviews,
            currently_borrowed,
            total_returned,
            delayed_books,
            total_fine_paid,
        })
    }
}
