//! Issues repository for database operations

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, Pool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        issue::{Issue, IssueDetails, IssueDetailsRow, IssueQuery, IssueStatus},
        pagination::{order_by, Page},
    },
};

const SORTABLE_FIELDS: &[(&str, &str)] = &[
    ("issue_date", "i.issue_date"),
    ("estimated_return_date", "i.estimated_return_date"),
    ("return_date", "i.return_date"),
    ("status", "i.status"),
    ("delayed_fine", "i.delayed_fine"),
    ("created_at", "i.created_at"),
];

const DETAILS_SELECT: &str = r#"
    SELECT i.id, i.issue_date, i.estimated_return_date, i.return_date, i.status, i.delayed_fine,
           u.id AS user_uuid, u.user_id AS user_number, u.name AS user_name, u.photo AS user_photo,
           b.id AS book_uuid, b.book_id AS book_number, b.title AS book_title,
           b.author AS book_author, b.cover_img AS book_cover_img
    FROM issues i
    JOIN users u ON u.id = i.user_id
    JOIN books b ON b.id = i.book_id
"#;

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, query: &IssueQuery) {
    qb.push(" WHERE TRUE");

    if let Some(status) = query.status {
        qb.push(" AND i.status = ").push_bind(status.as_str());
    }
    if let Some(user) = query.user {
        qb.push(" AND i.user_id = ").push_bind(user);
    }
    if let Some(book) = query.book {
        qb.push(" AND i.book_id = ").push_bind(book);
    }
}

#[derive(Clone)]
pub struct IssuesRepository {
    pool: Pool<Postgres>,
}

impl IssuesRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Whether the user currently holds this book
    pub async fn has_open(
        &self,
        conn: &mut PgConnection,
        user_id: Uuid,
        book_id: Uuid,
    ) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM issues WHERE user_id = $1 AND book_id = $2 AND status = 'issued')",
        )
        .bind(user_id)
        .bind(book_id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(exists)
    }

    /// Number of books the user currently holds
    pub async fn count_open(&self, conn: &mut PgConnection, user_id: Uuid) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM issues WHERE user_id = $1 AND status = 'issued'",
        )
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(count)
    }

    pub async fn create(
        &self,
        conn: &mut PgConnection,
        user_id: Uuid,
        book_id: Uuid,
        issue_date: DateTime<Utc>,
        estimated_return_date: DateTime<Utc>,
    ) -> AppResult<Issue> {
        sqlx::query_as::<_, Issue>(
            r#"
            INSERT INTO issues (id, user_id, book_id, issue_date, estimated_return_date, status, delayed_fine)
            VALUES ($1, $2, $3, $4, $5, $6, 0)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(book_id)
        .bind(issue_date)
        .bind(estimated_return_date)
        .bind(IssueStatus::Issued)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| {
            AppError::conflict_on_unique(e, "This book is already issued to this user")
        })
    }

    /// Lock the open issue for (user, book)
    pub async fn lock_open(
        &self,
        conn: &mut PgConnection,
        user_id: Uuid,
        book_id: Uuid,
    ) -> AppResult<Option<Issue>> {
        let issue = sqlx::query_as::<_, Issue>(
            r#"
            SELECT * FROM issues
            WHERE user_id = $1 AND book_id = $2 AND status = 'issued'
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(issue)
    }

    /// Close an issue as returned
    pub async fn close(
        &self,
        conn: &mut PgConnection,
        id: Uuid,
        return_date: DateTime<Utc>,
        delayed_fine: Decimal,
    ) -> AppResult<Issue> {
        sqlx::query_as::<_, Issue>(
            r#"
            UPDATE issues SET
                status = $2,
                return_date = $3,
                delayed_fine = $4,
                updated_at = NOW()
            WHERE id = $1 AND status = 'issued'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(IssueStatus::Returned)
        .bind(return_date)
        .bind(delayed_fine)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("No open issue found".to_string()))
    }

    /// Search issues with filters, sorting and pagination
    pub async fn search(&self, query: &IssueQuery) -> AppResult<(Vec<IssueDetails>, i64)> {
        let page = Page::new(query.page, query.per_page);

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM issues i");
        push_filters(&mut count, query);
        let total = count
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut select = QueryBuilder::<Postgres>::new(DETAILS_SELECT);
        push_filters(&mut select, query);
        select
            .push(" ORDER BY ")
            .push(order_by(query.sort.as_deref(), SORTABLE_FIELDS, "i.issue_date DESC"))
            .push(", i.id LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows = select
            .build_query_as::<IssueDetailsRow>()
            .fetch_all(&self.pool)
            .await?;

        Ok((rows.into_iter().map(IssueDetails::from).collect(), total))
    }

    /// Open issue looked up by the human-facing book and user numbers
    pub async fn get_open_by_numbers(
        &self,
        book_number: i32,
        user_number: i32,
    ) -> AppResult<IssueDetails> {
        let sql = format!(
            "{} WHERE b.book_id = $1 AND u.user_id = $2 AND i.status = 'issued'",
            DETAILS_SELECT
        );
        let row = sqlx::query_as::<_, IssueDetailsRow>(&sql)
            .bind(book_number)
            .bind(user_number)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(
                    "No open issue found for this book and user".to_string(),
                )
            })?;
        Ok(row.into())
    }

    pub async fn get_details(&self, id: Uuid) -> AppResult<IssueDetails> {
        let sql = format!("{} WHERE i.id = $1", DETAILS_SELECT);
        let row = sqlx::query_as::<_, IssueDetailsRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("No issue found with that ID".to_string()))?;
        Ok(row.into())
    }

    /// Remove every issue of a book; returns the number removed
    pub async fn delete_for_book(&self, conn: &mut PgConnection, book_id: Uuid) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM issues WHERE book_id = $1")
            .bind(book_id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected())
    }
}
