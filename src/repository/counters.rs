//! Counter repository: the single row seeding human-facing book/user numbers

use sqlx::{PgConnection, Pool, Postgres};

use crate::error::{AppError, AppResult};

pub const INITIAL_SEQUENCE: i32 = 100;

#[derive(Clone)]
pub struct CountersRepository {
    pool: Pool<Postgres>,
}

impl CountersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Insert the seed row unless it already exists
    pub async fn ensure_seeded(&self) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO counters (singleton, user_sequence, book_sequence)
            VALUES (TRUE, $1, $1)
            ON CONFLICT (singleton) DO NOTHING
            "#,
        )
        .bind(INITIAL_SEQUENCE)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Take the next user number
    pub async fn next_user_id(&self, conn: &mut PgConnection) -> AppResult<i32> {
        sqlx::query_scalar::<_, i32>(
            r#"
            UPDATE counters
            SET user_sequence = user_sequence + 1, updated_at = NOW()
            RETURNING user_sequence - 1
            "#,
        )
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::Internal("Counter record is missing".to_string()))
    }

    /// Reserve `count` consecutive book numbers and return the first one
    pub async fn next_book_ids(&self, conn: &mut PgConnection, count: i32) -> AppResult<i32> {
        sqlx::query_scalar::<_, i32>(
            r#"
            UPDATE counters
            SET book_sequence = book_sequence + $1, updated_at = NOW()
            RETURNING book_sequence - $1
            "#,
        )
        .bind(count)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::Internal("Counter record is missing".to_string()))
    }
}
