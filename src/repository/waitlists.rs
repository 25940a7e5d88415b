//! Waitlists repository
//!
//! One row per book, holding the queue of waiting users oldest first. The
//! row exists only while the queue is non-empty.

use sqlx::{PgConnection, Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        pagination::{order_by, Page},
        waitlist::{
            AvailabilityNotice, Waitlist, WaitlistDetails, WaitlistDetailsRow, WaitlistQuery,
            WaitlistRemoval,
        },
    },
};

const SORTABLE_FIELDS: &[(&str, &str)] = &[
    ("created_at", "w.created_at"),
    ("updated_at", "w.updated_at"),
    ("title", "b.title"),
];

const DETAILS_SELECT: &str = r#"
    SELECT w.id, w.waiting_list, w.created_at, w.updated_at,
           b.id AS book_uuid, b.book_id AS book_number, b.title AS book_title,
           b.author AS book_author, b.cover_img AS book_cover_img
    FROM waitlists w
    JOIN books b ON b.id = w.book_id
"#;

#[derive(Clone)]
pub struct WaitlistsRepository {
    pool: Pool<Postgres>,
}

impl WaitlistsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn get_by_book(&self, book_id: Uuid) -> AppResult<Option<Waitlist>> {
        let waitlist = sqlx::query_as::<_, Waitlist>("SELECT * FROM waitlists WHERE book_id = $1")
            .bind(book_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(waitlist)
    }

    /// Whether the user is queued for the book
    pub async fn is_queued(
        &self,
        conn: &mut PgConnection,
        book_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<bool> {
        let queued: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM waitlists WHERE book_id = $1 AND $2 = ANY(waiting_list))",
        )
        .bind(book_id)
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(queued)
    }

    /// Append a user to the end of the book's queue, creating it if needed
    pub async fn enqueue(
        &self,
        conn: &mut PgConnection,
        book_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<Waitlist> {
        let waitlist = sqlx::query_as::<_, Waitlist>(
            r#"
            INSERT INTO waitlists (id, book_id, waiting_list)
            VALUES ($1, $2, ARRAY[$3]::uuid[])
            ON CONFLICT (book_id) DO UPDATE
                SET waiting_list = array_append(waitlists.waiting_list, $3),
                    updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(book_id)
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(waitlist)
    }

    /// Remove a user from the book's queue, deleting the queue once empty
    pub async fn remove_user(
        &self,
        conn: &mut PgConnection,
        book_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<WaitlistRemoval> {
        let waitlist = sqlx::query_as::<_, Waitlist>(
            "SELECT * FROM waitlists WHERE book_id = $1 FOR UPDATE",
        )
        .bind(book_id)
        .fetch_optional(&mut *conn)
        .await?;

        let Some(waitlist) = waitlist else {
            return Ok(WaitlistRemoval::NoWaitlist);
        };
        if !waitlist.contains(user_id) {
            return Ok(WaitlistRemoval::NotQueued);
        }

        let remaining = waitlist
            .waiting_list
            .iter()
            .filter(|id| **id != user_id)
            .count();

        if remaining == 0 {
            sqlx::query("DELETE FROM waitlists WHERE id = $1")
                .bind(waitlist.id)
                .execute(&mut *conn)
                .await?;
        } else {
            sqlx::query(
                r#"
                UPDATE waitlists
                SET waiting_list = array_remove(waiting_list, $2), updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(waitlist.id)
            .bind(user_id)
            .execute(&mut *conn)
            .await?;
        }

        Ok(WaitlistRemoval::Removed { remaining })
    }

    pub async fn delete_for_book(&self, conn: &mut PgConnection, book_id: Uuid) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM waitlists WHERE book_id = $1")
            .bind(book_id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected())
    }

    /// All waitlists with their books
    pub async fn list(&self, query: &WaitlistQuery) -> AppResult<(Vec<WaitlistDetails>, i64)> {
        let page = Page::new(query.page, query.per_page);

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM waitlists")
            .fetch_one(&self.pool)
            .await?;

        let sql = format!(
            "{} ORDER BY {}, w.id LIMIT $1 OFFSET $2",
            DETAILS_SELECT,
            order_by(query.sort.as_deref(), SORTABLE_FIELDS, "w.created_at DESC")
        );
        let rows = sqlx::query_as::<_, WaitlistDetailsRow>(&sql)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok((rows.into_iter().map(WaitlistDetails::from).collect(), total))
    }

    /// Waitlists the user is queued on
    pub async fn for_user(&self, user_id: Uuid) -> AppResult<Vec<WaitlistDetails>> {
        let sql = format!(
            "{} WHERE $1 = ANY(w.waiting_list) ORDER BY w.updated_at DESC",
            DETAILS_SELECT
        );
        let rows = sqlx::query_as::<_, WaitlistDetailsRow>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(WaitlistDetails::from).collect())
    }

    /// Book title and queued users' emails (queue order) for an availability notice
    pub async fn availability_notice(&self, book_id: Uuid) -> AppResult<Option<AvailabilityNotice>> {
        let row: Option<(String, Vec<String>)> = sqlx::query_as(
            r#"
            SELECT b.title,
                   ARRAY(
                       SELECT u.email
                       FROM UNNEST(w.waiting_list) WITH ORDINALITY AS q(id, position)
                       JOIN users u ON u.id = q.id
                       ORDER BY q.position
                   ) AS recipients
            FROM waitlists w
            JOIN books b ON b.id = w.book_id
            WHERE w.book_id = $1
            "#,
        )
        .bind(book_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row
            .filter(|(_, recipients)| !recipients.is_empty())
            .map(|(book_title, recipients)| AvailabilityNotice {
                book_title,
                recipients,
            }))
    }
}
