//! Reviews repository

use sqlx::{PgConnection, Pool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::review::{CreateReview, Review, ReviewDetails, ReviewDetailsRow, UpdateReview},
};

const DETAILS_SELECT: &str = r#"
    SELECT r.id, r.ratings, r.review, r.created_at, r.updated_at,
           b.id AS book_uuid, b.title AS book_title, b.cover_img AS book_cover_img,
           u.id AS member_uuid, u.name AS member_name, u.photo AS member_photo
    FROM reviews r
    JOIN books b ON b.id = r.book_id
    JOIN users u ON u.id = r.member_id
"#;

/// Restricts a review listing to one book and/or one member
#[derive(Debug, Default, Clone, Copy)]
pub struct ReviewFilter {
    pub book: Option<Uuid>,
    pub member: Option<Uuid>,
}

#[derive(Clone)]
pub struct ReviewsRepository {
    pool: Pool<Postgres>,
}

impl ReviewsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn get_by_id(&self, id: Uuid) -> AppResult<Review> {
        sqlx::query_as::<_, Review>("SELECT * FROM reviews WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("No review found with that ID".to_string()))
    }

    pub async fn get_details(&self, id: Uuid) -> AppResult<ReviewDetails> {
        let sql = format!("{} WHERE r.id = $1", DETAILS_SELECT);
        let row = sqlx::query_as::<_, ReviewDetailsRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("No review found with that ID".to_string()))?;
        Ok(row.into())
    }

    /// Insert a review; a second review of the same book by the same member is a conflict
    pub async fn create(&self, member_id: Uuid, review: &CreateReview) -> AppResult<Review> {
        sqlx::query_as::<_, Review>(
            r#"
            INSERT INTO reviews (id, book_id, member_id, ratings, review)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(review.book)
        .bind(member_id)
        .bind(review.ratings)
        .bind(review.review.trim())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::conflict_on_unique(e, "You have already reviewed this book"))
    }

    pub async fn update(&self, id: Uuid, patch: &UpdateReview) -> AppResult<Review> {
        sqlx::query_as::<_, Review>(
            r#"
            UPDATE reviews SET
                ratings = COALESCE($2, ratings),
                review = COALESCE($3, review),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(patch.ratings)
        .bind(patch.review.as_deref().map(str::trim))
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("No review found with that ID".to_string()))
    }

    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM reviews WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("No review found with that ID".to_string()));
        }
        Ok(())
    }

    /// Reviews matching the filter, newest first
    pub async fn list(&self, filter: ReviewFilter) -> AppResult<Vec<ReviewDetails>> {
        let mut qb = QueryBuilder::<Postgres>::new(DETAILS_SELECT);
        qb.push(" WHERE TRUE");
        if let Some(book) = filter.book {
            qb.push(" AND r.book_id = ").push_bind(book);
        }
        if let Some(member) = filter.member {
            qb.push(" AND r.member_id = ").push_bind(member);
        }
        qb.push(" ORDER BY r.created_at DESC, r.id");

        let rows = qb
            .build_query_as::<ReviewDetailsRow>()
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(ReviewDetails::from).collect())
    }

    /// Remove every review of a book; returns the number removed
    pub async fn delete_for_book(&self, conn: &mut PgConnection, book_id: Uuid) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM reviews WHERE book_id = $1")
            .bind(book_id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected())
    }
}
