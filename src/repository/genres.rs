//! Genres repository

use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        genre::{CreateGenre, Genre, GenreQuery, GenreSummary, UpdateGenre},
        pagination::{order_by, Page},
    },
};

const SORTABLE_FIELDS: &[(&str, &str)] = &[
    ("genre_name", "genre_name"),
    ("slug", "slug"),
    ("created_at", "created_at"),
];

const DUPLICATE_GENRE: &str = "A genre with this name or slug already exists";

#[derive(Clone)]
pub struct GenresRepository {
    pool: Pool<Postgres>,
}

impl GenresRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn list(&self, query: &GenreQuery) -> AppResult<(Vec<Genre>, i64)> {
        let page = Page::new(query.page, query.per_page);

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM genres")
            .fetch_one(&self.pool)
            .await?;

        let sql = format!(
            "SELECT * FROM genres ORDER BY {}, id LIMIT $1 OFFSET $2",
            order_by(query.sort.as_deref(), SORTABLE_FIELDS, "genre_name ASC")
        );
        let genres = sqlx::query_as::<_, Genre>(&sql)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok((genres, total))
    }

    pub async fn get_by_id(&self, id: Uuid) -> AppResult<Genre> {
        sqlx::query_as::<_, Genre>("SELECT * FROM genres WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("No genre found with that ID".to_string()))
    }

    /// Genres referenced by a book, in name order
    pub async fn summaries(&self, ids: &[Uuid]) -> AppResult<Vec<GenreSummary>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let genres = sqlx::query_as::<_, GenreSummary>(
            "SELECT id, genre_name, slug, image_url FROM genres WHERE id = ANY($1) ORDER BY genre_name",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(genres)
    }

    /// Fail with NotFound unless every id names an existing genre
    pub async fn ensure_exist(&self, ids: &[Uuid]) -> AppResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let found: i64 =
            sqlx::query_scalar("SELECT COUNT(DISTINCT id) FROM genres WHERE id = ANY($1)")
                .bind(ids)
                .fetch_one(&self.pool)
                .await?;

        let mut distinct = ids.to_vec();
        distinct.sort();
        distinct.dedup();
        if found != distinct.len() as i64 {
            return Err(AppError::NotFound(
                "One or more genres do not exist".to_string(),
            ));
        }
        Ok(())
    }

    pub async fn create(&self, genre: &CreateGenre) -> AppResult<Genre> {
        sqlx::query_as::<_, Genre>(
            r#"
            INSERT INTO genres (id, genre_name, slug, image_url)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(genre.genre_name.trim())
        .bind(&genre.slug)
        .bind(&genre.image_url)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::conflict_on_unique(e, DUPLICATE_GENRE))
    }

    pub async fn update(&self, id: Uuid, patch: &UpdateGenre) -> AppResult<Genre> {
        sqlx::query_as::<_, Genre>(
            r#"
            UPDATE genres SET
                genre_name = COALESCE($2, genre_name),
                slug = COALESCE($3, slug),
                image_url = COALESCE($4, image_url),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(patch.genre_name.as_deref().map(str::trim))
        .bind(&patch.slug)
        .bind(&patch.image_url)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::conflict_on_unique(e, DUPLICATE_GENRE))?
        .ok_or_else(|| AppError::NotFound("No genre found with that ID".to_string()))
    }

    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM genres WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("No genre found with that ID".to_string()));
        }
        Ok(())
    }
}
