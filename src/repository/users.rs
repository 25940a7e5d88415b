//! Users repository for database operations

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, Pool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::like_pattern;
use crate::{
    error::{AppError, AppResult},
    models::{
        pagination::{order_by, Page},
        user::{Gender, Role, UpdateProfile, User, UserQuery},
    },
};

const SORTABLE_FIELDS: &[(&str, &str)] = &[
    ("name", "name"),
    ("email", "email"),
    ("user_id", "user_id"),
    ("role", "role"),
    ("created_at", "created_at"),
];

const DUPLICATE_EMAIL: &str = "An account with this email already exists";

/// Fields of a freshly signed up account
pub struct NewUser<'a> {
    pub user_id: i32,
    pub name: &'a str,
    pub email: &'a str,
    pub gender: Gender,
    pub password_hash: &'a str,
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, query: &UserQuery) {
    qb.push(" WHERE TRUE");

    if let Some(role) = query.role {
        qb.push(" AND role = ").push_bind(role.as_str());
    }
    if let Some(is_verified) = query.is_verified {
        qb.push(" AND is_verified = ").push_bind(is_verified);
    }
    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = like_pattern(search);
        qb.push(" AND (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR email ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

#[derive(Clone)]
pub struct UsersRepository {
    pool: Pool<Postgres>,
}

impl UsersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: Uuid) -> AppResult<User> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("No user found with that ID".to_string()))
    }

    pub async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// Get user by email (case-insensitive)
    pub async fn get_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
            .bind(email.trim())
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// Check if email already exists
    pub async fn email_exists(&self, email: &str) -> AppResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(email) = LOWER($1))")
                .bind(email.trim())
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    /// Lock a user row so concurrent issues for the same user serialize
    pub async fn lock(&self, conn: &mut PgConnection, id: Uuid) -> AppResult<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| AppError::NotFound("No user found with that ID".to_string()))
    }

    /// Insert a new unverified member
    pub async fn create(&self, conn: &mut PgConnection, user: NewUser<'_>) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, user_id, name, email, gender, role, password, is_verified)
            VALUES ($1, $2, $3, LOWER($4), $5, $6, $7, FALSE)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user.user_id)
        .bind(user.name.trim())
        .bind(user.email.trim())
        .bind(user.gender)
        .bind(Role::Member)
        .bind(user.password_hash)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| AppError::conflict_on_unique(e, DUPLICATE_EMAIL))
    }

    /// Store the hash of a verification token, or clear it with `None`
    pub async fn set_verify_token(
        &self,
        id: Uuid,
        token: Option<(&str, DateTime<Utc>)>,
    ) -> AppResult<()> {
        sqlx::query(
            "UPDATE users SET verify_token = $2, verify_expires = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(token.map(|(hash, _)| hash))
        .bind(token.map(|(_, expires)| expires))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Mark the holder of an unexpired verification token as verified.
    ///
    /// The token is consumed in the same statement.
    pub async fn verify_by_token(&self, token_hash: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET
                is_verified = TRUE,
                verify_token = NULL,
                verify_expires = NULL,
                updated_at = NOW()
            WHERE verify_token = $1 AND verify_expires > NOW()
            RETURNING *
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// Store the hash of a password reset token, or clear it with `None`
    pub async fn set_reset_token(
        &self,
        id: Uuid,
        token: Option<(&str, DateTime<Utc>)>,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE users SET
                password_reset_token = $2,
                password_reset_expires = $3,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(token.map(|(hash, _)| hash))
        .bind(token.map(|(_, expires)| expires))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Set a new password through an unexpired reset token, consuming it.
    ///
    /// Lookup and update are one statement, so a token can only be used once
    /// even by concurrent requests.
    pub async fn reset_password_by_token(
        &self,
        token_hash: &str,
        password_hash: &str,
    ) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET
                password = $2,
                password_changed_at = NOW() - INTERVAL '1 second',
                password_reset_token = NULL,
                password_reset_expires = NULL,
                updated_at = NOW()
            WHERE password_reset_token = $1 AND password_reset_expires > NOW()
            RETURNING *
            "#,
        )
        .bind(token_hash)
        .bind(password_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// Replace the password hash and consume any reset token.
    ///
    /// `password_changed_at` is backdated one second so a session issued
    /// right after the change is still accepted.
    pub async fn update_password(&self, id: Uuid, password_hash: &str) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET
                password = $2,
                password_changed_at = NOW() - INTERVAL '1 second',
                password_reset_token = NULL,
                password_reset_expires = NULL,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(password_hash)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("No user found with that ID".to_string()))
    }

    /// Update own profile fields
    pub async fn update_profile(&self, id: Uuid, profile: &UpdateProfile) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET
                name = COALESCE($2, name),
                gender = COALESCE($3, gender),
                birth_date = COALESCE($4, birth_date),
                contact_number = COALESCE($5, contact_number),
                photo = COALESCE($6, photo),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(profile.name.as_deref().map(str::trim))
        .bind(profile.gender)
        .bind(profile.birth_date)
        .bind(&profile.contact_number)
        .bind(&profile.photo)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("No user found with that ID".to_string()))
    }

    pub async fn update_role(&self, id: Uuid, role: Role) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            "UPDATE users SET role = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(role)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("No user found with that ID".to_string()))
    }

    /// Search users with filters, sorting and pagination
    pub async fn search(&self, query: &UserQuery) -> AppResult<(Vec<User>, i64)> {
        let page = Page::new(query.page, query.per_page);

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users");
        push_filters(&mut count, query);
        let total = count
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut select = QueryBuilder::<Postgres>::new("SELECT * FROM users");
        push_filters(&mut select, query);
        select
            .push(" ORDER BY ")
            .push(order_by(query.sort.as_deref(), SORTABLE_FIELDS, "created_at DESC"))
            .push(", id LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let users = select.build_query_as::<User>().fetch_all(&self.pool).await?;

        Ok((users, total))
    }
}
