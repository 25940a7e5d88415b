//! Genre model

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

static SLUG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("valid slug regex"));

/// Lowercase kebab-case, e.g. `science-fiction`
pub fn is_valid_slug(slug: &str) -> bool {
    SLUG_RE.is_match(slug)
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Genre {
    pub id: Uuid,
    pub genre_name: String,
    pub slug: String,
    pub image_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct GenreSummary {
    pub id: Uuid,
    pub genre_name: String,
    pub slug: String,
    pub image_url: String,
}

#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct GenreQuery {
    pub sort: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateGenre {
    #[validate(length(min = 1, message = "Genre name is required"))]
    pub genre_name: String,
    #[validate(length(min = 1, message = "Genre slug is required"))]
    pub slug: String,
    #[validate(length(min = 1, message = "Genre image is required"))]
    pub image_url: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateGenre {
    #[validate(length(min = 1, message = "Genre name cannot be empty"))]
    pub genre_name: Option<String>,
    pub slug: Option<String>,
    #[validate(length(min = 1, message = "Genre image cannot be empty"))]
    pub image_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_format() {
        assert!(is_valid_slug("science-fiction"));
        assert!(is_valid_slug("poetry"));
        assert!(!is_valid_slug("Science Fiction"));
        assert!(!is_valid_slug("-poetry"));
        assert!(!is_valid_slug("poetry--old"));
        assert!(!is_valid_slug(""));
    }
}
