//! Review model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::user::User;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Review {
    pub id: Uuid,
    pub book_id: Uuid,
    pub member_id: Uuid,
    pub ratings: i16,
    pub review: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Review {
    /// Only the author may edit a review
    pub fn ensure_can_edit(&self, user: &User) -> AppResult<()> {
        if self.member_id == user.id {
            Ok(())
        } else {
            Err(AppError::Authorization(
                "You are not authorized to update this review".to_string(),
            ))
        }
    }

    /// The author or any librarian may delete a review
    pub fn ensure_can_delete(&self, user: &User) -> AppResult<()> {
        if self.member_id == user.id || user.is_librarian() {
            Ok(())
        } else {
            Err(AppError::Authorization(
                "You are not authorized to delete this review".to_string(),
            ))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReviewBook {
    pub id: Uuid,
    pub title: String,
    pub cover_img: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReviewMember {
    pub id: Uuid,
    pub name: String,
    pub photo: Option<String>,
}

/// Review with book and member populated
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReviewDetails {
    pub id: Uuid,
    pub book: ReviewBook,
    pub member: ReviewMember,
    pub ratings: i16,
    pub review: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ReviewDetailsRow {
    id: Uuid,
    ratings: i16,
    review: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    book_uuid: Uuid,
    book_title: String,
    book_cover_img: String,
    member_uuid: Uuid,
    member_name: String,
    member_photo: Option<String>,
}

impl From<ReviewDetailsRow> for ReviewDetails {
    fn from(row: ReviewDetailsRow) -> Self {
        ReviewDetails {
            id: row.id,
            book: ReviewBook {
                id: row.book_uuid,
                title: row.book_title,
                cover_img: row.book_cover_img,
            },
            member: ReviewMember {
                id: row.member_uuid,
                name: row.member_name,
                photo: row.member_photo,
            },
            ratings: row.ratings,
            review: row.review,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateReview {
    pub book: Uuid,
    #[validate(range(min = 1, max = 5, message = "Ratings must be between 1 and 5"))]
    pub ratings: i16,
    #[validate(length(min = 1, message = "Review text is required"))]
    pub review: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateReview {
    #[validate(range(min = 1, max = 5, message = "Ratings must be between 1 and 5"))]
    pub ratings: Option<i16>,
    #[validate(length(min = 1, message = "Review text cannot be empty"))]
    pub review: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::{Gender, Role};

    fn user(role: Role) -> User {
        User {
            id: Uuid::new_v4(),
            user_id: 101,
            name: "Nasrin".to_string(),
            email: "nasrin@example.com".to_string(),
            gender: Gender::Female,
            birth_date: None,
            role,
            contact_number: None,
            photo: None,
            password: String::new(),
            is_verified: true,
            verify_token: None,
            verify_expires: None,
            password_reset_token: None,
            password_reset_expires: None,
            password_changed_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn review_by(member: &User) -> Review {
        Review {
            id: Uuid::new_v4(),
            book_id: Uuid::new_v4(),
            member_id: member.id,
            ratings: 4,
            review: "Loved it".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_only_author_edits() {
        let author = user(Role::Member);
        let review = review_by(&author);
        assert!(review.ensure_can_edit(&author).is_ok());
        assert!(review.ensure_can_edit(&user(Role::Member)).is_err());
        assert!(review.ensure_can_edit(&user(Role::Librarian)).is_err());
    }

    #[test]
    fn test_author_or_librarian_deletes() {
        let author = user(Role::Member);
        let review = review_by(&author);
        assert!(review.ensure_can_delete(&author).is_ok());
        assert!(review.ensure_can_delete(&user(Role::Librarian)).is_ok());
        assert!(matches!(
            review.ensure_can_delete(&user(Role::Member)),
            Err(AppError::Authorization(_))
        ));
    }

    #[test]
    fn test_ratings_range() {
        let bad = CreateReview {
            book: Uuid::new_v4(),
            ratings: 6,
            review: "Too good".to_string(),
        };
        assert!(bad.validate().is_err());

        let good = CreateReview {
            book: Uuid::new_v4(),
            ratings: 5,
            review: "Great".to_string(),
        };
        assert!(good.validate().is_ok());
    }
}
