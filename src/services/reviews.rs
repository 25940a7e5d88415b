//! Review service

use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppResult,
    models::{
        review::{CreateReview, ReviewDetails, UpdateReview},
        user::User,
    },
    repository::{reviews::ReviewFilter, Repository},
};

#[derive(Clone)]
pub struct ReviewsService {
    repository: Repository,
}

impl ReviewsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Add a review; each member reviews a book at most once
    pub async fn add(&self, member: &User, input: CreateReview) -> AppResult<ReviewDetails> {
        input.validate()?;
        let book = self.repository.books.get_by_id(input.book).await?;

        let review = self.repository.reviews.create(member.id, &input).await?;

        tracing::info!(
            book_id = book.book_id,
            user_id = member.user_id,
            ratings = review.ratings,
            "Review added"
        );
        self.repository.reviews.get_details(review.id).await
    }

    pub async fn list(&self) -> AppResult<Vec<ReviewDetails>> {
        self.repository.reviews.list(ReviewFilter::default()).await
    }

    pub async fn for_member(&self, member: &User) -> AppResult<Vec<ReviewDetails>> {
        self.repository
            .reviews
            .list(ReviewFilter {
                book: None,
                member: Some(member.id),
            })
            .await
    }

    pub async fn for_book(&self, book_id: Uuid) -> AppResult<Vec<ReviewDetails>> {
        let book = self.repository.books.get_by_id(book_id).await?;
        self.repository
            .reviews
            .list(ReviewFilter {
                book: Some(book.id),
                member: None,
            })
            .await
    }

    pub async fn get(&self, id: Uuid) -> AppResult<ReviewDetails> {
        self.repository.reviews.get_details(id).await
    }

    /// Only the author may change a review
    pub async fn update(
        &self,
        user: &User,
        id: Uuid,
        patch: UpdateReview,
    ) -> AppResult<ReviewDetails> {
        let review = self.repository.reviews.get_by_id(id).await?;
        review.ensure_can_edit(user)?;
        patch.validate()?;

        self.repository.reviews.update(id, &patch).await?;
        self.repository.reviews.get_details(id).await
    }

    /// The author or a librarian may delete a review
    pub async fn delete(&self, user: &User, id: Uuid) -> AppResult<()> {
        let review = self.repository.reviews.get_by_id(id).await?;
        review.ensure_can_delete(user)?;

        self.repository.reviews.delete(id).await?;
        tracing::info!(review_id = %id, by = user.user_id, "Review deleted");
        Ok(())
    }
}
