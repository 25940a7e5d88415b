//! Circulation service: issuing and returning books

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        issue::{
            check_issue_eligibility, resolve_fine, Issue, IssueBookRequest, IssueDetails,
            IssueQuery, ReturnBookRequest,
        },
        user::User,
    },
    repository::Repository,
};

use super::waitlist::WaitlistService;

/// Result of a successful issue
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct IssueOutcome {
    pub issue: Issue,
    pub available_copies: i32,
    /// The borrower was waiting for this book and has been dequeued
    pub left_waitlist: bool,
}

/// Result of a successful return
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReturnOutcome {
    pub issue: Issue,
    pub available_copies: i32,
    /// Queued users are being told the book is back
    pub waitlist_notified: bool,
}

/// Reject due dates that do not come after the issue date
pub fn validate_due_date(
    issue_date: DateTime<Utc>,
    estimated_return_date: DateTime<Utc>,
) -> AppResult<()> {
    if estimated_return_date <= issue_date {
        return Err(AppError::Validation(
            "Estimated return date must be after the issue date".to_string(),
        ));
    }
    Ok(())
}

#[derive(Clone)]
pub struct CirculationService {
    repository: Repository,
    waitlist: WaitlistService,
    daily_fine: Decimal,
}

impl CirculationService {
    pub fn new(repository: Repository, waitlist: WaitlistService, daily_fine: Decimal) -> Self {
        Self {
            repository,
            waitlist,
            daily_fine,
        }
    }

    /// Lend a copy of a book to a user.
    ///
    /// The user and book rows are locked for the whole transaction, so the
    /// limit and availability checks cannot race with another issue.
    pub async fn issue_book(&self, request: IssueBookRequest) -> AppResult<IssueOutcome> {
        let issue_date = request.issue_date.unwrap_or_else(Utc::now);
        validate_due_date(issue_date, request.estimated_return_date)?;

        let mut tx = self.repository.begin().await?;

        let user = self.repository.users.lock(&mut *tx, request.user).await?;
        let book = self.repository.books.lock(&mut *tx, request.book).await?;

        let has_open = self
            .repository
            .issues
            .has_open(&mut *tx, user.id, book.id)
            .await?;
        let open_issues = self.repository.issues.count_open(&mut *tx, user.id).await?;
        check_issue_eligibility(has_open, book.available_copies, open_issues)?;

        let issue = self
            .repository
            .issues
            .create(
                &mut *tx,
                user.id,
                book.id,
                issue_date,
                request.estimated_return_date,
            )
            .await?;

        let book = self
            .repository
            .books
            .take_copy(&mut *tx, book.id)
            .await?
            .ok_or_else(|| AppError::InvalidState("This book is not available".to_string()))?;

        let removal = self
            .repository
            .waitlists
            .remove_user(&mut *tx, book.id, user.id)
            .await?;

        tx.commit().await?;

        tracing::info!(
            book_id = book.book_id,
            user_id = user.user_id,
            available = book.available_copies,
            "Book issued"
        );

        Ok(IssueOutcome {
            issue,
            available_copies: book.available_copies,
            left_waitlist: removal.removed(),
        })
    }

    /// Take a copy back and close the open issue
    pub async fn return_book(&self, request: ReturnBookRequest) -> AppResult<ReturnOutcome> {
        let return_date = request.return_date.unwrap_or_else(Utc::now);

        let mut tx = self.repository.begin().await?;

        let open = self
            .repository
            .issues
            .lock_open(&mut *tx, request.user, request.book)
            .await?
            .ok_or_else(|| {
                AppError::NotFound("This book is not issued to this user".to_string())
            })?;

        if return_date < open.issue_date {
            return Err(AppError::Validation(
                "Return date cannot be before the issue date".to_string(),
            ));
        }

        let fine = resolve_fine(
            request.delayed_fine,
            open.estimated_return_date,
            return_date,
            self.daily_fine,
        )?;

        let issue = self
            .repository
            .issues
            .close(&mut *tx, open.id, return_date, fine)
            .await?;

        let book = self
            .repository
            .books
            .put_back_copy(&mut *tx, request.book)
            .await?
            .ok_or_else(|| {
                AppError::InvalidState(
                    "All copies of this book are already in the library".to_string(),
                )
            })?;

        tx.commit().await?;

        tracing::info!(
            book_id = book.book_id,
            issue_id = %issue.id,
            fine = %fine,
            available = book.available_copies,
            "Book returned"
        );

        // Only the transition from none to one copy is worth a notice
        let waitlist_notified = book.available_copies == 1;
        if waitlist_notified {
            self.waitlist.spawn_notification(book.id);
        }

        Ok(ReturnOutcome {
            issue,
            available_copies: book.available_copies,
            waitlist_notified,
        })
    }

    pub async fn list_issues(&self, query: &IssueQuery) -> AppResult<(Vec<IssueDetails>, i64)> {
        self.repository.issues.search(query).await
    }

    /// Issues of one user; any `user` filter in the query is overridden
    pub async fn my_issues(
        &self,
        user: &User,
        mut query: IssueQuery,
    ) -> AppResult<(Vec<IssueDetails>, i64)> {
        query.user = Some(user.id);
        self.repository.issues.search(&query).await
    }

    /// Open issue by the human-facing book and user numbers
    pub async fn get_open_issue(&self, book_number: i32, user_number: i32) -> AppResult<IssueDetails> {
        self.repository
            .issues
            .get_open_by_numbers(book_number, user_number)
            .await
    }

    pub async fn get_issue(&self, id: Uuid) -> AppResult<IssueDetails> {
        self.repository.issues.get_details(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_due_date_must_follow_issue_date() {
        let now = Utc::now();
        assert!(validate_due_date(now, now + Duration::days(14)).is_ok());
        assert!(matches!(
            validate_due_date(now, now),
            Err(AppError::Validation(_))
        ));
        assert!(validate_due_date(now, now - Duration::days(1)).is_err());
    }
}
