//! Waitlist service: queueing for unavailable books and "back in stock" notices

use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        user::User,
        waitlist::{Waitlist, WaitlistDetails, WaitlistQuery, WaitlistRemoval},
    },
    repository::Repository,
};

use super::email::EmailService;

#[derive(Clone)]
pub struct WaitlistService {
    repository: Repository,
    email: EmailService,
}

impl WaitlistService {
    pub fn new(repository: Repository, email: EmailService) -> Self {
        Self { repository, email }
    }

    /// Queue a user for a book that has no copy on the shelf
    pub async fn add(&self, user: &User, book_id: Uuid) -> AppResult<Waitlist> {
        let mut tx = self.repository.begin().await?;

        let book = self.repository.books.lock(&mut *tx, book_id).await?;

        if self
            .repository
            .waitlists
            .is_queued(&mut *tx, book.id, user.id)
            .await?
        {
            return Err(AppError::Conflict(
                "You are already in the waitlist for this book".to_string(),
            ));
        }
        if book.is_available() {
            return Err(AppError::InvalidState(
                "This book is available, you can borrow it now".to_string(),
            ));
        }

        let waitlist = self
            .repository
            .waitlists
            .enqueue(&mut *tx, book.id, user.id)
            .await?;

        tx.commit().await?;

        tracing::info!(
            book_id = book.book_id,
            user_id = user.user_id,
            position = waitlist.waiting_list.len(),
            "User joined waitlist"
        );

        Ok(waitlist)
    }

    /// Remove a user from a book's queue.
    ///
    /// Never fails for a missing waitlist or an unqueued user; the outcome
    /// says what happened.
    pub async fn remove(&self, book_id: Uuid, user_id: Uuid) -> AppResult<WaitlistRemoval> {
        let mut tx = self.repository.begin().await?;
        let removal = self
            .repository
            .waitlists
            .remove_user(&mut *tx, book_id, user_id)
            .await?;
        tx.commit().await?;

        tracing::debug!(%book_id, %user_id, ?removal, "Waitlist removal");
        Ok(removal)
    }

    /// Members remove themselves; librarians may remove anyone
    pub async fn remove_for(
        &self,
        actor: &User,
        book_id: Uuid,
        user_id: Option<Uuid>,
    ) -> AppResult<WaitlistRemoval> {
        let target = match user_id {
            Some(id) if id != actor.id => {
                actor.require_librarian()?;
                id
            }
            _ => actor.id,
        };
        self.remove(book_id, target).await
    }

    pub async fn get(&self, book_id: Uuid) -> AppResult<Option<Waitlist>> {
        self.repository.waitlists.get_by_book(book_id).await
    }

    pub async fn list(&self, query: &WaitlistQuery) -> AppResult<(Vec<WaitlistDetails>, i64)> {
        self.repository.waitlists.list(query).await
    }

    pub async fn for_user(&self, user: &User) -> AppResult<Vec<WaitlistDetails>> {
        self.repository.waitlists.for_user(user.id).await
    }

    /// Email everyone queued for the book. Does not dequeue anybody.
    ///
    /// Returns whether a notice was sent.
    pub async fn notify_if_available(&self, book_id: Uuid) -> AppResult<bool> {
        let Some(notice) = self.repository.waitlists.availability_notice(book_id).await? else {
            return Ok(false);
        };

        let recipients = notice.recipients.len();
        self.email.send(self.email.availability_email(&notice)).await?;

        tracing::info!(%book_id, recipients, "Waitlist notified of availability");
        Ok(true)
    }

    /// Fire-and-forget notification; failures are logged, never returned
    pub fn spawn_notification(&self, book_id: Uuid) {
        let service = self.clone();
        tokio::spawn(async move {
            if let Err(e) = service.notify_if_available(book_id).await {
                tracing::warn!(%book_id, "Could not notify waitlist: {}", e);
            }
        });
    }
}
