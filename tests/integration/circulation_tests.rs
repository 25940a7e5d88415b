//! Database-backed tests for membership, issuing, returning, waitlists and reviews.
//!
//! Each test gets a fresh database from `sqlx::test`; run with
//! `DATABASE_URL=... cargo test -- --ignored`.

use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use puthipallab_server::{
    config::AppConfig,
    error::{AppError, AppResult},
    models::{
        book::{CreateBook, UpdateBook},
        issue::{IssueBookRequest, IssueStatus, ReturnBookRequest},
        review::CreateReview,
        user::{Gender, LoginRequest, ResetPasswordRequest, SignupRequest, User},
        waitlist::WaitlistRemoval,
    },
    repository::Repository,
    services::{
        email::{Mailer, OutgoingEmail},
        Services,
    },
};

/// Keeps every message instead of delivering it
#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
}

impl RecordingMailer {
    fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: OutgoingEmail) -> AppResult<()> {
        self.sent
            .lock()
            .map_err(|_| AppError::Internal("mailer poisoned".to_string()))?
            .push(email);
        Ok(())
    }
}

async fn setup(pool: PgPool) -> (Services, Arc<RecordingMailer>) {
    let repository = Repository::new(pool);
    repository.counters.ensure_seeded().await.unwrap();

    let mailer = Arc::new(RecordingMailer::default());
    let services = Services::new(repository, &AppConfig::default(), mailer.clone());
    (services, mailer)
}

async fn member(services: &Services, email: &str) -> User {
    services
        .users
        .signup(SignupRequest {
            name: "Test Member".to_string(),
            email: email.to_string(),
            gender: Gender::Female,
            password: "password123".to_string(),
            password_confirm: "password123".to_string(),
        })
        .await
        .unwrap()
        .user
}

async fn book(services: &Services, title: &str, copies: i32) -> Uuid {
    services
        .catalog
        .add_book(CreateBook {
            cover_img: "https://covers.example/1.jpg".to_string(),
            title: title.to_string(),
            author: "Rabindranath Tagore".to_string(),
            publisher: None,
            genres: vec![],
            publication_date: None,
            book_language: "Bengali".to_string(),
            page_count: Some(120),
            summary: None,
            total_copies: copies,
        })
        .await
        .unwrap()
        .id
}

/// Token from the last emailed link containing `marker`
fn emailed_token(mailer: &RecordingMailer, marker: &str) -> String {
    let sent = mailer.sent();
    let body = &sent
        .iter()
        .rev()
        .find(|email| email.body.contains(marker))
        .expect("email with link")
        .body;
    body.split(marker)
        .nth(1)
        .unwrap()
        .split_whitespace()
        .next()
        .unwrap()
        .to_string()
}

fn new_password(password: &str) -> ResetPasswordRequest {
    ResetPasswordRequest {
        password: password.to_string(),
        password_confirm: password.to_string(),
    }
}

fn credentials(email: &str, password: &str) -> LoginRequest {
    LoginRequest {
        email: Some(email.to_string()),
        password: Some(password.to_string()),
    }
}

fn issue_request(user: &User, book: Uuid) -> IssueBookRequest {
    IssueBookRequest {
        user: user.id,
        book,
        issue_date: None,
        estimated_return_date: Utc::now() + Duration::days(14),
    }
}

fn return_request(user: &User, book: Uuid) -> ReturnBookRequest {
    ReturnBookRequest {
        user: user.id,
        book,
        return_date: None,
        delayed_fine: None,
    }
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_numbers_start_at_one_hundred(pool: PgPool) {
    let (services, _) = setup(pool).await;

    let first = member(&services, "first@example.com").await;
    let second = member(&services, "second@example.com").await;
    assert_eq!(first.user_id, 100);
    assert_eq!(second.user_id, 101);

    let book_id = book(&services, "Gitanjali", 1).await;
    let details = services.catalog.get_book(book_id).await.unwrap();
    assert_eq!(details.book.book_id, 100);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_signup_sends_verification_and_token_verifies(pool: PgPool) {
    let (services, mailer) = setup(pool).await;

    let user = member(&services, "Reader@Example.com").await;
    assert_eq!(user.email, "reader@example.com");
    assert!(!user.is_verified);

    let sent = mailer.sent();
    assert_eq!(sent.len(), 1);
    let token = sent[0]
        .body
        .rsplit("/verify-email/")
        .next()
        .unwrap()
        .trim()
        .to_string();

    let verified = services.users.verify_email(&token).await.unwrap();
    assert!(verified.is_verified);

    let reused = services.users.verify_email(&token).await;
    assert!(matches!(reused, Err(AppError::Validation(_))));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_issue_then_return(pool: PgPool) {
    let (services, _) = setup(pool).await;
    let user = member(&services, "reader@example.com").await;
    let book_id = book(&services, "Chokher Bali", 2).await;

    let issued = services
        .circulation
        .issue_book(issue_request(&user, book_id))
        .await
        .unwrap();
    assert_eq!(issued.available_copies, 1);
    assert_eq!(issued.issue.status, IssueStatus::Issued);
    assert!(!issued.left_waitlist);

    let again = services
        .circulation
        .issue_book(issue_request(&user, book_id))
        .await;
    assert!(matches!(again, Err(AppError::Conflict(_))));

    let returned = services
        .circulation
        .return_book(return_request(&user, book_id))
        .await
        .unwrap();
    assert_eq!(returned.available_copies, 2);
    assert_eq!(returned.issue.status, IssueStatus::Returned);
    assert_eq!(returned.issue.delayed_fine, Decimal::ZERO);
    assert!(!returned.waitlist_notified);

    let details = services.catalog.get_book(book_id).await.unwrap();
    assert_eq!(details.book.borrow_count, 1);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_return_without_open_issue_is_not_found(pool: PgPool) {
    let (services, _) = setup(pool).await;
    let user = member(&services, "reader@example.com").await;
    let book_id = book(&services, "Pather Panchali", 1).await;

    let result = services
        .circulation
        .return_book(return_request(&user, book_id))
        .await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_late_return_charges_daily_fine(pool: PgPool) {
    let (services, _) = setup(pool).await;
    let user = member(&services, "late@example.com").await;
    let book_id = book(&services, "Devdas", 1).await;

    let issued_at = Utc::now() - Duration::days(20);
    services
        .circulation
        .issue_book(IssueBookRequest {
            user: user.id,
            book: book_id,
            issue_date: Some(issued_at),
            estimated_return_date: issued_at + Duration::days(14),
        })
        .await
        .unwrap();

    let returned = services
        .circulation
        .return_book(ReturnBookRequest {
            return_date: Some(issued_at + Duration::days(17)),
            ..return_request(&user, book_id)
        })
        .await
        .unwrap();

    // Three days late at the default rate
    assert_eq!(returned.issue.delayed_fine, Decimal::new(15, 0));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_open_issue_limit(pool: PgPool) {
    let (services, _) = setup(pool).await;
    let user = member(&services, "busy@example.com").await;

    for title in ["One", "Two", "Three"] {
        let book_id = book(&services, title, 1).await;
        services
            .circulation
            .issue_book(issue_request(&user, book_id))
            .await
            .unwrap();
    }

    let fourth = book(&services, "Four", 1).await;
    let result = services
        .circulation
        .issue_book(issue_request(&user, fourth))
        .await;
    assert!(matches!(result, Err(AppError::LimitExceeded(_))));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_concurrent_issues_never_over_issue(pool: PgPool) {
    let (services, _) = setup(pool).await;
    let book_id = book(&services, "Aranyak", 1).await;

    let mut users = Vec::new();
    for i in 0..5 {
        users.push(member(&services, &format!("reader{}@example.com", i)).await);
    }

    let handles: Vec<_> = users
        .iter()
        .map(|user| {
            let services = services.clone();
            let request = issue_request(user, book_id);
            tokio::spawn(async move { services.circulation.issue_book(request).await })
        })
        .collect();

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(e) => assert!(matches!(e, AppError::InvalidState(_)), "{e:?}"),
        }
    }
    assert_eq!(successes, 1);

    let details = services.catalog.get_book(book_id).await.unwrap();
    assert_eq!(details.book.available_copies, 0);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_waitlist_only_for_unavailable_books(pool: PgPool) {
    let (services, _) = setup(pool).await;
    let reader = member(&services, "reader@example.com").await;
    let book_id = book(&services, "Srikanta", 1).await;

    let result = services.waitlist.add(&reader, book_id).await;
    assert!(matches!(result, Err(AppError::InvalidState(_))));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_issuing_dequeues_the_borrower(pool: PgPool) {
    let (services, _) = setup(pool).await;
    let holder = member(&services, "holder@example.com").await;
    let waiting = member(&services, "waiting@example.com").await;
    let book_id = book(&services, "Kapalkundala", 1).await;

    services
        .circulation
        .issue_book(issue_request(&holder, book_id))
        .await
        .unwrap();

    let waitlist = services.waitlist.add(&waiting, book_id).await.unwrap();
    assert_eq!(waitlist.waiting_list, vec![waiting.id]);

    let duplicate = services.waitlist.add(&waiting, book_id).await;
    assert!(matches!(duplicate, Err(AppError::Conflict(_))));

    services
        .circulation
        .return_book(return_request(&holder, book_id))
        .await
        .unwrap();

    let issued = services
        .circulation
        .issue_book(issue_request(&waiting, book_id))
        .await
        .unwrap();
    assert!(issued.left_waitlist);

    // The last member left, so the record is gone
    assert!(services.waitlist.get(book_id).await.unwrap().is_none());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_return_notifies_waitlist(pool: PgPool) {
    let (services, mailer) = setup(pool).await;
    let holder = member(&services, "holder@example.com").await;
    let first = member(&services, "first@example.com").await;
    let second = member(&services, "second@example.com").await;
    let book_id = book(&services, "Anandamath", 1).await;

    services
        .circulation
        .issue_book(issue_request(&holder, book_id))
        .await
        .unwrap();
    services.waitlist.add(&first, book_id).await.unwrap();
    services.waitlist.add(&second, book_id).await.unwrap();

    let returned = services
        .circulation
        .return_book(return_request(&holder, book_id))
        .await
        .unwrap();
    assert!(returned.waitlist_notified);

    let mut notice = None;
    for _ in 0..50 {
        notice = mailer
            .sent()
            .into_iter()
            .find(|email| email.subject.contains("Anandamath"));
        if notice.is_some() {
            break;
        }
        tokio::time::sleep(StdDuration::from_millis(50)).await;
    }

    let notice = notice.expect("availability notice");
    assert_eq!(
        notice.to,
        vec!["first@example.com".to_string(), "second@example.com".to_string()]
    );

    // Notifying never dequeues
    let waitlist = services.waitlist.get(book_id).await.unwrap().unwrap();
    assert_eq!(waitlist.waiting_list, vec![first.id, second.id]);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_leaving_waitlist_reports_outcome(pool: PgPool) {
    let (services, _) = setup(pool).await;
    let holder = member(&services, "holder@example.com").await;
    let waiting = member(&services, "waiting@example.com").await;
    let stranger = member(&services, "stranger@example.com").await;
    let book_id = book(&services, "Durgeshnandini", 1).await;

    assert_eq!(
        services.waitlist.remove(book_id, waiting.id).await.unwrap(),
        WaitlistRemoval::NoWaitlist
    );

    services
        .circulation
        .issue_book(issue_request(&holder, book_id))
        .await
        .unwrap();
    services.waitlist.add(&waiting, book_id).await.unwrap();

    assert_eq!(
        services.waitlist.remove(book_id, stranger.id).await.unwrap(),
        WaitlistRemoval::NotQueued
    );
    assert_eq!(
        services.waitlist.remove(book_id, waiting.id).await.unwrap(),
        WaitlistRemoval::Removed { remaining: 0 }
    );
    assert!(services.waitlist.get(book_id).await.unwrap().is_none());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_restock_keeps_issued_copies_out(pool: PgPool) {
    let (services, _) = setup(pool).await;
    let user = member(&services, "reader@example.com").await;
    let book_id = book(&services, "Parineeta", 2).await;

    services
        .circulation
        .issue_book(issue_request(&user, book_id))
        .await
        .unwrap();

    let restocked = services
        .catalog
        .update_book(
            book_id,
            UpdateBook {
                total_copies: Some(5),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(restocked.total_copies, 5);
    assert_eq!(restocked.available_copies, 4);

    let shrink = services
        .catalog
        .update_book(
            book_id,
            UpdateBook {
                total_copies: Some(0),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(shrink, Err(AppError::Validation(_))));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_one_review_per_member_and_book(pool: PgPool) {
    let (services, _) = setup(pool).await;
    let user = member(&services, "critic@example.com").await;
    let book_id = book(&services, "Shesher Kobita", 1).await;

    let review = services
        .reviews
        .add(
            &user,
            CreateReview {
                book: book_id,
                ratings: 5,
                review: "A classic".to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(review.ratings, 5);

    let second = services
        .reviews
        .add(
            &user,
            CreateReview {
                book: book_id,
                ratings: 1,
                review: "Changed my mind".to_string(),
            },
        )
        .await;
    assert!(matches!(second, Err(AppError::Conflict(_))));

    let reviews = services.reviews.for_book(book_id).await.unwrap();
    assert_eq!(reviews.len(), 1);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_login_requires_verified_email(pool: PgPool) {
    let (services, mailer) = setup(pool).await;
    member(&services, "pending@example.com").await;

    let result = services
        .users
        .login(credentials("pending@example.com", "password123"))
        .await;
    assert!(matches!(result, Err(AppError::NotVerified(_))));

    let wrong = services
        .users
        .login(credentials("pending@example.com", "not-the-password"))
        .await;
    assert!(matches!(wrong, Err(AppError::Authentication(_))));

    let token = emailed_token(&mailer, "/verify-email/");
    services.users.verify_email(&token).await.unwrap();

    let session = services
        .users
        .login(credentials("pending@example.com", "password123"))
        .await
        .unwrap();
    assert!(!session.token.is_empty());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_reset_token_works_once(pool: PgPool) {
    let (services, mailer) = setup(pool).await;
    member(&services, "forgetful@example.com").await;
    let token = emailed_token(&mailer, "/verify-email/");
    services.users.verify_email(&token).await.unwrap();

    services
        .users
        .forgot_password("forgetful@example.com")
        .await
        .unwrap();
    let token = emailed_token(&mailer, "/reset-password/");

    services
        .users
        .reset_password(&token, new_password("first-new-pass"))
        .await
        .unwrap();

    let reused = services
        .users
        .reset_password(&token, new_password("second-new-pass"))
        .await;
    assert!(matches!(reused, Err(AppError::Validation(_))));

    services
        .users
        .login(credentials("forgetful@example.com", "first-new-pass"))
        .await
        .unwrap();
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_concurrent_resets_consume_token_once(pool: PgPool) {
    let (services, mailer) = setup(pool).await;
    member(&services, "racer@example.com").await;

    services.users.forgot_password("racer@example.com").await.unwrap();
    let token = emailed_token(&mailer, "/reset-password/");

    let (first, second) = tokio::join!(
        services
            .users
            .reset_password(&token, new_password("password-one")),
        services
            .users
            .reset_password(&token, new_password("password-two")),
    );

    let successes = [first.is_ok(), second.is_ok()]
        .iter()
        .filter(|ok| **ok)
        .count();
    assert_eq!(successes, 1);

    let failure = if first.is_err() { first } else { second };
    assert!(matches!(failure, Err(AppError::Validation(_))));
}
