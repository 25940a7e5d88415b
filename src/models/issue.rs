//! Issue (one borrowing of one book by one user) model and circulation rules

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::{book::BookSummary, user::UserSummary};
use crate::error::{AppError, AppResult};

/// Maximum number of books a member may hold at once
pub const MAX_OPEN_ISSUES: i64 = 3;

text_enum! {
    IssueStatus {
        Issued => "issued",
        Returned => "returned",
    }
}

/// Issue model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Issue {
    pub id: Uuid,
    pub user_id: Uuid,
    pub book_id: Uuid,
    pub issue_date: DateTime<Utc>,
    pub estimated_return_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub status: IssueStatus,
    pub delayed_fine: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Issue with user and book populated
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct IssueDetails {
    pub id: Uuid,
    pub user: UserSummary,
    pub book: BookSummary,
    pub issue_date: DateTime<Utc>,
    pub estimated_return_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub status: IssueStatus,
    pub delayed_fine: Decimal,
    pub is_overdue: bool,
}

/// Internal row structure for joined issue queries
#[derive(Debug, Clone, FromRow)]
pub struct IssueDetailsRow {
    id: Uuid,
    issue_date: DateTime<Utc>,
    estimated_return_date: DateTime<Utc>,
    return_date: Option<DateTime<Utc>>,
    status: IssueStatus,
    delayed_fine: Decimal,
    user_uuid: Uuid,
    user_number: i32,
    user_name: String,
    user_photo: Option<String>,
    book_uuid: Uuid,
    book_number: i32,
    book_title: String,
    book_author: String,
    book_cover_img: String,
}

impl From<IssueDetailsRow> for IssueDetails {
    fn from(row: IssueDetailsRow) -> Self {
        let is_overdue =
            row.status == IssueStatus::Issued && row.estimated_return_date < Utc::now();
        IssueDetails {
            id: row.id,
            user: UserSummary {
                id: row.user_uuid,
                user_id: row.user_number,
                name: row.user_name,
                photo: row.user_photo,
            },
            book: BookSummary {
                id: row.book_uuid,
                book_id: row.book_number,
                title: row.book_title,
                author: row.book_author,
                cover_img: row.book_cover_img,
            },
            issue_date: row.issue_date,
            estimated_return_date: row.estimated_return_date,
            return_date: row.return_date,
            status: row.status,
            delayed_fine: row.delayed_fine,
            is_overdue,
        }
    }
}

/// Issue list query
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct IssueQuery {
    pub status: Option<IssueStatus>,
    /// Only issues of this user (internal id)
    pub user: Option<Uuid>,
    /// Only issues of this book (internal id)
    pub book: Option<Uuid>,
    pub sort: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Issue book request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct IssueBookRequest {
    pub user: Uuid,
    pub book: Uuid,
    /// Defaults to now
    pub issue_date: Option<DateTime<Utc>>,
    pub estimated_return_date: DateTime<Utc>,
}

/// Return book request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ReturnBookRequest {
    pub user: Uuid,
    pub book: Uuid,
    /// Defaults to now
    pub return_date: Option<DateTime<Utc>>,
    /// Computed from the daily rate when omitted
    pub delayed_fine: Option<Decimal>,
}

/// Decide whether a new issue may be created.
///
/// Checks run in a fixed order so the reported reason is deterministic:
/// duplicate issue, then availability, then the borrowing limit.
pub fn check_issue_eligibility(
    has_open_issue: bool,
    available_copies: i32,
    open_issues: i64,
) -> AppResult<()> {
    if has_open_issue {
        return Err(AppError::Conflict(
            "This book is already issued to this user".to_string(),
        ));
    }
    if available_copies <= 0 {
        return Err(AppError::InvalidState("This book is not available".to_string()));
    }
    if open_issues >= MAX_OPEN_ISSUES {
        return Err(AppError::LimitExceeded(format!(
            "User already borrowed {} books",
            MAX_OPEN_ISSUES
        )));
    }
    Ok(())
}

/// Fine for a return: `daily_fine` per calendar day past the estimated return date
pub fn compute_fine(
    estimated_return_date: DateTime<Utc>,
    return_date: DateTime<Utc>,
    daily_fine: Decimal,
) -> Decimal {
    let days_late = (return_date.date_naive() - estimated_return_date.date_naive())
        .num_days()
        .max(0);
    daily_fine * Decimal::from(days_late)
}

/// Resolve the fine to record: a caller-supplied value must be non-negative,
/// otherwise it is computed from the dates.
pub fn resolve_fine(
    supplied: Option<Decimal>,
    estimated_return_date: DateTime<Utc>,
    return_date: DateTime<Utc>,
    daily_fine: Decimal,
) -> AppResult<Decimal> {
    match supplied {
        Some(fine) if fine < Decimal::ZERO => Err(AppError::Validation(
            "Delayed fine cannot be negative".to_string(),
        )),
        Some(fine) => Ok(fine),
        None => Ok(compute_fine(estimated_return_date, return_date, daily_fine)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_eligibility_order() {
        // Duplicate wins over every other reason
        assert!(matches!(
            check_issue_eligibility(true, 0, 3),
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            check_issue_eligibility(false, 0, 3),
            Err(AppError::InvalidState(_))
        ));
        assert!(matches!(
            check_issue_eligibility(false, 1, 3),
            Err(AppError::LimitExceeded(_))
        ));
        assert!(check_issue_eligibility(false, 1, 2).is_ok());
    }

    #[test]
    fn test_limit_is_three() {
        for open in 0..MAX_OPEN_ISSUES {
            assert!(check_issue_eligibility(false, 5, open).is_ok());
        }
        assert!(check_issue_eligibility(false, 5, MAX_OPEN_ISSUES).is_err());
    }

    #[test]
    fn test_compute_fine() {
        let due = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
        let rate = Decimal::new(5, 0);

        assert_eq!(compute_fine(due, due - Duration::days(2), rate), Decimal::ZERO);
        assert_eq!(compute_fine(due, due + Duration::hours(2), rate), Decimal::ZERO);
        assert_eq!(compute_fine(due, due + Duration::days(3), rate), Decimal::new(15, 0));
    }

    #[test]
    fn test_resolve_fine() {
        let due = Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap();
        let returned = due + Duration::days(4);
        let rate = Decimal::new(2, 0);

        assert_eq!(resolve_fine(None, due, returned, rate).unwrap(), Decimal::new(8, 0));
        assert_eq!(
            resolve_fine(Some(Decimal::new(50, 0)), due, returned, rate).unwrap(),
            Decimal::new(50, 0)
        );
        assert!(matches!(
            resolve_fine(Some(Decimal::new(-1, 0)), due, returned, rate),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(serde_json::to_value(IssueStatus::Issued).unwrap(), "issued");
        assert_eq!("returned".parse::<IssueStatus>().unwrap(), IssueStatus::Returned);
    }
}
